//! The `fast` mode: prefers the local backend, then cloud vendors in the
//! order latency-sensitive callers would want them (spec §4.2).

use super::{ModeStrategy, VendorMap, defaults, select_from_preference_list};
use crate::config::ModeOverrides;
use crate::error::DispatchError;
use crate::types::{Mode, Request};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub struct Fast;

#[async_trait]
impl ModeStrategy for Fast {
    async fn select_vendor(
        &self,
        _request: &Request,
        vendors: &VendorMap,
        overrides: &ModeOverrides,
        cancel: &CancellationToken,
    ) -> Result<String, DispatchError> {
        let override_list = overrides.vendor_preferences.get(&Mode::Fast).map(|v| v.as_slice());
        select_from_preference_list(
            defaults::FAST_PREFERENCE,
            override_list,
            vendors,
            cancel,
            |_| false,
        )
        .await
        .ok_or(DispatchError::NoAvailableVendors)
    }

    fn optimize_request(&self, request: &mut Request) {
        let d = defaults::defaults_for(Mode::Fast);
        if request.temperature == 0.0 {
            request.temperature = d.temperature;
        }
        if request.max_tokens == 0 {
            request.max_tokens = d.max_tokens;
        }
        if request.top_p == 0.0 {
            request.top_p = d.top_p;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn optimize_fills_unset_params_only() {
        let strategy = Fast;
        let mut request = Request::new("gpt-3.5-turbo", vec![Message::user("hi")]);
        request.top_p = 0.99; // caller-set, must survive
        strategy.optimize_request(&mut request);
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 150);
        assert_eq!(request.top_p, 0.99);
    }
}
