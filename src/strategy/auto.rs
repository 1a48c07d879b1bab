//! The `auto` mode: a balanced general-purpose ordering (spec §4.2).

use super::{ModeStrategy, VendorMap, defaults, select_from_preference_list};
use crate::config::ModeOverrides;
use crate::error::DispatchError;
use crate::types::{Mode, Request};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub struct Auto;

#[async_trait]
impl ModeStrategy for Auto {
    async fn select_vendor(
        &self,
        _request: &Request,
        vendors: &VendorMap,
        overrides: &ModeOverrides,
        cancel: &CancellationToken,
    ) -> Result<String, DispatchError> {
        let override_list = overrides.vendor_preferences.get(&Mode::Auto).map(|v| v.as_slice());
        select_from_preference_list(
            defaults::AUTO_PREFERENCE,
            override_list,
            vendors,
            cancel,
            |_| false,
        )
        .await
        .ok_or(DispatchError::NoAvailableVendors)
    }

    fn optimize_request(&self, request: &mut Request) {
        let d = defaults::defaults_for(Mode::Auto);
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
    fn optimize_fills_auto_defaults() {
        let strategy = Auto;
        let mut request = Request::new("gpt-3.5-turbo", vec![Message::user("hi")]);
        strategy.optimize_request(&mut request);
        assert_eq!(request.temperature, 0.5);
        assert_eq!(request.max_tokens, 500);
        assert_eq!(request.top_p, 0.85);
    }
}
