//! The `sophisticated` mode: prefers the highest-quality cloud vendors,
//! local last (spec §4.2, §8 testable property).

use super::{ModeStrategy, VendorMap, defaults, select_from_preference_list};
use crate::config::ModeOverrides;
use crate::error::DispatchError;
use crate::types::{Mode, Request};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub struct Sophisticated;

#[async_trait]
impl ModeStrategy for Sophisticated {
    async fn select_vendor(
        &self,
        _request: &Request,
        vendors: &VendorMap,
        overrides: &ModeOverrides,
        cancel: &CancellationToken,
    ) -> Result<String, DispatchError> {
        let override_list = overrides
            .vendor_preferences
            .get(&Mode::Sophisticated)
            .map(|v| v.as_slice());
        select_from_preference_list(
            defaults::SOPHISTICATED_PREFERENCE,
            override_list,
            vendors,
            cancel,
            |_| false,
        )
        .await
        .ok_or(DispatchError::NoAvailableVendors)
    }

    fn optimize_request(&self, request: &mut Request) {
        let d = defaults::defaults_for(Mode::Sophisticated);
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
