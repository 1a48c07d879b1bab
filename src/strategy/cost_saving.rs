//! The `cost_saving` mode: prefers the cheapest vendors, and — when
//! `ModeOverrides::max_cost_per_request` is set — skips any candidate whose
//! estimated cost would exceed it (spec §4.2).

use super::{ModeStrategy, VendorMap, defaults, exceeds_cost_bound, select_from_preference_list};
use crate::config::ModeOverrides;
use crate::error::DispatchError;
use crate::types::{Mode, Request};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub struct CostSaving;

#[async_trait]
impl ModeStrategy for CostSaving {
    async fn select_vendor(
        &self,
        request: &Request,
        vendors: &VendorMap,
        overrides: &ModeOverrides,
        cancel: &CancellationToken,
    ) -> Result<String, DispatchError> {
        let override_list = overrides
            .vendor_preferences
            .get(&Mode::CostSaving)
            .map(|v| v.as_slice());
        let max_cost = overrides.max_cost_per_request;
        select_from_preference_list(
            defaults::COST_SAVING_PREFERENCE,
            override_list,
            vendors,
            cancel,
            |name| exceeds_cost_bound(name, request, max_cost),
        )
        .await
        .ok_or(DispatchError::NoAvailableVendors)
    }

    fn optimize_request(&self, request: &mut Request) {
        let d = defaults::defaults_for(Mode::CostSaving);
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
    fn optimize_fills_cost_saving_defaults() {
        let strategy = CostSaving;
        let mut request = Request::new("gpt-3.5-turbo", vec![Message::user("hi")]);
        strategy.optimize_request(&mut request);
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.top_p, 0.7);
    }

    #[test]
    fn cost_bound_of_zero_disables_filtering() {
        let request = Request::new("gpt-4", vec![Message::user("x".repeat(10_000))]);
        assert!(!exceeds_cost_bound("anthropic", &request, 0.0));
    }

    #[test]
    fn tight_cost_bound_excludes_expensive_vendor() {
        let request = Request::new("gpt-4", vec![Message::user("x".repeat(10_000))]);
        assert!(exceeds_cost_bound("anthropic", &request, 0.00001));
    }
}
