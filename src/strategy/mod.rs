//! Mode Strategy Registry (spec §4.2): one strategy object per mode, each
//! implementing the four-method capability set {select_vendor,
//! optimize_request, preprocess_context, validate_context}.
//!
//! Modeled as `Arc<dyn ModeStrategy>` trait objects in a registry, mirroring
//! the teacher's registry-of-strategy-objects idiom used for its own
//! routing strategies (`core/router/strategy`).

mod auto;
mod cost_saving;
pub mod defaults;
mod fast;
mod sophisticated;

pub use auto::Auto;
pub use cost_saving::CostSaving;
pub use fast::Fast;
pub use sophisticated::Sophisticated;

use crate::config::ModeOverrides;
use crate::cost;
use crate::error::DispatchError;
use crate::providers::VendorAdapter;
use crate::types::{Mode, Request};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The vendor registry a strategy selects from: name -> adapter.
pub type VendorMap = HashMap<String, Arc<dyn VendorAdapter>>;

/// One optimization profile: vendor ordering, default request parameters,
/// and extension hooks (spec §4.2).
#[async_trait]
pub trait ModeStrategy: Send + Sync {
    /// Tie-breaker reserved for future multi-mode composition; unused by
    /// the built-in single-mode dispatch today.
    fn priority(&self) -> i32 {
        0
    }

    /// Returns the first vendor that is *available*, trying
    /// `overrides.vendor_preferences[mode]` (if set) before this strategy's
    /// built-in order, then falling back to any available vendor in
    /// unspecified order.
    async fn select_vendor(
        &self,
        request: &Request,
        vendors: &VendorMap,
        overrides: &ModeOverrides,
        cancel: &CancellationToken,
    ) -> Result<String, DispatchError>;

    /// Fills unset (zero-valued) `temperature`/`max_tokens`/`top_p` with
    /// this mode's tuned defaults. Caller-set values are preserved.
    fn optimize_request(&self, request: &mut Request);

    /// Extension point for future context-length/compression/enhancement
    /// rules (spec §4.2). Left as an identity transform — spec explicitly
    /// permits this ("core correctness does not depend on transformations
    /// being non-trivial").
    fn preprocess_context(&self, request: &mut Request) {
        let _ = request;
    }

    /// Verifies the request is present and at least one vendor is
    /// registered at all (structural request validity is
    /// [`crate::types::Request::validate`]'s job, not this method's).
    fn validate_context(&self, vendors: &VendorMap) -> Result<(), DispatchError> {
        if vendors.is_empty() {
            return Err(DispatchError::NoVendorsRegistered);
        }
        Ok(())
    }
}

/// Shared selection routine used by all four built-in strategies: explicit
/// override order first, then the strategy's built-in order, then any
/// available vendor (spec §4.2, "fall back to any available vendor;
/// iteration order is unspecified").
pub(crate) async fn select_from_preference_list(
    built_in: &[&str],
    overrides: Option<&[String]>,
    vendors: &VendorMap,
    cancel: &CancellationToken,
    mut skip: impl FnMut(&str) -> bool,
) -> Option<String> {
    let mut ordered: Vec<&str> = Vec::new();
    if let Some(list) = overrides {
        ordered.extend(list.iter().map(|s| s.as_str()));
    }
    ordered.extend(built_in.iter().copied());

    for name in &ordered {
        if skip(name) {
            continue;
        }
        if let Some(adapter) = vendors.get(*name) {
            if adapter.is_available(cancel).await {
                return Some((*name).to_string());
            }
        }
    }

    for (name, adapter) in vendors.iter() {
        if skip(name) {
            continue;
        }
        if adapter.is_available(cancel).await {
            return Some(name.clone());
        }
    }
    None
}

/// Estimated-cost filter applied only by [`CostSaving`] (spec §4.2): skip
/// any candidate whose estimated cost exceeds `max_cost_per_request`, when
/// that bound is set (> 0).
pub(crate) fn exceeds_cost_bound(vendor: &str, request: &Request, max_cost: f64) -> bool {
    if max_cost <= 0.0 {
        return false;
    }
    let input_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
    cost::estimate_request_cost(vendor, input_chars, request.max_tokens) > max_cost
}

/// Holds one [`ModeStrategy`] per built-in [`Mode`] (spec §4.2).
pub struct ModeStrategyRegistry {
    strategies: HashMap<Mode, Arc<dyn ModeStrategy>>,
}

impl ModeStrategyRegistry {
    pub fn get(&self, mode: Mode) -> Option<Arc<dyn ModeStrategy>> {
        self.strategies.get(&mode).cloned()
    }
}

impl Default for ModeStrategyRegistry {
    fn default() -> Self {
        let mut strategies: HashMap<Mode, Arc<dyn ModeStrategy>> = HashMap::new();
        strategies.insert(Mode::Fast, Arc::new(Fast));
        strategies.insert(Mode::Sophisticated, Arc::new(Sophisticated));
        strategies.insert(Mode::CostSaving, Arc::new(CostSaving));
        strategies.insert(Mode::Auto, Arc::new(Auto));
        Self { strategies }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_all_four_built_in_modes() {
        let registry = ModeStrategyRegistry::default();
        assert!(registry.get(Mode::Fast).is_some());
        assert!(registry.get(Mode::Sophisticated).is_some());
        assert!(registry.get(Mode::CostSaving).is_some());
        assert!(registry.get(Mode::Auto).is_some());
        assert!(registry.get(Mode::None).is_none());
    }
}
