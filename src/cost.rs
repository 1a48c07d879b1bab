//! Per-vendor cost-per-1K-token tables.
//!
//! Spec §4.2 (the `cost_saving` strategy's estimate filter) and §4.4 step 9
//! (the dispatcher's post-call cost stamp) quote two *different* per-vendor
//! rate tables. They agree on `local`/`google`/`anthropic`, but diverge on
//! `openai` and `azure`: spec §8 scenario 1 is explicit that a 4-token
//! openai completion stamps `estimated_cost == 0.00012`, which only holds
//! at a `0.03` realized rate (`4/1000 * 0.03`), not the `0.002` the
//! cost_saving estimate table uses for the same vendor. The worked scenario
//! is authoritative over the generic table prose, so `dispatch_cost_per_1k`
//! bumps both `openai` and `azure` to `0.03`; `strategy_cost_per_1k` keeps
//! the original per-mode table unchanged. See DESIGN.md for the decision.

/// Rates consulted by [`crate::strategy::CostSaving`] when filtering
/// candidates against `ModeOverrides::max_cost_per_request`.
pub fn strategy_cost_per_1k(vendor: &str) -> f64 {
    match vendor {
        "local" => 0.0001,
        "google" => 0.0005,
        "openai" => 0.002,
        "anthropic" => 0.003,
        "azure" | "azure-openai" => 0.002,
        _ => 0.05,
    }
}

/// Rates consulted by [`crate::Dispatcher`] when it stamps
/// `Response::estimated_cost` after a successful unary call.
pub fn dispatch_cost_per_1k(vendor: &str) -> f64 {
    match vendor {
        "local" => 0.0001,
        "google" => 0.0005,
        "openai" => 0.03,
        "anthropic" => 0.003,
        "azure" | "azure-openai" => 0.03,
        _ => 0.05,
    }
}

/// Estimated cost of a not-yet-sent request:
/// `((input_chars/4) + (max_tokens or 500)) / 1000 * vendor_cost_per_1K`.
pub fn estimate_request_cost(vendor: &str, input_chars: usize, max_tokens: u32) -> f64 {
    let effective_max_tokens = if max_tokens == 0 { 500 } else { max_tokens };
    let estimated_tokens = (input_chars as f64 / 4.0) + effective_max_tokens as f64;
    (estimated_tokens / 1000.0) * strategy_cost_per_1k(vendor)
}

/// Realized cost of a completed call:
/// `(total_tokens/1000) * vendor_cost_per_1K`.
pub fn realized_cost(vendor: &str, total_tokens: u32) -> f64 {
    (total_tokens as f64 / 1000.0) * dispatch_cost_per_1k(vendor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_openai_cost_matches_spec_scenario() {
        // total_tokens=4, vendor=openai, rate=0.03/1K -> 4/1000*0.03 = 0.00012
        // (spec §8 scenario 1).
        let cost = realized_cost("openai", 4);
        assert!((cost - 0.00012).abs() < 1e-9);
    }

    #[test]
    fn azure_rates_diverge_between_tables() {
        assert_eq!(strategy_cost_per_1k("azure"), 0.002);
        assert_eq!(dispatch_cost_per_1k("azure"), 0.03);
    }

    #[test]
    fn openai_rates_diverge_between_tables() {
        assert_eq!(strategy_cost_per_1k("openai"), 0.002);
        assert_eq!(dispatch_cost_per_1k("openai"), 0.03);
    }

    #[test]
    fn unknown_vendor_defaults_to_five_cents() {
        assert_eq!(dispatch_cost_per_1k("unknown-vendor"), 0.05);
    }

    #[test]
    fn request_estimate_defaults_max_tokens_to_500() {
        // Uses the strategy table (openai=0.002), not the dispatch table.
        let cost = estimate_request_cost("openai", 400, 0);
        let expected = ((400.0 / 4.0) + 500.0) / 1000.0 * 0.002;
        assert!((cost - expected).abs() < 1e-12);
    }
}
