//! The public entry point: a vendor registry plus the dispatch pipeline that
//! ties mode selection, retry, cost estimation, and statistics together.

use crate::config::Config;
use crate::cost;
use crate::error::DispatchError;
use crate::providers::VendorAdapter;
use crate::retry::RetryEngine;
use crate::stats::{DispatcherStats, StatsAggregator};
use crate::strategy::{self, ModeStrategyRegistry};
use crate::streaming::StreamingResponse;
use crate::types::{Mode, Request, Response};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Owns the vendor registry, configuration, mode strategies, and statistics.
///
/// Safe for concurrent use: the vendor map is guarded by an
/// [`parking_lot::RwLock`] (registration is expected at startup, not
/// mid-traffic, but reads never race a write), and [`StatsAggregator`] has
/// its own internal lock.
pub struct Dispatcher {
    vendors: RwLock<HashMap<String, Arc<dyn VendorAdapter>>>,
    config: Config,
    strategies: ModeStrategyRegistry,
    stats: StatsAggregator,
}

impl Dispatcher {
    pub fn new(config: Config) -> Self {
        Self {
            vendors: RwLock::new(HashMap::new()),
            config,
            strategies: ModeStrategyRegistry::default(),
            stats: StatsAggregator::new(),
        }
    }

    /// Registers (or idempotently replaces) an adapter under its own name.
    /// Rejects empty adapter names; there is no nil case in Rust, an empty
    /// `name()` is the equivalent malformed-adapter signal.
    pub fn register_vendor(&self, adapter: Arc<dyn VendorAdapter>) -> Result<(), DispatchError> {
        let name = adapter.name();
        if name.is_empty() {
            return Err(DispatchError::InvalidConfig(
                "adapter name must not be empty".into(),
            ));
        }
        self.vendors.write().insert(name.to_string(), adapter);
        Ok(())
    }

    /// Snapshot of every registered vendor name, in unspecified order.
    pub fn vendor_names(&self) -> Vec<String> {
        self.vendors.read().keys().cloned().collect()
    }

    /// The adapter registered under `name`, if any.
    pub fn vendor(&self, name: &str) -> Option<Arc<dyn VendorAdapter>> {
        self.vendors.read().get(name).cloned()
    }

    /// A read-only snapshot of accumulated statistics.
    pub fn stats(&self) -> DispatcherStats {
        self.stats.snapshot()
    }

    /// Records one dispatch outcome, honoring `Config.enable_metrics`.
    fn record(&self, success: bool, vendor: &str, mode: &str, elapsed: Duration, cost: f64) {
        if self.config.enable_metrics {
            self.stats.update_stats(success, vendor, mode, elapsed, cost);
        }
    }

    /// Dispatches `request`, letting the request's mode select a vendor.
    pub async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, DispatchError> {
        self.dispatch_unary(request, cancel, None).await
    }

    /// Dispatches `request` to a specific vendor, bypassing mode selection.
    pub async fn send_to_vendor(
        &self,
        vendor: &str,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, DispatchError> {
        self.dispatch_unary(request, cancel, Some(vendor)).await
    }

    /// Dispatches `request` as a streaming call, letting the request's mode
    /// select a vendor.
    pub async fn send_streaming(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse, DispatchError> {
        self.dispatch_streaming(request, cancel, None).await
    }

    /// Dispatches `request` as a streaming call to a specific vendor,
    /// bypassing mode selection.
    pub async fn send_streaming_to_vendor(
        &self,
        vendor: &str,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<StreamingResponse, DispatchError> {
        self.dispatch_streaming(request, cancel, Some(vendor)).await
    }

    async fn dispatch_unary(
        &self,
        mut request: Request,
        cancel: &CancellationToken,
        pinned_vendor: Option<&str>,
    ) -> Result<Response, DispatchError> {
        self.fill_mode_default_model(&mut request);
        request.validate()?;

        let started = Instant::now();
        let child_cancel = self.derive_timeout_cancel(cancel);
        // `send_to_vendor` bypasses mode selection entirely (spec §4.4), so
        // no mode is charged against the per-mode stats map for that path.
        let mode = if pinned_vendor.is_some() { "" } else { self.effective_mode_str(&request) };

        let selection = self.select_vendor(&request, pinned_vendor, &child_cancel).await;
        let (vendor_name, adapter) = match selection {
            Ok(pair) => pair,
            Err(err) => {
                self.record(false, "", mode, started.elapsed(), 0.0);
                return Err(err);
            }
        };

        if let Some(strategy) = self.strategy_for(&request.mode) {
            strategy.optimize_request(&mut request);
        }

        if self.config.enable_logging {
            tracing::debug!(vendor = vendor_name, mode, model = %request.model, "dispatching request");
        }

        let retry_engine = RetryEngine::new(&self.config.retry_policy);
        let result = retry_engine
            .run(vendor_name, &child_cancel, || adapter.send_request(&request, &child_cancel))
            .await;

        match result {
            Ok(mut response) => {
                let cost = if response.usage.total_tokens > 0 {
                    cost::realized_cost(vendor_name, response.usage.total_tokens)
                } else {
                    0.0
                };
                response.estimated_cost = cost;
                if self.config.enable_logging {
                    tracing::debug!(vendor = vendor_name, mode, cost, "dispatch succeeded");
                }
                self.record(true, vendor_name, mode, started.elapsed(), cost);
                Ok(response)
            }
            Err(err) => {
                if self.config.enable_logging {
                    tracing::warn!(vendor = vendor_name, mode, error = %err, "dispatch failed");
                }
                self.record(false, vendor_name, mode, started.elapsed(), 0.0);
                Err(err)
            }
        }
    }

    async fn dispatch_streaming(
        &self,
        mut request: Request,
        cancel: CancellationToken,
        pinned_vendor: Option<&str>,
    ) -> Result<StreamingResponse, DispatchError> {
        request.stream = true;
        self.fill_mode_default_model(&mut request);
        request.validate()?;

        let started = Instant::now();
        let child_cancel = self.derive_timeout_cancel(&cancel);
        let mode = if pinned_vendor.is_some() { "" } else { self.effective_mode_str(&request) };

        let selection = self.select_vendor(&request, pinned_vendor, &child_cancel).await;
        let (vendor_name, adapter) = match selection {
            Ok(pair) => pair,
            Err(err) => {
                self.record(false, "", mode, started.elapsed(), 0.0);
                return Err(err);
            }
        };

        if !adapter.capabilities().supports_streaming {
            self.record(false, vendor_name, mode, started.elapsed(), 0.0);
            return Err(DispatchError::StreamingNotSupported(vendor_name.to_string()));
        }

        if let Some(strategy) = self.strategy_for(&request.mode) {
            strategy.optimize_request(&mut request);
        }

        let response = adapter
            .send_streaming_request(&request, child_cancel)
            .await
            .map_err(|e| (vendor_name, e).into());

        match response {
            Ok(response) => {
                // Cost is unknown at stream initiation; record success now,
                // not when the stream eventually completes.
                self.record(true, vendor_name, mode, started.elapsed(), 0.0);
                Ok(response)
            }
            Err(err) => {
                self.record(false, vendor_name, mode, started.elapsed(), 0.0);
                Err(err)
            }
        }
    }

    /// Resolves the vendor for this call: a pinned name (bypassing mode
    /// selection) or the request's mode strategy, falling back to any
    /// available vendor when the preferred ones are all unavailable.
    async fn select_vendor(
        &self,
        request: &Request,
        pinned_vendor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(&'static str, Arc<dyn VendorAdapter>), DispatchError> {
        let vendors = self.vendors.read().clone();
        if vendors.is_empty() {
            return Err(DispatchError::NoVendorsRegistered);
        }

        if let Some(name) = pinned_vendor {
            let adapter = vendors
                .get(name)
                .cloned()
                .ok_or_else(|| DispatchError::VendorNotFound(name.to_string()))?;
            if !adapter.is_available(cancel).await {
                return Err(DispatchError::VendorUnavailable(name.to_string()));
            }
            return Ok((adapter.name(), adapter));
        }

        let strategy = self
            .strategy_for(&request.mode)
            .ok_or_else(|| DispatchError::InvalidRequest(format!("unsupported mode: {:?}", request.mode)))?;
        strategy.validate_context(&vendors)?;

        let selected = strategy
            .select_vendor(request, &vendors, &self.config.mode_overrides, cancel)
            .await
            .map_err(|e| e.context("failed to select vendor"))?;

        let adapter = vendors
            .get(&selected)
            .cloned()
            .ok_or_else(|| DispatchError::NoAvailableVendors)?;
        Ok((adapter.name(), adapter))
    }

    /// Resolves a request's effective mode: its own `mode`, falling back to
    /// `Config.mode`, falling back to `auto` when neither is set. The
    /// registry itself carries no strategy for `Mode::None` (there is
    /// nothing a "no mode" preference list could mean on its own), so an
    /// unset mode always ultimately resolves to the `auto` strategy rather
    /// than leaving a plain model-only request without any vendor selection
    /// at all.
    fn resolve_mode(&self, mode: Mode) -> Mode {
        let resolved = if mode == Mode::None { self.config.mode } else { mode };
        if resolved == Mode::None { Mode::Auto } else { resolved }
    }

    fn strategy_for(&self, mode: &Mode) -> Option<Arc<dyn strategy::ModeStrategy>> {
        self.strategies.get(self.resolve_mode(*mode))
    }

    /// The mode key charged against `DispatcherStats::modes` for this
    /// dispatch, using the same resolution [`Self::strategy_for`] applies,
    /// so the per-mode stats entry and the strategy selection never disagree
    /// about which mode a request ran under.
    fn effective_mode_str(&self, request: &Request) -> &'static str {
        self.resolve_mode(request.mode).as_str()
    }

    /// Backfills an empty `model` using the request's *effective* mode —
    /// its own `mode`, falling back to `Config.mode`, falling back to
    /// `auto` — the same resolution [`Self::strategy_for`] and
    /// [`Self::effective_mode_str`] apply. A request whose own `mode` is
    /// unset but whose `Config.mode` names one must still get a default
    /// model filled in, or `request.validate()` rejects it before vendor
    /// selection ever runs even though a mode strategy exists to serve it.
    fn fill_mode_default_model(&self, request: &mut Request) {
        if request.model.is_empty() {
            request.model =
                strategy::defaults::default_model_for(self.resolve_mode(request.mode)).to_string();
        }
    }

    /// Derives a child token bound to `Config.timeout`, racing it against
    /// the caller's own cancellation. Returns the parent unchanged when no
    /// timeout is configured.
    fn derive_timeout_cancel(&self, parent: &CancellationToken) -> CancellationToken {
        if self.config.timeout == Duration::ZERO {
            return parent.clone();
        }
        let child = parent.child_token();
        let timeout = self.config.timeout;
        let guard = child.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => guard.cancel(),
                _ = guard.cancelled() => {}
            }
        });
        child
    }
}
