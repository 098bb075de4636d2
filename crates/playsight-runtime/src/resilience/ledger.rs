//! Rate and cost ledger for backend calls.
//!
//! Enforces per-backend request/token limits over a one-minute window and a
//! daily spend shared by every backend.
//!
//! Admission and recording are separate lock acquisitions: a burst of
//! concurrent requests can each pass [`UsageLedger::can_admit`] before any
//! of them records usage, so a window or the daily budget may be overshot
//! by a few calls. Holding the lock across the backend call would serialize
//! every request behind the slowest backend.

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::clock::SharedClock;
use crate::config::LedgerConfig;
use crate::providers::{BackendDescriptor, ModelPricing};

/// Length of a rate-limit window in seconds.
pub const WINDOW_SECS: i64 = 60;

/// Share of estimated tokens priced as input; the rest is output.
const INPUT_SHARE: f64 = 0.7;

/// Request and token counters for one backend over the current minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    pub window_start: DateTime<Utc>,
    pub request_count: u32,
    pub token_count: u32,
    pub requests_per_minute: u32,
    pub tokens_per_minute: u32,
}

impl RateLimitWindow {
    fn new(limits: &BackendLimits, now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            request_count: 0,
            token_count: 0,
            requests_per_minute: limits.requests_per_minute,
            tokens_per_minute: limits.tokens_per_minute,
        }
    }

    /// Start a new window if the current one is a minute old.
    fn roll(&mut self, now: DateTime<Utc>) {
        if (now - self.window_start).num_seconds() >= WINDOW_SECS {
            self.window_start = now;
            self.request_count = 0;
            self.token_count = 0;
        }
    }
}

/// Cumulative and daily spend across all backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub request_count: u64,
    pub average_cost: f64,
    pub daily_used: f64,
    pub daily_limit: f64,

    /// UTC day `daily_used` belongs to
    pub day: NaiveDate,
}

/// Point-in-time copy of the ledger for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub costs: CostLedger,
    pub windows: BTreeMap<String, RateLimitWindow>,
}

#[derive(Debug, Clone)]
struct BackendLimits {
    requests_per_minute: u32,
    tokens_per_minute: u32,
    pricing: ModelPricing,
}

struct LedgerState {
    windows: HashMap<String, RateLimitWindow>,
    costs: CostLedger,
}

/// Tracks usage for every backend.
pub struct UsageLedger {
    clock: SharedClock,
    default_limits: BackendLimits,
    limits: HashMap<String, BackendLimits>,
    state: Mutex<LedgerState>,
}

impl UsageLedger {
    /// Create a ledger with no backend-specific limits.
    pub fn new(config: &LedgerConfig, clock: SharedClock) -> Self {
        let now = clock.now();
        Self {
            default_limits: BackendLimits {
                requests_per_minute: config.default_requests_per_minute,
                tokens_per_minute: config.default_tokens_per_minute,
                pricing: ModelPricing::BASELINE,
            },
            limits: HashMap::new(),
            state: Mutex::new(LedgerState {
                windows: HashMap::new(),
                costs: CostLedger {
                    total_tokens: 0,
                    total_cost: 0.0,
                    request_count: 0,
                    average_cost: 0.0,
                    daily_used: 0.0,
                    daily_limit: config.daily_limit,
                    day: now.date_naive(),
                },
            }),
            clock,
        }
    }

    /// Create a ledger with limits and pricing for each descriptor.
    pub fn with_backends<'a>(
        config: &LedgerConfig,
        clock: SharedClock,
        descriptors: impl IntoIterator<Item = &'a BackendDescriptor>,
    ) -> Self {
        let mut ledger = Self::new(config, clock);
        for descriptor in descriptors {
            ledger.register_backend(descriptor);
        }
        ledger
    }

    /// Add or replace limits and pricing for a backend.
    pub fn register_backend(&mut self, descriptor: &BackendDescriptor) {
        self.limits.insert(
            descriptor.id.clone(),
            BackendLimits {
                requests_per_minute: descriptor.requests_per_minute,
                tokens_per_minute: descriptor.tokens_per_minute,
                pricing: descriptor.default_pricing(),
            },
        );
    }

    fn limits_for(&self, backend: &str) -> &BackendLimits {
        self.limits.get(backend).unwrap_or(&self.default_limits)
    }

    /// Check whether a call of `estimated_tokens` may go to `backend` now.
    pub fn can_admit(&self, backend: &str, estimated_tokens: u32) -> bool {
        let now = self.clock.now();
        let limits = self.limits_for(backend);
        let estimated_cost = self.estimate_cost(Some(backend), estimated_tokens);

        let mut state = self.state.lock();
        Self::roll_day(&mut state, now);

        let window = state
            .windows
            .entry(backend.to_string())
            .or_insert_with(|| RateLimitWindow::new(limits, now));
        window.roll(now);

        if window.request_count >= window.requests_per_minute {
            tracing::debug!(backend = %backend, requests = window.request_count, "Request limit reached");
            return false;
        }
        if window.token_count.saturating_add(estimated_tokens) > window.tokens_per_minute {
            tracing::debug!(
                backend = %backend,
                tokens = window.token_count,
                estimated_tokens,
                "Token limit reached"
            );
            return false;
        }
        if state.costs.daily_used + estimated_cost > state.costs.daily_limit {
            tracing::debug!(
                backend = %backend,
                daily_used = state.costs.daily_used,
                estimated_cost,
                "Daily budget reached"
            );
            return false;
        }

        true
    }

    /// Record a completed call.
    pub fn record_usage(&self, backend: &str, tokens_used: u32, cost: f64) {
        let now = self.clock.now();
        let limits = self.limits_for(backend);

        let mut state = self.state.lock();
        Self::roll_day(&mut state, now);

        let window = state
            .windows
            .entry(backend.to_string())
            .or_insert_with(|| RateLimitWindow::new(limits, now));
        window.roll(now);
        window.request_count += 1;
        window.token_count = window.token_count.saturating_add(tokens_used);

        let costs = &mut state.costs;
        costs.total_tokens += u64::from(tokens_used);
        costs.total_cost += cost;
        costs.request_count += 1;
        costs.daily_used += cost;
        costs.average_cost = costs.total_cost / costs.request_count as f64;
    }

    /// Estimated cost of `tokens`, priced 70% input / 30% output.
    ///
    /// Unknown backends and models without pricing use the baseline.
    pub fn estimate_cost(&self, backend: Option<&str>, tokens: u32) -> f64 {
        let pricing = backend
            .and_then(|id| self.limits.get(id))
            .map(|l| l.pricing)
            .unwrap_or(ModelPricing::BASELINE);

        let tokens = f64::from(tokens);
        let input = tokens * INPUT_SHARE;
        let output = tokens - input;
        (input / 1000.0) * pricing.input_per_k + (output / 1000.0) * pricing.output_per_k
    }

    /// Zero daily spend and every rate window.
    pub fn reset_daily(&self) {
        let today = self.clock.now().date_naive();
        let mut state = self.state.lock();
        Self::clear_daily(&mut state, today);
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.lock();
        LedgerSnapshot {
            costs: state.costs.clone(),
            windows: state
                .windows
                .iter()
                .map(|(id, window)| (id.clone(), window.clone()))
                .collect(),
        }
    }

    fn roll_day(state: &mut LedgerState, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != state.costs.day {
            tracing::info!(
                day = %today,
                previous_spend = state.costs.daily_used,
                "New UTC day, resetting daily budget"
            );
            Self::clear_daily(state, today);
        }
    }

    fn clear_daily(state: &mut LedgerState, today: NaiveDate) {
        state.costs.daily_used = 0.0;
        state.costs.day = today;
        state.windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::time::Duration;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap())
    }

    fn ledger(clock: &ManualClock, rpm: u32, daily_limit: f64) -> UsageLedger {
        let config = LedgerConfig {
            daily_limit,
            ..Default::default()
        };
        let descriptor = BackendDescriptor::new("alpha", 1, "a-1").with_rate_limits(rpm, 10_000);
        UsageLedger::with_backends(&config, Arc::new(clock.clone()), [&descriptor])
    }

    #[test]
    fn test_request_limit_until_window_rolls() {
        let clock = clock();
        let ledger = ledger(&clock, 3, 100.0);

        for _ in 0..3 {
            assert!(ledger.can_admit("alpha", 100));
            ledger.record_usage("alpha", 100, 0.001);
        }
        assert!(!ledger.can_admit("alpha", 100));

        clock.advance(Duration::from_secs(59));
        assert!(!ledger.can_admit("alpha", 100));

        clock.advance(Duration::from_secs(1));
        assert!(ledger.can_admit("alpha", 100));
    }

    #[test]
    fn test_token_limit() {
        let clock = clock();
        let ledger = ledger(&clock, 100, 100.0);

        ledger.record_usage("alpha", 9_500, 0.0);
        assert!(ledger.can_admit("alpha", 500));
        assert!(!ledger.can_admit("alpha", 501));
    }

    #[test]
    fn test_daily_budget_shared_across_backends() {
        let clock = clock();
        let ledger = ledger(&clock, 100, 0.01);

        ledger.record_usage("alpha", 1000, 0.008);
        // 1000 baseline tokens cost 0.0066
        assert!(!ledger.can_admit("beta", 1000));
        assert!(ledger.can_admit("beta", 100));
    }

    #[test]
    fn test_day_rollover_resets_budget() {
        let clock = clock();
        let ledger = ledger(&clock, 100, 0.01);
        ledger.record_usage("alpha", 1000, 0.01);
        assert!(!ledger.can_admit("alpha", 1000));

        clock.advance(Duration::from_secs(12 * 3600));
        assert!(ledger.can_admit("alpha", 1000));
        assert_eq!(ledger.snapshot().costs.daily_used, 0.0);
        // Cumulative totals survive the rollover
        assert_eq!(ledger.snapshot().costs.request_count, 1);
    }

    #[test]
    fn test_reset_daily() {
        let clock = clock();
        let ledger = ledger(&clock, 1, 100.0);
        ledger.record_usage("alpha", 10, 0.5);
        assert!(!ledger.can_admit("alpha", 10));

        ledger.reset_daily();
        assert!(ledger.can_admit("alpha", 10));
        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.costs.daily_used, 0.0);
        assert_eq!(snapshot.costs.total_cost, 0.5);
    }

    #[test]
    fn test_cost_estimation() {
        let clock = clock();
        let config = LedgerConfig::default();
        let descriptor = BackendDescriptor::new("alpha", 1, "a-1")
            .with_pricing("a-1", ModelPricing { input_per_k: 0.01, output_per_k: 0.02 });
        let ledger = UsageLedger::with_backends(&config, Arc::new(clock), [&descriptor]);

        // 700 * 0.01 / 1000 + 300 * 0.02 / 1000
        assert!((ledger.estimate_cost(Some("alpha"), 1000) - 0.013).abs() < 1e-12);
        // Baseline: 700 * 0.003 / 1000 + 300 * 0.015 / 1000
        assert!((ledger.estimate_cost(None, 1000) - 0.0066).abs() < 1e-12);
        assert!((ledger.estimate_cost(Some("unknown"), 1000) - 0.0066).abs() < 1e-12);
    }

    #[test]
    fn test_average_cost() {
        let clock = clock();
        let ledger = ledger(&clock, 100, 100.0);
        ledger.record_usage("alpha", 100, 0.02);
        ledger.record_usage("alpha", 300, 0.04);

        let costs = ledger.snapshot().costs;
        assert_eq!(costs.total_tokens, 400);
        assert_eq!(costs.request_count, 2);
        assert!((costs.average_cost - 0.03).abs() < 1e-12);
    }
}
