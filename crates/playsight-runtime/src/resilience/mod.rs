//! Resilience patterns for playsight-runtime.
//!
//! This module provides:
//! - Per-backend rate windows and the shared daily budget
//! - Per-backend health circuits

mod health;
mod ledger;

pub use health::{BackendHealth, CircuitBreakerConfig, CircuitState};
pub use ledger::{CostLedger, LedgerSnapshot, RateLimitWindow, UsageLedger, WINDOW_SECS};
