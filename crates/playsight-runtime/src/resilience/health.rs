//! Per-backend health tracking.
//!
//! When a backend fails repeatedly its circuit opens and the orchestrator
//! skips it until the recovery timeout passes. Authentication and
//! configuration failures disable the backend for the rest of the process.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::clock::SharedClock;
use crate::config::duration_str;

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures before opening
    pub failure_threshold: u32,

    /// Time before a half-open probe is allowed
    #[serde(with = "duration_str")]
    pub recovery_timeout: Duration,

    /// Successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

/// Health state of one backend.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Skipped until the recovery timeout passes
    Open { opened_at: DateTime<Utc> },

    /// Probing whether the backend recovered
    HalfOpen { successes: u32 },

    /// Unusable for the rest of the process
    Disabled { reason: String },
}

/// Tracks health for every backend independently.
pub struct BackendHealth {
    states: RwLock<HashMap<String, CircuitState>>,
    config: CircuitBreakerConfig,
    clock: SharedClock,
}

impl BackendHealth {
    pub fn new(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Whether the orchestrator may call this backend now.
    pub fn is_available(&self, backend: &str) -> bool {
        let mut states = self.states.write();
        let opened_at = match states.get(backend) {
            Some(CircuitState::Disabled { .. }) => return false,
            Some(CircuitState::Open { opened_at }) => *opened_at,
            _ => return true,
        };

        let elapsed = (self.clock.now() - opened_at).to_std().unwrap_or_default();
        if elapsed >= self.config.recovery_timeout {
            states.insert(backend.to_string(), CircuitState::HalfOpen { successes: 0 });
            tracing::info!(backend = %backend, "Circuit half-open, probing backend");
            true
        } else {
            false
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, backend: &str) {
        let mut states = self.states.write();
        match states.get(backend).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(backend.to_string(), CircuitState::Closed { failures: 0 });
                    tracing::info!(backend = %backend, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        backend.to_string(),
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { .. }) => {
                states.insert(backend.to_string(), CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    /// Record a transient failure (timeout, 5xx, malformed response).
    pub fn record_failure(&self, backend: &str) {
        let now = self.clock.now();
        let mut states = self.states.write();
        match states.get(backend).cloned() {
            Some(CircuitState::Closed { failures }) => {
                if failures + 1 >= self.config.failure_threshold {
                    states.insert(backend.to_string(), CircuitState::Open { opened_at: now });
                    tracing::warn!(
                        backend = %backend,
                        failures = failures + 1,
                        "Circuit opened after repeated failures"
                    );
                } else {
                    states.insert(
                        backend.to_string(),
                        CircuitState::Closed {
                            failures: failures + 1,
                        },
                    );
                }
            }
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(backend.to_string(), CircuitState::Open { opened_at: now });
                tracing::warn!(backend = %backend, "Circuit reopened after failed recovery attempt");
            }
            None => {
                if self.config.failure_threshold <= 1 {
                    states.insert(backend.to_string(), CircuitState::Open { opened_at: now });
                    tracing::warn!(backend = %backend, failures = 1, "Circuit opened after repeated failures");
                } else {
                    states.insert(backend.to_string(), CircuitState::Closed { failures: 1 });
                }
            }
            _ => {}
        }
    }

    /// Take a backend out of service for the rest of the process.
    pub fn disable(&self, backend: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(backend = %backend, reason = %reason, "Backend disabled for this process");
        self.states
            .write()
            .insert(backend.to_string(), CircuitState::Disabled { reason });
    }

    /// Get current state of a backend.
    pub fn state(&self, backend: &str) -> CircuitState {
        self.states
            .read()
            .get(backend)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }
}
