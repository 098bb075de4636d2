//! Multi-backend orchestration.
//!
//! The orchestrator always computes the local analysis first, then walks the
//! remote backends in priority order until one answers with something the
//! parser understands. It implements:
//! - Preferred-backend ordering with the local engine as the floor
//! - Per-backend health circuits and rate/cost admission
//! - A timeout per call and cooperative cancellation
//! - Failure classification (disable, skip, or count toward the circuit)

use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use playsight_core::{AnalysisContext, AnalysisError, AnalysisType, Play, StructuredAnalysis};

use crate::cache::PersistError;
use crate::clock::{SharedClock, SystemClock};
use crate::config::{ConfigError, OrchestratorConfig, RuntimeConfig};
use crate::normalize::{merge, ResponseParser};
use crate::prompts::{build_analysis_prompt, SYSTEM_PROMPT};
use crate::providers::{
    BackendDescriptor, BackendError, BackendRegistry, BackendRequest, FailureKind, RegisteredBackend,
    ScoringBackend,
};
use crate::resilience::{BackendHealth, UsageLedger};

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Local analysis failed: {0}")]
    LocalAnalysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend registration failed: {0}")]
    Registration(#[from] BackendError),

    #[error("Cache persistence failed: {0}")]
    Persist(#[from] PersistError),
}

/// Routes analysis requests across remote backends with a local floor.
pub struct Orchestrator {
    registry: BackendRegistry,
    ledger: UsageLedger,
    health: BackendHealth,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Analyze a play, trying remote backends before falling back to the
    /// local result.
    ///
    /// # Execution Flow
    /// 1. Compute the local analysis (its failure is the only fatal error)
    /// 2. For each enabled backend in priority order: check health, check
    ///    admission, call under the timeout, parse and merge on success
    /// 3. Return the local analysis when no backend produced a result
    pub async fn analyze(
        &self,
        play: &Play,
        analysis_type: AnalysisType,
        context: Option<&AnalysisContext>,
        preferred_backend: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<StructuredAnalysis, RuntimeError> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let local = playsight_core::analyze(play, analysis_type, context)?;
        let candidates = self.registry.priority_order(preferred_backend);
        if candidates.is_empty() {
            tracing::debug!("No remote backends enabled, using local analysis");
            return Ok(local);
        }

        let analysis_prompt = build_analysis_prompt(play, analysis_type, context);

        for entry in candidates {
            if cancel.is_cancelled() {
                return Err(RuntimeError::Cancelled);
            }

            let backend = entry.id();
            if !self.health.is_available(backend) {
                tracing::debug!(backend = %backend, "Backend unavailable, skipping");
                continue;
            }

            let request = BackendRequest {
                system_prompt: SYSTEM_PROMPT.to_string(),
                analysis_prompt: analysis_prompt.clone(),
                model_id: entry.descriptor.default_model.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };

            let estimated_tokens = entry.backend.estimate_tokens(&request);
            if !self.ledger.can_admit(backend, estimated_tokens) {
                tracing::debug!(
                    backend = %backend,
                    estimated_tokens,
                    "Backend not admitted by rate or budget limits, skipping"
                );
                continue;
            }

            match self.call(entry, &request, cancel).await? {
                Ok(parsed) => {
                    self.health.record_success(backend);
                    tracing::info!(backend = %backend, analysis_type = %analysis_type, "Remote analysis merged");
                    return Ok(merge(&local, &parsed, backend));
                }
                Err(e) => self.handle_failure(backend, &e),
            }
        }

        tracing::info!(analysis_type = %analysis_type, "All remote backends skipped or failed, using local analysis");
        Ok(local)
    }

    /// Issue one call, racing it against cancellation. The outer error is
    /// cancellation; the inner one is the backend's.
    async fn call(
        &self,
        entry: &RegisteredBackend,
        request: &BackendRequest,
        cancel: &CancellationToken,
    ) -> Result<Result<crate::normalize::ParsedResponse, BackendError>, RuntimeError> {
        let backend = entry.id();
        let timeout = self.config.request_timeout;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(backend = %backend, "Cancelled while waiting for backend");
                return Err(RuntimeError::Cancelled);
            }
            result = tokio::time::timeout(timeout, entry.backend.complete(request)) => {
                result.unwrap_or_else(|_| Err(BackendError::Timeout(timeout)))
            }
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => return Ok(Err(e)),
        };

        let cost = self.ledger.estimate_cost(Some(backend), response.tokens_used);
        self.ledger.record_usage(backend, response.tokens_used, cost);

        if response.text.trim().is_empty() {
            return Ok(Err(BackendError::Malformed("empty response".to_string())));
        }
        let parsed = entry.parser.parse(&response.text);
        if parsed.is_empty() {
            return Ok(Err(BackendError::Malformed(
                "response contained no recognizable fields".to_string(),
            )));
        }
        Ok(Ok(parsed))
    }

    fn handle_failure(&self, backend: &str, error: &BackendError) {
        match error.kind() {
            FailureKind::Terminal => {
                self.health.disable(backend, error.to_string());
                self.registry.set_enabled(backend, false);
            }
            FailureKind::Throttled => {
                tracing::warn!(backend = %backend, error = %error, "Backend throttled, skipping for this request");
            }
            FailureKind::Transient => {
                tracing::warn!(backend = %backend, error = %error, "Backend call failed");
                self.health.record_failure(backend);
            }
        }
    }

    /// Enable or disable a backend at runtime. A backend disabled after an
    /// authentication or configuration failure stays unavailable.
    pub fn set_backend_enabled(&self, backend: &str, enabled: bool) -> bool {
        self.registry.set_enabled(backend, enabled)
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn health(&self) -> &BackendHealth {
        &self.health
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: RuntimeConfig,
    clock: SharedClock,
    backends: Vec<(Option<BackendDescriptor>, Arc<dyn ScoringBackend>, Option<Arc<dyn ResponseParser>>)>,
}

impl OrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            clock: Arc::new(SystemClock),
            backends: Vec::new(),
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the clock used by the ledger and health circuits.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Add a backend described in the configuration under the same id.
    pub fn backend(mut self, backend: Arc<dyn ScoringBackend>) -> Self {
        self.backends.push((None, backend, None));
        self
    }

    /// Add a backend with an explicit descriptor.
    pub fn backend_with_descriptor(
        mut self,
        descriptor: BackendDescriptor,
        backend: Arc<dyn ScoringBackend>,
    ) -> Self {
        self.backends.push((Some(descriptor), backend, None));
        self
    }

    /// Add a backend with an explicit descriptor and its own response parser.
    pub fn backend_with_parser(
        mut self,
        descriptor: BackendDescriptor,
        backend: Arc<dyn ScoringBackend>,
        parser: Arc<dyn ResponseParser>,
    ) -> Self {
        self.backends.push((Some(descriptor), backend, Some(parser)));
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<Orchestrator, RuntimeError> {
        self.config.validate()?;

        let mut registry = BackendRegistry::new();
        for (descriptor, backend, parser) in self.backends {
            let descriptor = match descriptor {
                Some(descriptor) => descriptor,
                None => self
                    .config
                    .backends
                    .iter()
                    .find(|d| d.id == backend.id())
                    .cloned()
                    .ok_or_else(|| {
                        BackendError::NotConfigured(format!("no descriptor for backend '{}'", backend.id()))
                    })?,
            };
            match parser {
                Some(parser) => registry.register_with_parser(descriptor, backend, parser)?,
                None => registry.register(descriptor, backend)?,
            }
        }

        for descriptor in &self.config.backends {
            if registry.get(&descriptor.id).is_none() {
                tracing::warn!(backend = %descriptor.id, "Backend configured but no implementation registered");
            }
        }

        let ledger = UsageLedger::with_backends(&self.config.ledger, self.clock.clone(), registry.descriptors());
        let health = BackendHealth::new(self.config.orchestrator.circuit_breaker.clone(), self.clock);

        tracing::info!(backends = ?registry.ids(), "Orchestrator ready");
        Ok(Orchestrator {
            registry,
            ledger,
            health,
            config: self.config.orchestrator,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::LedgerConfig;
    use crate::providers::{BackendResponse, FnBackend};
    use crate::resilience::CircuitState;
    use playsight_core::LOCAL_BACKEND;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const PLAY: &str = r#"
name: Overlap
formation: 2-1-2
players:
  - { id: gk, position: { x: 5, y: 50 }, role: goalkeeper }
  - { id: lb, position: { x: 25, y: 20 } }
  - { id: rb, position: { x: 25, y: 80 } }
  - { id: cm, position: { x: 50, y: 50 } }
  - { id: lw, position: { x: 75, y: 20 } }
  - { id: rw, position: { x: 75, y: 80 } }
movements:
  - { player_id: lb, to: { x: 60, y: 10 }, start_secs: 0, duration_secs: 3 }
  - { player_id: cm, to: { x: 70, y: 50 }, start_secs: 2, duration_secs: 2 }
objectives: [score, width]
"#;

    const GOOD_RESPONSE: &str = "Overall: 90/100\nSpacing: 60/100\n";

    fn play() -> Play {
        Play::from_yaml(PLAY).unwrap()
    }

    fn counting_backend(id: &str, calls: Arc<AtomicUsize>, reply: Result<&'static str, u16>) -> Arc<FnBackend> {
        Arc::new(FnBackend::new(id, move |_request| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                match reply {
                    Ok(text) => Ok(BackendResponse::new(text, 500)),
                    Err(401) => Err(BackendError::Auth("bad key".to_string())),
                    Err(429) => Err(BackendError::RateLimited { retry_after: None }),
                    Err(status) => Err(BackendError::Api {
                        status,
                        message: "boom".to_string(),
                    }),
                }
            }
        }))
    }

    fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new().clock(Arc::new(ManualClock::default()))
    }

    #[tokio::test]
    async fn test_no_backends_returns_local() {
        let orchestrator = builder().build().unwrap();
        let result = orchestrator
            .analyze(&play(), AnalysisType::Quick, None, None, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_local());
        assert_eq!(result, playsight_core::analyze(&play(), AnalysisType::Quick, None).unwrap());
    }

    #[tokio::test]
    async fn test_remote_result_is_merged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = builder()
            .backend_with_descriptor(
                BackendDescriptor::new("alpha", 1, "scorer"),
                counting_backend("alpha", calls.clone(), Ok(GOOD_RESPONSE)),
            )
            .build()
            .unwrap();

        let local = playsight_core::analyze(&play(), AnalysisType::Quick, None).unwrap();
        let result = orchestrator
            .analyze(&play(), AnalysisType::Quick, None, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.metadata.source_backend, "alpha");
        assert_eq!(result.categories.spacing.score, crate::normalize::blend(60, local.categories.spacing.score));
        assert_eq!(result.overall_score, crate::normalize::blend(90, local.overall_score));
        assert_eq!(result.metadata.confidence, (local.metadata.confidence + 10).min(95));
        assert_eq!(orchestrator.ledger().snapshot().costs.request_count, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_falls_through() {
        let alpha_calls = Arc::new(AtomicUsize::new(0));
        let beta_calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = builder()
            .backend_with_descriptor(
                BackendDescriptor::new("alpha", 1, "scorer"),
                counting_backend("alpha", alpha_calls.clone(), Err(503)),
            )
            .backend_with_descriptor(
                BackendDescriptor::new("beta", 2, "scorer"),
                counting_backend("beta", beta_calls.clone(), Ok(GOOD_RESPONSE)),
            )
            .build()
            .unwrap();

        let result = orchestrator
            .analyze(&play(), AnalysisType::Quick, None, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.metadata.source_backend, "beta");
        assert_eq!(alpha_calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.health().state("alpha"), CircuitState::Closed { failures: 1 });
    }

    #[tokio::test]
    async fn test_auth_failure_disables_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = builder()
            .backend_with_descriptor(
                BackendDescriptor::new("alpha", 1, "scorer"),
                counting_backend("alpha", calls.clone(), Err(401)),
            )
            .build()
            .unwrap();

        for _ in 0..3 {
            let result = orchestrator
                .analyze(&play(), AnalysisType::Quick, None, None, &CancellationToken::new())
                .await
                .unwrap();
            assert!(result.is_local());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!orchestrator.registry().is_enabled("alpha"));
        assert!(matches!(orchestrator.health().state("alpha"), CircuitState::Disabled { .. }));

        // Re-enabling does not revive a disabled backend
        orchestrator.set_backend_enabled("alpha", true);
        orchestrator
            .analyze(&play(), AnalysisType::Quick, None, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_throttling_skips_without_counting_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = builder()
            .backend_with_descriptor(
                BackendDescriptor::new("alpha", 1, "scorer"),
                counting_backend("alpha", calls.clone(), Err(429)),
            )
            .build()
            .unwrap();

        for _ in 0..2 {
            let result = orchestrator
                .analyze(&play(), AnalysisType::Quick, None, None, &CancellationToken::new())
                .await
                .unwrap();
            assert!(result.is_local());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.health().state("alpha"), CircuitState::Closed { failures: 0 });
    }

    #[tokio::test]
    async fn test_preferred_backend_goes_first() {
        let alpha_calls = Arc::new(AtomicUsize::new(0));
        let beta_calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = builder()
            .backend_with_descriptor(
                BackendDescriptor::new("alpha", 1, "scorer"),
                counting_backend("alpha", alpha_calls.clone(), Ok(GOOD_RESPONSE)),
            )
            .backend_with_descriptor(
                BackendDescriptor::new("beta", 2, "scorer"),
                counting_backend("beta", beta_calls.clone(), Ok(GOOD_RESPONSE)),
            )
            .build()
            .unwrap();

        let result = orchestrator
            .analyze(&play(), AnalysisType::Quick, None, Some("beta"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.metadata.source_backend, "beta");
        assert_eq!(alpha_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_budget_refusal_skips_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = RuntimeConfig {
            ledger: LedgerConfig {
                daily_limit: 0.0001,
                ..Default::default()
            },
            ..Default::default()
        };
        let orchestrator = builder()
            .config(config)
            .backend_with_descriptor(
                BackendDescriptor::new("alpha", 1, "scorer"),
                counting_backend("alpha", calls.clone(), Ok(GOOD_RESPONSE)),
            )
            .build()
            .unwrap();

        let result = orchestrator
            .analyze(&play(), AnalysisType::Quick, None, None, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_local());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_response_counts_as_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = builder()
            .backend_with_descriptor(
                BackendDescriptor::new("alpha", 1, "scorer"),
                counting_backend("alpha", calls.clone(), Ok("I cannot help with that.")),
            )
            .build()
            .unwrap();

        let result = orchestrator
            .analyze(&play(), AnalysisType::Quick, None, None, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_local());
        assert_eq!(orchestrator.health().state("alpha"), CircuitState::Closed { failures: 1 });
        // Tokens were spent even though the answer was useless
        assert_eq!(orchestrator.ledger().snapshot().costs.request_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_local() {
        let slow = Arc::new(FnBackend::new("slow", |_request| async {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(BackendResponse::new(GOOD_RESPONSE, 10))
        }));
        let orchestrator = builder()
            .backend_with_descriptor(BackendDescriptor::new("slow", 1, "scorer"), slow)
            .build()
            .unwrap();

        let result = orchestrator
            .analyze(&play(), AnalysisType::Quick, None, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.metadata.source_backend, LOCAL_BACKEND);
        assert_eq!(orchestrator.health().state("slow"), CircuitState::Closed { failures: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_call() {
        let slow = Arc::new(FnBackend::new("slow", |_request| async {
            tokio::time::sleep(Duration::from_secs(20)).await;
            Ok(BackendResponse::new(GOOD_RESPONSE, 10))
        }));
        let orchestrator = builder()
            .backend_with_descriptor(BackendDescriptor::new("slow", 1, "scorer"), slow)
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = orchestrator
            .analyze(&play(), AnalysisType::Quick, None, None, &cancel)
            .await;
        assert!(matches!(result, Err(RuntimeError::Cancelled)));
        assert_eq!(orchestrator.health().state("slow"), CircuitState::Closed { failures: 0 });
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let orchestrator = builder().build().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orchestrator
            .analyze(&play(), AnalysisType::Quick, None, None, &cancel)
            .await;
        assert!(matches!(result, Err(RuntimeError::Cancelled)));
    }

    #[tokio::test]
    async fn test_invalid_play_is_local_analysis_error() {
        let mut play = play();
        play.players.clear();
        let orchestrator = builder().build().unwrap();

        let result = orchestrator
            .analyze(&play, AnalysisType::Quick, None, None, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(RuntimeError::LocalAnalysis(_))));
    }

    #[test]
    fn test_backend_without_descriptor_is_rejected() {
        let backend = Arc::new(FnBackend::new("ghost", |_request| async {
            Ok(BackendResponse::new("", 0))
        }));
        let result = builder().backend(backend).build();
        assert!(matches!(result, Err(RuntimeError::Registration(_))));
    }

    #[test]
    fn test_backend_descriptor_from_config() {
        let config = RuntimeConfig {
            backends: vec![BackendDescriptor::new("alpha", 1, "scorer")],
            ..Default::default()
        };
        let backend = Arc::new(FnBackend::new("alpha", |_request| async {
            Ok(BackendResponse::new("", 0))
        }));
        let orchestrator = builder().config(config).backend(backend).build().unwrap();
        assert_eq!(orchestrator.registry().ids(), vec!["alpha"]);
    }
}
