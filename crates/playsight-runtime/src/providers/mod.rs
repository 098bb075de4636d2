//! Scoring backend abstractions for playsight-runtime.
//!
//! A backend is an opaque request/response function: it receives a system
//! prompt and an analysis prompt and returns free text. Wire protocols,
//! authentication and HTTP details belong to each backend implementation;
//! the orchestrator only sees [`ScoringBackend`].

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod registry;

pub use registry::{BackendRegistry, RegisteredBackend};

/// How the orchestrator should react to a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Backend is unusable for the rest of the process (auth, config)
    Terminal,

    /// Backend is throttling; skip it for this call only
    Throttled,

    /// Timeout, 5xx or garbage; skip for this call and count toward the circuit
    Transient,
}

/// Errors from scoring backends.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

impl BackendError {
    /// Classify the failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            BackendError::Auth(_) | BackendError::NotConfigured(_) => FailureKind::Terminal,
            BackendError::RateLimited { .. } => FailureKind::Throttled,
            BackendError::Api { status, .. } => match status {
                401 | 403 => FailureKind::Terminal,
                429 => FailureKind::Throttled,
                _ => FailureKind::Transient,
            },
            BackendError::Http(_) | BackendError::Malformed(_) | BackendError::Timeout(_) => {
                FailureKind::Transient
            }
        }
    }
}

/// Per-1K-token pricing of one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_k: f64,
    pub output_per_k: f64,
}

impl ModelPricing {
    /// Used when a backend or model has no pricing entry.
    pub const BASELINE: ModelPricing = ModelPricing {
        input_per_k: 0.003,
        output_per_k: 0.015,
    };
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self::BASELINE
    }
}

/// Static description of a remote backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub id: String,

    /// Lower is tried first
    #[serde(default = "default_priority")]
    pub priority: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Model sent with every request and used for cost estimates
    pub default_model: String,

    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    #[serde(default = "default_tokens_per_minute")]
    pub tokens_per_minute: u32,

    /// Model id → pricing
    #[serde(default)]
    pub pricing: BTreeMap<String, ModelPricing>,
}

fn default_priority() -> u32 {
    100
}

fn default_enabled() -> bool {
    true
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_tokens_per_minute() -> u32 {
    100_000
}

impl BackendDescriptor {
    /// Descriptor with default limits and no pricing table.
    pub fn new(id: impl Into<String>, priority: u32, default_model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority,
            enabled: true,
            default_model: default_model.into(),
            requests_per_minute: default_requests_per_minute(),
            tokens_per_minute: default_tokens_per_minute(),
            pricing: BTreeMap::new(),
        }
    }

    pub fn with_rate_limits(mut self, requests_per_minute: u32, tokens_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self.tokens_per_minute = tokens_per_minute;
        self
    }

    pub fn with_pricing(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.pricing.insert(model.into(), pricing);
        self
    }

    /// Pricing of the default model, or the baseline.
    pub fn default_pricing(&self) -> ModelPricing {
        self.pricing
            .get(&self.default_model)
            .copied()
            .unwrap_or(ModelPricing::BASELINE)
    }
}

/// A scoring request.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub system_prompt: String,
    pub analysis_prompt: String,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A raw backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    /// Free-text analysis
    pub text: String,

    pub tokens_used: u32,

    /// Raw status reported by the backend, when it has one
    pub status: Option<u16>,
}

impl BackendResponse {
    pub fn new(text: impl Into<String>, tokens_used: u32) -> Self {
        Self {
            text: text.into(),
            tokens_used,
            status: None,
        }
    }
}

/// A remote scoring backend.
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Backend id, matching its descriptor.
    fn id(&self) -> &str;

    /// Issue one scoring request.
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError>;

    /// Estimate tokens for a request (prompt plus the completion budget).
    fn estimate_tokens(&self, request: &BackendRequest) -> u32 {
        // Simple estimate: ~4 chars per token
        let prompt = (request.system_prompt.len() + request.analysis_prompt.len()) / 4;
        prompt as u32 + request.max_tokens
    }
}

type CallFn =
    dyn Fn(BackendRequest) -> BoxFuture<'static, Result<BackendResponse, BackendError>> + Send + Sync;

/// Adapts an async closure into a [`ScoringBackend`].
///
/// ```ignore
/// let backend = FnBackend::new("echo", |request| async move {
///     Ok(BackendResponse::new(format!("Overall: 70/100 ({})", request.model_id), 42))
/// });
/// ```
#[derive(Clone)]
pub struct FnBackend {
    id: String,
    call: Arc<CallFn>,
}

impl FnBackend {
    pub fn new<F, Fut>(id: impl Into<String>, call: F) -> Self
    where
        F: Fn(BackendRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BackendResponse, BackendError>> + Send + 'static,
    {
        Self {
            id: id.into(),
            call: Arc::new(move |request| call(request).boxed()),
        }
    }
}

impl std::fmt::Debug for FnBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBackend").field("id", &self.id).finish()
    }
}

#[async_trait]
impl ScoringBackend for FnBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        (self.call)(request.clone()).await
    }
}
