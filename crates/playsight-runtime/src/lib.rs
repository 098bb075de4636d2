//! # playsight-runtime
//!
//! Cached, multi-backend analysis for Playsight.
//!
//! This crate wraps the deterministic engine in `playsight-core` with:
//! - An analysis cache with confidence-aware TTLs, LRU eviction and snapshots
//! - A priority-ordered walk over remote scoring backends
//! - Per-backend rate windows, a shared daily budget and health circuits
//! - Parsing and merging of free-text backend answers into the local result
//!
//! ## Important
//!
//! Remote backends are OPTIONAL. When none is registered, every backend is
//! skipped, or all of them fail, the local analysis is returned. The only
//! errors callers see are cancellation and a play the local engine rejects.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use playsight_runtime::{
//!     AnalyzeOptions, BackendDescriptor, OrchestratorBuilder, PlaysightService,
//!     RuntimeConfig, SystemClock,
//! };
//!
//! let config = RuntimeConfig::from_file("playsight.yaml")?;
//! let clock = Arc::new(SystemClock);
//! let orchestrator = OrchestratorBuilder::new()
//!     .config(config.clone())
//!     .clock(clock.clone())
//!     .backend(Arc::new(my_backend))
//!     .build()?;
//!
//! let service = PlaysightService::new(&config, clock, orchestrator);
//! service.start().await?;
//! let analysis = service
//!     .analyze(&play, AnalysisType::Detailed, None, AnalyzeOptions::default())
//!     .await?;
//! service.shutdown().await?;
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod normalize;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod service;

pub use cache::{
    AnalysisCache, CacheEntry, CacheKey, CacheSnapshot, CacheStats, FileSnapshotStore,
    InvalidationCriteria, MemorySnapshotStore, OptimizeReport, PersistError, SnapshotStore,
    SourceMetadata,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{CacheConfig, ConfigError, LedgerConfig, OrchestratorConfig, RuntimeConfig};
pub use normalize::{merge, ParsedResponse, ResponseParser, TextResponseParser};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, RuntimeError};
pub use providers::{
    BackendDescriptor, BackendError, BackendRegistry, BackendRequest, BackendResponse,
    FailureKind, FnBackend, ModelPricing, ScoringBackend,
};
pub use resilience::{BackendHealth, CircuitBreakerConfig, CircuitState, LedgerSnapshot, UsageLedger};
pub use service::{AnalyzeOptions, PlaysightService, ServiceStats};
