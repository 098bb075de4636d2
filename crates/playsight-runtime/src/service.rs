//! The consumer-facing analysis service.
//!
//! [`PlaysightService`] puts the cache in front of the orchestrator, owns the
//! periodic sweep task and writes best-effort snapshots after every change
//! to the cache.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use playsight_core::{AnalysisContext, AnalysisType, Play, StructuredAnalysis};

use crate::cache::{
    AnalysisCache, CacheKey, CacheSnapshot, CacheStats, FileSnapshotStore, InvalidationCriteria,
    OptimizeReport, SnapshotStore, SourceMetadata,
};
use crate::clock::SharedClock;
use crate::config::RuntimeConfig;
use crate::orchestrator::{Orchestrator, RuntimeError};
use crate::resilience::LedgerSnapshot;

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Try this backend before the priority order
    pub preferred_backend: Option<String>,

    /// Cancels the request when triggered
    pub cancel: Option<CancellationToken>,

    /// Cache TTL in minutes instead of the confidence-derived one
    pub ttl_override: Option<u64>,
}

impl AnalyzeOptions {
    pub fn preferring(backend: impl Into<String>) -> Self {
        Self {
            preferred_backend: Some(backend.into()),
            ..Default::default()
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Combined runtime statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub cache: CacheStats,
    pub ledger: LedgerSnapshot,
}

/// Cached, multi-backend play analysis.
pub struct PlaysightService {
    cache: Arc<AnalysisCache>,
    orchestrator: Orchestrator,
    snapshot_store: Option<Arc<dyn SnapshotStore>>,
    shutdown: CancellationToken,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl PlaysightService {
    /// Create a service. Snapshots go to `config.cache.snapshot_path` when set.
    pub fn new(config: &RuntimeConfig, clock: SharedClock, orchestrator: Orchestrator) -> Self {
        let snapshot_store = config
            .cache
            .snapshot_path
            .as_ref()
            .map(|path| Arc::new(FileSnapshotStore::new(path)) as Arc<dyn SnapshotStore>);

        Self {
            cache: Arc::new(AnalysisCache::new(config.cache.clone(), clock)),
            orchestrator,
            snapshot_store,
            shutdown: CancellationToken::new(),
            sweep_task: Mutex::new(None),
        }
    }

    /// Use a specific snapshot store instead of the configured path.
    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot_store = Some(store);
        self
    }

    /// Restore the last snapshot and start the periodic sweep. Returns the
    /// number of restored entries.
    pub async fn start(&self) -> Result<usize, RuntimeError> {
        let restored = self.load_snapshot().await;

        let mut sweep_task = self.sweep_task.lock();
        if sweep_task.is_none() {
            let cache = self.cache.clone();
            let store = self.snapshot_store.clone();
            let shutdown = self.shutdown.clone();
            let every = cache.config().sweep_interval;

            *sweep_task = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                // The first tick completes immediately
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = ticker.tick() => {
                            if cache.sweep_expired() > 0 {
                                if let Some(store) = &store {
                                    save_best_effort(&cache, store.as_ref()).await;
                                }
                            }
                        }
                    }
                }
                tracing::debug!("Cache sweep task stopped");
            }));
            tracing::info!(interval = ?every, restored, "Playsight service started");
        }

        Ok(restored)
    }

    /// Stop the sweep task and write a final snapshot.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.shutdown.cancel();
        let handle = self.sweep_task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Cache sweep task ended abnormally");
            }
        }
        self.persist().await?;
        tracing::info!("Playsight service stopped");
        Ok(())
    }

    /// Analyze a play, serving repeated requests from the cache.
    pub async fn analyze(
        &self,
        play: &Play,
        analysis_type: AnalysisType,
        context: Option<&AnalysisContext>,
        options: AnalyzeOptions,
    ) -> Result<StructuredAnalysis, RuntimeError> {
        let key = CacheKey::derive(play, analysis_type, context);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let cancel = options.cancel.unwrap_or_default();
        let analysis = self
            .orchestrator
            .analyze(
                play,
                analysis_type,
                context,
                options.preferred_backend.as_deref(),
                &cancel,
            )
            .await?;

        let source = SourceMetadata::from_analysis(&analysis);
        self.cache.set(key, analysis.clone(), source, options.ttl_override);
        self.persist_best_effort().await;

        Ok(analysis)
    }

    /// Remove cached entries matching `criteria`.
    pub async fn invalidate(&self, criteria: &InvalidationCriteria) -> usize {
        let removed = self.cache.invalidate(criteria);
        if removed > 0 {
            self.persist_best_effort().await;
        }
        removed
    }

    /// Prune low-value entries and retune TTLs.
    pub async fn optimize(&self) -> OptimizeReport {
        let report = self.cache.optimize();
        self.persist_best_effort().await;
        report
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            cache: self.cache.stats(),
            ledger: self.orchestrator.ledger().snapshot(),
        }
    }

    /// Enable or disable a remote backend at runtime.
    pub fn set_backend_enabled(&self, backend: &str, enabled: bool) -> bool {
        self.orchestrator.set_backend_enabled(backend, enabled)
    }

    /// Zero the daily spend and all rate windows.
    pub fn reset_daily_usage(&self) {
        self.orchestrator.ledger().reset_daily();
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Write a snapshot now.
    pub async fn persist(&self) -> Result<(), RuntimeError> {
        match &self.snapshot_store {
            Some(store) => save_snapshot(&self.cache, store.as_ref()).await,
            None => Ok(()),
        }
    }

    async fn persist_best_effort(&self) {
        if let Some(store) = &self.snapshot_store {
            save_best_effort(&self.cache, store.as_ref()).await;
        }
    }

    async fn load_snapshot(&self) -> usize {
        let Some(store) = &self.snapshot_store else {
            return 0;
        };
        match store.load().await {
            Ok(Some(bytes)) => CacheSnapshot::decode(&bytes)
                .map(|snapshot| self.cache.restore(snapshot))
                .unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load cache snapshot, starting cold");
                0
            }
        }
    }
}

async fn save_snapshot(cache: &AnalysisCache, store: &dyn SnapshotStore) -> Result<(), RuntimeError> {
    let bytes = cache.snapshot().encode()?;
    store.save(&bytes).await?;
    Ok(())
}

async fn save_best_effort(cache: &AnalysisCache, store: &dyn SnapshotStore) {
    if let Err(e) = save_snapshot(cache, store).await {
        tracing::warn!(error = %e, "Failed to persist cache snapshot");
    }
}

impl Drop for PlaysightService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
