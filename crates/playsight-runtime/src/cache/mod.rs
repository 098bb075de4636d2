//! Caching layer for playsight-runtime.
//!
//! Stores structured analyses keyed by a content fingerprint of the play,
//! analysis type and context, so repeated requests skip remote scoring.

mod key;
mod persistence;
mod store;

pub use key::CacheKey;
pub use persistence::{
    CacheSnapshot, FileSnapshotStore, MemorySnapshotStore, PersistError, SnapshotStore,
    SNAPSHOT_ACCESS_LOG_TAIL, SNAPSHOT_MAX_ENTRIES,
};
pub use store::{
    AnalysisCache, CacheEntry, CacheStats, InvalidationCriteria, OptimizeReport, SourceMetadata,
};
