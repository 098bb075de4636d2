//! In-memory analysis cache.
//!
//! Entries live in an access-ordered LRU list behind a single mutex. Their
//! TTL depends on the confidence and source of the payload, and capacity is
//! bounded by both entry count and the summed serialized payload size.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use playsight_core::{AnalysisType, StructuredAnalysis, LOCAL_BACKEND};

use super::key::CacheKey;
use super::persistence::{CacheSnapshot, SNAPSHOT_ACCESS_LOG_TAIL, SNAPSHOT_MAX_ENTRIES};
use crate::clock::SharedClock;
use crate::config::CacheConfig;

/// Entries older than this are candidates for low-value pruning.
const STALE_AGE_DAYS: i64 = 7;

/// Minimum accesses per day a stale entry needs to survive optimization.
const MIN_DAILY_ACCESS_RATE: f64 = 0.1;

/// Entries below this confidence are pruned by optimization.
const MIN_RETAINED_CONFIDENCE: u8 = 60;

/// Payloads larger than this are pruned by optimization.
const MAX_RETAINED_SIZE: usize = 50 * 1024;

/// Accesses within the last day that earn a TTL extension.
const HOT_ACCESS_COUNT: usize = 5;

/// Timestamps kept per key in the live access log.
const ACCESS_LOG_LIMIT: usize = 100;

/// Where a cached payload came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub backend: String,
    pub confidence: u8,
    pub schema_version: String,
}

impl SourceMetadata {
    pub fn from_analysis(analysis: &StructuredAnalysis) -> Self {
        Self {
            backend: analysis.metadata.source_backend.clone(),
            confidence: analysis.metadata.confidence,
            schema_version: analysis.metadata.schema_version.clone(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.backend != LOCAL_BACKEND
    }
}

/// A cached analysis and its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: StructuredAnalysis,
    pub source: SourceMetadata,
    pub analysis_type: AnalysisType,
    pub created_at: DateTime<Utc>,
    pub ttl_minutes: u64,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
    pub size_bytes: usize,
}

impl CacheEntry {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(ttl_duration(self.ttl_minutes))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// An entry is live strictly before `created_at + ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Predicates for bulk invalidation. All set predicates must match; an
/// empty criteria matches every entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvalidationCriteria {
    pub source_backend: Option<String>,
    pub analysis_type: Option<AnalysisType>,

    /// Entries created longer ago than this
    #[serde(default, with = "optional_duration_str")]
    pub older_than: Option<Duration>,

    pub min_confidence: Option<u8>,
    pub max_confidence: Option<u8>,
}

impl InvalidationCriteria {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.source_backend = Some(backend.into());
        self
    }

    pub fn with_type(mut self, analysis_type: AnalysisType) -> Self {
        self.analysis_type = Some(analysis_type);
        self
    }

    pub fn with_older_than(mut self, age: Duration) -> Self {
        self.older_than = Some(age);
        self
    }

    pub fn with_confidence_between(mut self, min: Option<u8>, max: Option<u8>) -> Self {
        self.min_confidence = min;
        self.max_confidence = max;
        self
    }

    fn matches(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        if let Some(backend) = &self.source_backend {
            if &entry.source.backend != backend {
                return false;
            }
        }
        if let Some(analysis_type) = self.analysis_type {
            if entry.analysis_type != analysis_type {
                return false;
            }
        }
        if let Some(age) = self.older_than {
            let age = ChronoDuration::from_std(age).unwrap_or(ChronoDuration::MAX);
            if now - entry.created_at <= age {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if entry.source.confidence < min {
                return false;
            }
        }
        if let Some(max) = self.max_confidence {
            if entry.source.confidence > max {
                return false;
            }
        }
        true
    }
}

/// Result of an optimization pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizeReport {
    pub entries_removed: usize,
    pub bytes_freed: usize,

    /// Lifetime hit rate now minus the rate at the previous pass
    pub hit_rate_delta: f64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub by_backend: BTreeMap<String, usize>,
    pub by_analysis_type: BTreeMap<String, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

struct CacheState {
    entries: LruCache<CacheKey, CacheEntry>,
    total_bytes: usize,
    hits: u64,
    misses: u64,
    access_log: HashMap<CacheKey, VecDeque<DateTime<Utc>>>,
    last_optimize_hit_rate: Option<f64>,
}

impl CacheState {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_bytes: 0,
            hits: 0,
            misses: 0,
            access_log: HashMap::new(),
            last_optimize_hit_rate: None,
        }
    }

    fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size_bytes);
        self.access_log.remove(key);
        Some(entry)
    }

    fn insert(&mut self, entry: CacheEntry) {
        self.total_bytes += entry.size_bytes;
        self.entries.put(entry.key.clone(), entry);
    }

    fn record_access(&mut self, key: &CacheKey, at: DateTime<Utc>) {
        let log = self.access_log.entry(key.clone()).or_default();
        log.push_back(at);
        while log.len() > ACCESS_LOG_LIMIT {
            log.pop_front();
        }
    }

    /// Evict LRU entries until one more entry of `new_size` bytes fits.
    fn ensure_capacity(&mut self, new_size: usize, max_entries: usize, max_bytes: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() >= max_entries || self.total_bytes + new_size > max_bytes {
            let Some((key, entry)) = self.entries.pop_lru() else {
                break;
            };
            self.total_bytes = self.total_bytes.saturating_sub(entry.size_bytes);
            self.access_log.remove(&key);
            evicted += 1;
            tracing::debug!(key = %key, size = entry.size_bytes, "Evicted least recently used entry");
        }
        evicted
    }

    /// Remove matching entries, returning (count, bytes).
    fn remove_where(&mut self, mut predicate: impl FnMut(&CacheEntry) -> bool) -> (usize, usize) {
        let doomed: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|&(_, entry)| predicate(entry))
            .map(|(key, _)| key.clone())
            .collect();

        let mut bytes = 0;
        for key in &doomed {
            if let Some(entry) = self.remove(key) {
                bytes += entry.size_bytes;
            }
        }
        (doomed.len(), bytes)
    }

    fn recent_accesses(&self, key: &CacheKey, since: DateTime<Utc>) -> usize {
        self.access_log
            .get(key)
            .map(|log| log.iter().filter(|at| **at > since).count())
            .unwrap_or(0)
    }
}

/// Analysis cache with confidence-aware TTLs and LRU eviction.
pub struct AnalysisCache {
    config: CacheConfig,
    clock: SharedClock,
    state: Mutex<CacheState>,
}

impl AnalysisCache {
    pub fn new(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(CacheState::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a live entry. Expired entries are removed and count as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<StructuredAnalysis> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let live = state.entries.peek(key).map(|entry| !entry.is_expired(now));
        match live {
            Some(true) => {
                let payload = state.entries.get_mut(key).map(|entry| {
                    entry.access_count += 1;
                    entry.last_accessed_at = now;
                    entry.payload.clone()
                });
                state.hits += 1;
                state.record_access(key, now);
                tracing::debug!(key = %key, "Cache hit");
                payload
            }
            Some(false) => {
                state.remove(key);
                state.misses += 1;
                tracing::debug!(key = %key, "Cache entry expired");
                None
            }
            None => {
                state.misses += 1;
                tracing::debug!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// TTL in minutes for a payload from `source`.
    pub fn ttl_for(&self, source: &SourceMetadata) -> u64 {
        let mut ttl = self.config.default_ttl_minutes() as f64;
        if source.confidence > 90 {
            ttl *= 2.0;
        } else if source.confidence > 80 {
            ttl *= 1.5;
        } else if source.confidence < 60 {
            ttl *= 0.5;
        }
        if source.is_remote() {
            ttl *= 1.5;
        }
        (ttl.round() as u64).max(1)
    }

    /// Insert or replace an entry. `ttl_override` is in minutes.
    pub fn set(
        &self,
        key: CacheKey,
        payload: StructuredAnalysis,
        source: SourceMetadata,
        ttl_override: Option<u64>,
    ) {
        let now = self.clock.now();
        let ttl_minutes = ttl_override.unwrap_or_else(|| self.ttl_for(&source)).max(1);
        let size_bytes = payload_size(&payload);
        let analysis_type = payload.metadata.analysis_type;

        let mut state = self.state.lock();
        state.remove(&key);
        state.ensure_capacity(size_bytes, self.config.max_entries, self.config.max_bytes);

        tracing::debug!(
            key = %key,
            backend = %source.backend,
            ttl_minutes,
            size = size_bytes,
            "Caching analysis"
        );
        state.insert(CacheEntry {
            key,
            payload,
            source,
            analysis_type,
            created_at: now,
            ttl_minutes,
            access_count: 1,
            last_accessed_at: now,
            size_bytes,
        });
    }

    /// Evict LRU entries until an entry of `new_size` bytes fits. Returns
    /// the number evicted.
    pub fn ensure_capacity(&self, new_size: usize) -> usize {
        self.state
            .lock()
            .ensure_capacity(new_size, self.config.max_entries, self.config.max_bytes)
    }

    /// Remove one entry.
    pub fn remove(&self, key: &CacheKey) -> bool {
        self.state.lock().remove(key).is_some()
    }

    /// Remove every entry matching `criteria`.
    pub fn invalidate(&self, criteria: &InvalidationCriteria) -> usize {
        let now = self.clock.now();
        let (removed, _) = self.state.lock().remove_where(|entry| criteria.matches(entry, now));
        if removed > 0 {
            tracing::info!(removed, criteria = ?criteria, "Invalidated cache entries");
        }
        removed
    }

    /// Remove every expired entry.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let (removed, _) = self.state.lock().remove_where(|entry| entry.is_expired(now));
        if removed > 0 {
            tracing::debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    /// Prune low-value entries, retune TTLs by recent use, then sweep.
    pub fn optimize(&self) -> OptimizeReport {
        let now = self.clock.now();
        let default_ttl = self.config.default_ttl_minutes();
        let ttl_cap = default_ttl * 2;
        let ttl_floor = (default_ttl / 2).max(1);
        let day_ago = now - ChronoDuration::hours(24);

        let mut state = self.state.lock();

        let (mut entries_removed, mut bytes_freed) = state.remove_where(|entry| is_low_value(entry, now));

        let hot: HashSet<CacheKey> = state
            .entries
            .iter()
            .map(|(key, _)| key)
            .filter(|key| state.recent_accesses(key, day_ago) > HOT_ACCESS_COUNT)
            .cloned()
            .collect();

        // iter_mut does not reorder the LRU list
        for (key, entry) in state.entries.iter_mut() {
            if hot.contains(key) {
                if entry.ttl_minutes < ttl_cap {
                    entry.ttl_minutes = ((entry.ttl_minutes as f64 * 1.2).round() as u64).min(ttl_cap);
                }
            } else if entry.last_accessed_at <= day_ago && entry.ttl_minutes > ttl_floor {
                entry.ttl_minutes = ((entry.ttl_minutes as f64 * 0.8).round() as u64).max(ttl_floor);
            }
        }

        let (expired, expired_bytes) = state.remove_where(|entry| entry.is_expired(now));
        entries_removed += expired;
        bytes_freed += expired_bytes;

        let hit_rate = state.hit_rate();
        let hit_rate_delta = state
            .last_optimize_hit_rate
            .map(|previous| hit_rate - previous)
            .unwrap_or(0.0);
        state.last_optimize_hit_rate = Some(hit_rate);

        tracing::info!(entries_removed, bytes_freed, hit_rate_delta, "Cache optimized");
        OptimizeReport {
            entries_removed,
            bytes_freed,
            hit_rate_delta,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = CacheStats {
            entries: state.entries.len(),
            total_bytes: state.total_bytes,
            hits: state.hits,
            misses: state.misses,
            hit_rate: state.hit_rate(),
            ..Default::default()
        };

        for (_, entry) in state.entries.iter() {
            *stats.by_backend.entry(entry.source.backend.clone()).or_default() += 1;
            *stats
                .by_analysis_type
                .entry(entry.analysis_type.to_string())
                .or_default() += 1;
            stats.oldest = Some(stats.oldest.map_or(entry.created_at, |t| t.min(entry.created_at)));
            stats.newest = Some(stats.newest.map_or(entry.created_at, |t| t.max(entry.created_at)));
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capture the most recently accessed entries for persistence.
    pub fn snapshot(&self) -> CacheSnapshot {
        let now = self.clock.now();
        let state = self.state.lock();

        let entries: Vec<(CacheKey, CacheEntry)> = state
            .entries
            .iter()
            .take(SNAPSHOT_MAX_ENTRIES)
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();

        let access_log = entries
            .iter()
            .filter_map(|(key, _)| {
                let log = state.access_log.get(key)?;
                let skip = log.len().saturating_sub(SNAPSHOT_ACCESS_LOG_TAIL);
                Some((key.clone(), log.iter().skip(skip).copied().collect::<Vec<_>>()))
            })
            .collect();

        CacheSnapshot {
            timestamp: now,
            entries,
            access_log,
            hits: state.hits,
            misses: state.misses,
        }
    }

    /// Replace the cache contents with a snapshot. Snapshots older than the
    /// configured maximum age are ignored and expired entries are skipped.
    /// Returns the number of entries restored.
    pub fn restore(&self, snapshot: CacheSnapshot) -> usize {
        let now = self.clock.now();
        let max_age = ChronoDuration::from_std(self.config.snapshot_max_age).unwrap_or(ChronoDuration::MAX);
        if now - snapshot.timestamp > max_age {
            tracing::info!(taken_at = %snapshot.timestamp, "Cache snapshot too old, starting cold");
            return 0;
        }

        let mut state = self.state.lock();
        *state = CacheState::new();
        state.hits = snapshot.hits;
        state.misses = snapshot.misses;

        let mut access_log = snapshot.access_log;
        let mut restored = 0;
        // Oldest first so the most recently accessed entry ends up MRU
        for (key, mut entry) in snapshot.entries.into_iter().rev() {
            if entry.is_expired(now) {
                continue;
            }
            entry.key = key.clone();
            state.ensure_capacity(entry.size_bytes, self.config.max_entries, self.config.max_bytes);
            state.insert(entry);
            if let Some(log) = access_log.remove(&key) {
                state.access_log.insert(key, log.into_iter().collect());
            }
            restored += 1;
        }

        tracing::info!(restored, "Restored cache snapshot");
        restored
    }
}

fn ttl_duration(minutes: u64) -> ChronoDuration {
    i64::try_from(minutes)
        .ok()
        .and_then(ChronoDuration::try_minutes)
        .unwrap_or(ChronoDuration::MAX)
}

fn payload_size(payload: &StructuredAnalysis) -> usize {
    serde_json::to_vec(payload).map(|bytes| bytes.len()).unwrap_or_default()
}

fn is_low_value(entry: &CacheEntry, now: DateTime<Utc>) -> bool {
    if entry.source.confidence < MIN_RETAINED_CONFIDENCE || entry.size_bytes > MAX_RETAINED_SIZE {
        return true;
    }
    let age = now - entry.created_at;
    if age > ChronoDuration::days(STALE_AGE_DAYS) {
        let age_days = age.num_seconds() as f64 / 86_400.0;
        return (entry.access_count as f64 / age_days) < MIN_DAILY_ACCESS_RATE;
    }
    false
}

mod optional_duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use playsight_core::{AnalysisMetadata, CategoryScore, CategoryScores, DataQuality, SCHEMA_VERSION};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap())
    }

    fn config() -> CacheConfig {
        CacheConfig {
            default_ttl: Duration::from_secs(60 * 60),
            max_entries: 10,
            max_bytes: 1024 * 1024,
            ..Default::default()
        }
    }

    fn cache_with(clock: &ManualClock, config: CacheConfig) -> AnalysisCache {
        AnalysisCache::new(config, Arc::new(clock.clone()))
    }

    fn analysis(backend: &str, confidence: u8, analysis_type: AnalysisType) -> StructuredAnalysis {
        let score = CategoryScore {
            score: 70,
            issues: vec![],
        };
        StructuredAnalysis {
            overall_score: 70,
            categories: CategoryScores {
                spacing: score.clone(),
                timing: score.clone(),
                formation: score.clone(),
                effectiveness: score.clone(),
                tactical: score,
            },
            suggestions: vec![],
            risks: vec![],
            metadata: AnalysisMetadata {
                source_backend: backend.to_string(),
                confidence,
                data_quality: DataQuality::Medium,
                schema_version: SCHEMA_VERSION.to_string(),
                analysis_type,
            },
        }
    }

    fn put(cache: &AnalysisCache, key: &str, backend: &str, confidence: u8) {
        let payload = analysis(backend, confidence, AnalysisType::Quick);
        let source = SourceMetadata::from_analysis(&payload);
        cache.set(CacheKey::from_raw(key), payload, source, None);
    }

    #[test]
    fn test_get_hit_and_miss() {
        let clock = clock();
        let cache = cache_with(&clock, config());

        assert!(cache.get(&CacheKey::from_raw("a")).is_none());
        put(&cache, "a", LOCAL_BACKEND, 70);
        let hit = cache.get(&CacheKey::from_raw("a")).unwrap();
        assert_eq!(hit.overall_score, 70);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn test_ttl_multipliers() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        let source = |backend: &str, confidence| SourceMetadata {
            backend: backend.to_string(),
            confidence,
            schema_version: SCHEMA_VERSION.to_string(),
        };

        assert_eq!(cache.ttl_for(&source(LOCAL_BACKEND, 70)), 60);
        assert_eq!(cache.ttl_for(&source(LOCAL_BACKEND, 95)), 120);
        assert_eq!(cache.ttl_for(&source(LOCAL_BACKEND, 85)), 90);
        assert_eq!(cache.ttl_for(&source(LOCAL_BACKEND, 90)), 90);
        assert_eq!(cache.ttl_for(&source(LOCAL_BACKEND, 50)), 30);
        assert_eq!(cache.ttl_for(&source("remote", 70)), 90);
        assert_eq!(cache.ttl_for(&source("remote", 95)), 180);
    }

    #[test]
    fn test_ttl_boundary() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        put(&cache, "a", LOCAL_BACKEND, 70);
        put(&cache, "b", LOCAL_BACKEND, 70);

        // 60 minute TTL
        clock.advance(Duration::from_secs(60 * 60 - 1));
        assert!(cache.get(&CacheKey::from_raw("a")).is_some());

        clock.advance(Duration::from_secs(2));
        assert!(cache.get(&CacheKey::from_raw("a")).is_none());
        assert!(cache.get(&CacheKey::from_raw("b")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_override_floored_at_one_minute() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        let payload = analysis(LOCAL_BACKEND, 70, AnalysisType::Quick);
        let source = SourceMetadata::from_analysis(&payload);
        cache.set(CacheKey::from_raw("a"), payload, source, Some(0));

        clock.advance(Duration::from_secs(59));
        assert!(cache.get(&CacheKey::from_raw("a")).is_some());
        clock.advance(Duration::from_secs(2));
        assert!(cache.get(&CacheKey::from_raw("a")).is_none());
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let clock = clock();
        let cache = cache_with(
            &clock,
            CacheConfig {
                max_entries: 3,
                ..config()
            },
        );

        put(&cache, "a", LOCAL_BACKEND, 70);
        put(&cache, "b", LOCAL_BACKEND, 70);
        put(&cache, "c", LOCAL_BACKEND, 70);

        // Touch "a" so "b" is least recently used
        assert!(cache.get(&CacheKey::from_raw("a")).is_some());
        put(&cache, "d", LOCAL_BACKEND, 70);

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&CacheKey::from_raw("b")).is_none());
        assert!(cache.get(&CacheKey::from_raw("a")).is_some());
        assert!(cache.get(&CacheKey::from_raw("c")).is_some());
        assert!(cache.get(&CacheKey::from_raw("d")).is_some());
    }

    #[test]
    fn test_byte_capacity() {
        let clock = clock();
        let size = payload_size(&analysis(LOCAL_BACKEND, 70, AnalysisType::Quick));
        let cache = cache_with(
            &clock,
            CacheConfig {
                max_bytes: size * 2,
                ..config()
            },
        );

        put(&cache, "a", LOCAL_BACKEND, 70);
        put(&cache, "b", LOCAL_BACKEND, 70);
        put(&cache, "c", LOCAL_BACKEND, 70);

        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert!(stats.total_bytes <= size * 2);
        assert!(cache.get(&CacheKey::from_raw("a")).is_none());
    }

    #[test]
    fn test_oversized_entry_still_inserted() {
        let clock = clock();
        let cache = cache_with(
            &clock,
            CacheConfig {
                max_bytes: 10,
                ..config()
            },
        );
        put(&cache, "a", LOCAL_BACKEND, 70);
        put(&cache, "b", LOCAL_BACKEND, 70);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CacheKey::from_raw("b")).is_some());
    }

    #[test]
    fn test_reinsert_replaces_entry() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        put(&cache, "a", LOCAL_BACKEND, 70);
        let bytes = cache.stats().total_bytes;
        put(&cache, "a", "remote", 95);

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_bytes, bytes + "remote".len() - LOCAL_BACKEND.len());
        assert_eq!(stats.by_backend.get("remote"), Some(&1));
    }

    #[test]
    fn test_invalidate_by_criteria() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        put(&cache, "a", "alpha", 70);
        put(&cache, "b", "alpha", 95);
        put(&cache, "c", "beta", 70);

        let removed = cache.invalidate(
            &InvalidationCriteria::all()
                .with_backend("alpha")
                .with_confidence_between(Some(80), None),
        );
        assert_eq!(removed, 1);
        assert!(cache.get(&CacheKey::from_raw("b")).is_none());

        clock.advance(Duration::from_secs(10 * 60));
        put(&cache, "d", "beta", 70);
        let removed = cache.invalidate(&InvalidationCriteria::all().with_older_than(Duration::from_secs(5 * 60)));
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.invalidate(&InvalidationCriteria::all()), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_by_type() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        let learning = analysis(LOCAL_BACKEND, 70, AnalysisType::Learning);
        let source = SourceMetadata::from_analysis(&learning);
        cache.set(CacheKey::from_raw("learn"), learning, source, None);
        put(&cache, "quick", LOCAL_BACKEND, 70);

        assert_eq!(cache.invalidate(&InvalidationCriteria::all().with_type(AnalysisType::Learning)), 1);
        assert_eq!(cache.stats().by_analysis_type.get("quick"), Some(&1));
    }

    #[test]
    fn test_sweep_expired() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        put(&cache, "short", LOCAL_BACKEND, 65);
        put(&cache, "long", LOCAL_BACKEND, 95);

        clock.advance(Duration::from_secs(61 * 60));
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_optimize_prunes_low_confidence_and_tracks_hit_rate() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        put(&cache, "weak", LOCAL_BACKEND, 61);
        put(&cache, "strong", LOCAL_BACKEND, 85);

        let first = cache.optimize();
        assert_eq!(first.entries_removed, 0);
        assert_eq!(first.hit_rate_delta, 0.0);

        cache.invalidate(&InvalidationCriteria::all());
        put(&cache, "weak", LOCAL_BACKEND, 50);
        put(&cache, "strong", LOCAL_BACKEND, 85);
        assert!(cache.get(&CacheKey::from_raw("strong")).is_some());

        let second = cache.optimize();
        assert_eq!(second.entries_removed, 1);
        assert!(second.bytes_freed > 0);
        assert_eq!(second.hit_rate_delta, 1.0);
        assert!(cache.get(&CacheKey::from_raw("weak")).is_none());
    }

    #[test]
    fn test_optimize_retunes_ttl() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        put(&cache, "hot", LOCAL_BACKEND, 70);
        put(&cache, "cold", "remote", 95);

        for _ in 0..6 {
            assert!(cache.get(&CacheKey::from_raw("hot")).is_some());
        }
        cache.optimize();
        // 60 * 1.2 = 72 minutes
        clock.advance(Duration::from_secs(71 * 60));
        assert!(cache.get(&CacheKey::from_raw("hot")).is_some());

        // Both are past their TTL a day later
        clock.advance(Duration::from_secs(24 * 3600));
        let report = cache.optimize();
        assert_eq!(report.entries_removed, 2);
    }

    #[test]
    fn test_snapshot_and_restore() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        put(&cache, "a", LOCAL_BACKEND, 70);
        put(&cache, "b", LOCAL_BACKEND, 95);
        assert!(cache.get(&CacheKey::from_raw("a")).is_some());
        assert!(cache.get(&CacheKey::from_raw("missing")).is_none());

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[0].0, CacheKey::from_raw("a"));
        assert_eq!(snapshot.access_log.get(&CacheKey::from_raw("a")).map(Vec::len), Some(1));

        // "a" (60 min) expires before restore, "b" (120 min) survives
        clock.advance(Duration::from_secs(90 * 60));
        let restored = cache_with(&clock, config());
        assert_eq!(restored.restore(snapshot), 1);
        assert!(restored.get(&CacheKey::from_raw("b")).is_some());

        let stats = restored.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_restore_ignores_old_snapshot() {
        let clock = clock();
        let cache = cache_with(&clock, config());
        put(&cache, "a", "remote", 95);
        let snapshot = cache.snapshot();

        clock.advance(Duration::from_secs(25 * 3600));
        let restored = cache_with(&clock, config());
        assert_eq!(restored.restore(snapshot), 0);
        assert!(restored.is_empty());
    }

    #[test]
    fn test_snapshot_limited_to_recent_entries() {
        let clock = clock();
        let cache = cache_with(
            &clock,
            CacheConfig {
                max_entries: 200,
                ..config()
            },
        );
        for i in 0..150 {
            put(&cache, &format!("k{}", i), LOCAL_BACKEND, 70);
        }
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.entries.len(), SNAPSHOT_MAX_ENTRIES);
        assert_eq!(snapshot.entries[0].0, CacheKey::from_raw("k149"));
    }

    proptest! {
        #[test]
        fn prop_ttl_is_positive(confidence in 0u8..=100, remote in any::<bool>(), minutes in 1u64..10_000) {
            let clock = clock();
            let cache = cache_with(&clock, CacheConfig {
                default_ttl: Duration::from_secs(minutes * 60),
                ..config()
            });
            let source = SourceMetadata {
                backend: if remote { "remote".to_string() } else { LOCAL_BACKEND.to_string() },
                confidence,
                schema_version: SCHEMA_VERSION.to_string(),
            };
            prop_assert!(cache.ttl_for(&source) >= 1);
        }
    }
}
