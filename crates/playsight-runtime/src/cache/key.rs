//! Cache key derivation.
//!
//! A key is `analysis:<type>:<play>:<context>` where each fingerprint is the
//! first 128 bits of a SHA-256 over the canonical JSON of the full play or
//! context. Every position, movement and objective feeds the hash, so plays
//! that differ anywhere get different keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use playsight_core::{AnalysisContext, AnalysisType, Play};

/// Bytes of the SHA-256 digest kept per fingerprint.
const FINGERPRINT_BYTES: usize = 16;

/// Opaque, deterministic cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for an analysis request.
    ///
    /// A missing context and an empty one produce the same key, and focus
    /// areas are compared as a set.
    pub fn derive(play: &Play, analysis_type: AnalysisType, context: Option<&AnalysisContext>) -> Self {
        let mut context = context.cloned().unwrap_or_default();
        context.focus_areas.sort();
        context.focus_areas.dedup();

        Self(format!(
            "analysis:{}:{}:{}",
            analysis_type,
            fingerprint(play),
            fingerprint(&context)
        ))
    }

    /// Wrap an existing key string (e.g. one printed by the CLI).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn fingerprint<T: Serialize>(value: &T) -> String {
    // Plain data of strings and numbers; serde_json writes non-finite floats as null
    let canonical = serde_json::to_vec(value).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    digest[..FINGERPRINT_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
