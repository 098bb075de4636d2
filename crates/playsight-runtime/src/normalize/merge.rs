//! Blending a parsed remote response into the local baseline.
//!
//! The local analysis is always complete; the remote one is partial. Only
//! fields the remote response actually contained are blended:
//!
//! - sub-score: `round(0.7·remote + 0.3·local)`
//! - overall: same blend when the remote overall is present, else local
//! - suggestions / risks: remote first, then local, capped at 10 / 8
//! - confidence: `min(local + 10, 95)`

use playsight_core::{clamp_score, Category, StructuredAnalysis};

use super::parser::ParsedResponse;

pub const REMOTE_WEIGHT: f64 = 0.7;
pub const LOCAL_WEIGHT: f64 = 0.3;

/// Confidence added when a remote backend contributed.
pub const REMOTE_CONFIDENCE_BONUS: u8 = 10;

/// Merged confidence never exceeds this.
pub const MAX_MERGED_CONFIDENCE: u8 = 95;

/// Weighted blend of two scores.
pub fn blend(remote: u8, local: u8) -> u8 {
    clamp_score(REMOTE_WEIGHT * f64::from(remote) + LOCAL_WEIGHT * f64::from(local))
}

/// Merge a parsed remote response from `backend_id` into `local`.
pub fn merge(local: &StructuredAnalysis, remote: &ParsedResponse, backend_id: &str) -> StructuredAnalysis {
    let mut merged = local.clone();

    for category in Category::ALL {
        if let Some(remote_score) = remote.category(category) {
            let slot = merged.categories.get_mut(category);
            slot.score = blend(remote_score, slot.score);
        }
    }

    merged.overall_score = match remote.overall {
        Some(remote_overall) => blend(remote_overall, local.overall_score),
        None => local.overall_score,
    };

    merged.suggestions = remote
        .suggestions
        .iter()
        .chain(local.suggestions.iter())
        .cloned()
        .collect();
    merged.risks = remote.risks.iter().chain(local.risks.iter()).cloned().collect();
    merged.cap_lists();

    merged.metadata.source_backend = backend_id.to_string();
    merged.metadata.confidence = local
        .metadata
        .confidence
        .saturating_add(REMOTE_CONFIDENCE_BONUS)
        .min(MAX_MERGED_CONFIDENCE);

    merged
}
