//! Result normalization: parse free-text backend output and merge it with
//! the local baseline.

mod merge;
mod parser;

pub use merge::{blend, merge, MAX_MERGED_CONFIDENCE, REMOTE_CONFIDENCE_BONUS};
pub use parser::{
    JudgmentRule, ParsedResponse, ResolvedResponse, ResponseParser, ScoreField, ScoreRule,
    TextResponseParser, DEFAULT_SCORE, JUDGMENT_LABELS, MAX_RECOMMENDATIONS_PER_CATEGORY,
};
