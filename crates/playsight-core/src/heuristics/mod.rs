//! The five scoring heuristics.
//!
//! Each heuristic looks at one category of the play in isolation and
//! produces a [`CategoryFinding`]. Heuristics never see each other's
//! findings; the [`Scorer`](crate::scorer::Scorer) combines them.

pub mod geometry;

mod effectiveness;
mod formation;
mod spacing;
mod tactical;
mod timing;

pub use effectiveness::EffectivenessHeuristic;
pub use formation::FormationHeuristic;
pub use spacing::SpacingHeuristic;
pub use tactical::TacticalHeuristic;
pub use timing::TimingHeuristic;

use crate::play::Play;
use crate::types::{AnalysisContext, Category, Issue, Suggestion};

/// An issue paired with the suggestion that addresses it.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub issue: Issue,
    pub suggestion: Option<Suggestion>,
}

impl Observation {
    pub fn new(issue: Issue, suggestion: Suggestion) -> Self {
        Self {
            issue,
            suggestion: Some(suggestion),
        }
    }

    pub fn issue_only(issue: Issue) -> Self {
        Self {
            issue,
            suggestion: None,
        }
    }
}

/// What one heuristic concluded.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFinding {
    pub category: Category,

    /// 0–100
    pub score: u8,

    pub observations: Vec<Observation>,

    /// Suggestions not tied to an issue (e.g., echoed focus areas)
    pub guidance: Vec<Suggestion>,
}

impl CategoryFinding {
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.observations.iter().map(|o| &o.issue)
    }
}

/// A deterministic scoring heuristic for one category.
pub trait Heuristic: Send + Sync {
    /// The category this heuristic scores.
    fn category(&self) -> Category;

    /// Score the play.
    ///
    /// Must be deterministic: the same play and context always produce the
    /// same finding.
    fn evaluate(&self, play: &Play, context: &AnalysisContext) -> CategoryFinding;
}

/// Start from 100 and subtract penalties, clamped into 0–100.
pub(crate) fn score_after_penalties(penalty: u32) -> u8 {
    100u32.saturating_sub(penalty).min(100) as u8
}
