//! Formation heuristic.
//!
//! **Question**: Does the starting shape match the declared formation?
//!
//! The declared formation is turned into an expected number of outfield
//! players per third and compared with where players actually start.
//! Goalkeepers are left out of the comparison.

use crate::play::Play;
use crate::types::{
    AnalysisContext, Category, Issue, Priority, Severity, Suggestion, SuggestionCategory,
};

use super::geometry::{formation_distribution, outfield_distribution};
use super::{score_after_penalties, CategoryFinding, Heuristic, Observation};

const MISSING_FORMATION_SCORE: u8 = 60;
const UNKNOWN_FORMATION_SCORE: u8 = 55;
const MISPLACED_PENALTY: u32 = 10;
const COUNT_MISMATCH_PENALTY: u32 = 30;

const THIRD_NAMES: [&str; 3] = ["defensive", "middle", "attacking"];

/// The formation heuristic.
pub struct FormationHeuristic;

impl FormationHeuristic {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FormationHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl Heuristic for FormationHeuristic {
    fn category(&self) -> Category {
        Category::Formation
    }

    fn evaluate(&self, play: &Play, _context: &AnalysisContext) -> CategoryFinding {
        let Some(formation) = play.formation.as_deref() else {
            let issue = Issue::new(
                "formation_missing",
                Severity::Minor,
                "No formation declared, shape checked only loosely",
            );
            let suggestion = Suggestion::new(
                SuggestionCategory::Formation,
                Priority::Low,
                "Declare the intended formation so the shape can be verified",
            );
            return CategoryFinding {
                category: self.category(),
                score: MISSING_FORMATION_SCORE,
                observations: vec![Observation::new(issue, suggestion)],
                guidance: vec![],
            };
        };

        let Some(expected) = formation_distribution(formation) else {
            return CategoryFinding {
                category: self.category(),
                score: UNKNOWN_FORMATION_SCORE,
                observations: vec![Observation::issue_only(Issue::new(
                    "formation_unrecognised",
                    Severity::Minor,
                    format!("Formation '{}' is not a recognised pattern", formation),
                ))],
                guidance: vec![],
            };
        };

        let actual = outfield_distribution(play);
        let expected_total: usize = expected.iter().sum();
        let actual_total: usize = actual.iter().sum();

        let mut penalty = 0u32;
        let mut observations = Vec::new();

        if expected_total != actual_total {
            penalty = penalty.saturating_add(COUNT_MISMATCH_PENALTY);
            let issue = Issue::new(
                "player_count_mismatch",
                Severity::Major,
                format!(
                    "Formation {} needs {} outfield players but the play has {}",
                    formation, expected_total, actual_total
                ),
            );
            let suggestion = Suggestion::new(
                SuggestionCategory::Formation,
                Priority::High,
                format!("Pick a formation for {} outfield players", actual_total),
            );
            observations.push(Observation::new(issue, suggestion));
        }

        for (third, (want, have)) in expected.iter().zip(actual.iter()).enumerate() {
            if want == have {
                continue;
            }
            let diff = want.abs_diff(*have);
            let diff_penalty = u32::try_from(diff)
                .unwrap_or(u32::MAX)
                .saturating_mul(MISPLACED_PENALTY);
            penalty = penalty.saturating_add(diff_penalty);
            let severity = if diff > 1 { Severity::Moderate } else { Severity::Minor };
            let issue = Issue::new(
                "shape_mismatch",
                severity,
                format!(
                    "{} third holds {} player(s), {} expects {}",
                    THIRD_NAMES[third], have, formation, want
                ),
            );
            let direction = if have > want { "fewer" } else { "more" };
            let suggestion = Suggestion::new(
                SuggestionCategory::Formation,
                Priority::from(severity),
                format!(
                    "Start {} player(s) in the {} third to match {}",
                    direction, THIRD_NAMES[third], formation
                ),
            );
            observations.push(Observation::new(issue, suggestion));
        }

        CategoryFinding {
            category: self.category(),
            score: score_after_penalties(penalty),
            observations,
            guidance: vec![],
        }
    }
}
