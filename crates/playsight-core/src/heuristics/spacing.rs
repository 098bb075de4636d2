//! Spacing heuristic.
//!
//! **Question**: Are players spread so they can receive and support?
//!
//! | Check | Penalty |
//! |-------|---------|
//! | Pair of players closer than 10 units | −4 each, at most −30 |
//! | Zone holding 3 players | −10, `moderate` clustering |
//! | Zone holding more than 3 players | −20, `major` clustering |

use crate::play::Play;
use crate::types::{
    AnalysisContext, Category, Issue, Priority, Severity, Suggestion, SuggestionCategory,
};

use super::geometry::{close_pairs, MIN_SPACING};
use super::{score_after_penalties, CategoryFinding, Heuristic, Observation};

const CLOSE_PAIR_PENALTY: u32 = 4;
const CLOSE_PAIR_CAP: u32 = 30;
const CLUSTER_THRESHOLD: usize = 3;

/// The spacing heuristic.
pub struct SpacingHeuristic;

impl SpacingHeuristic {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpacingHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl Heuristic for SpacingHeuristic {
    fn category(&self) -> Category {
        Category::Spacing
    }

    fn evaluate(&self, play: &Play, _context: &AnalysisContext) -> CategoryFinding {
        let mut penalty = 0u32;
        let mut observations = Vec::new();

        let positions: Vec<_> = play.players.iter().map(|p| p.position).collect();
        let pairs = close_pairs(&positions);
        if !pairs.is_empty() {
            penalty += (pairs.len() as u32 * CLOSE_PAIR_PENALTY).min(CLOSE_PAIR_CAP);
            let (a, b) = pairs[0];
            let issue = Issue::new(
                "crowding",
                if pairs.len() > 2 { Severity::Moderate } else { Severity::Minor },
                format!(
                    "{} pair(s) of players closer than {} units (first: {} and {})",
                    pairs.len(),
                    MIN_SPACING,
                    play.players[a].id,
                    play.players[b].id
                ),
            );
            let suggestion = Suggestion::new(
                SuggestionCategory::Spacing,
                Priority::from(issue.severity),
                format!(
                    "Increase the distance between {} and {} to open a passing lane",
                    play.players[a].id, play.players[b].id
                ),
            );
            observations.push(Observation::new(issue, suggestion));
        }

        for (zone, count) in play.zone_occupancy().iter() {
            if count < CLUSTER_THRESHOLD {
                continue;
            }
            let severity = if count > CLUSTER_THRESHOLD {
                penalty += 20;
                Severity::Major
            } else {
                penalty += 10;
                Severity::Moderate
            };

            let issue = Issue::new(
                "clustering",
                severity,
                format!("{} players clustered in the {} zone", count, zone),
            )
            .in_zone(zone);
            let suggestion = Suggestion::new(
                SuggestionCategory::Positioning,
                Priority::from(severity),
                format!(
                    "Move {} player(s) out of the {} zone to stretch the opposition",
                    count - 2,
                    zone
                ),
            )
            .in_zone(zone);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::play::{Player, Position, Zone};

    fn play_with(positions: &[(f64, f64)]) -> Play {
        Play {
            name: "Spacing".to_string(),
            formation: None,
            players: positions
                .iter()
                .enumerate()
                .map(|(i, (x, y))| Player {
                    id: format!("p{}", i + 1),
                    position: Position::new(*x, *y),
                    role: None,
                })
                .collect(),
            movements: vec![],
            objectives: vec![],
        }
    }

    #[test]
    fn test_well_spaced_play_scores_full() {
        let play = play_with(&[(10.0, 20.0), (10.0, 80.0), (50.0, 30.0), (50.0, 70.0), (85.0, 50.0)]);
        let finding = SpacingHeuristic::new().evaluate(&play, &AnalysisContext::default());
        assert_eq!(finding.score, 100);
        assert!(finding.observations.is_empty());
    }

    #[test]
    fn test_major_clustering() {
        // Occupancy 4, 1, 0, 0, 0, 0
        let play = play_with(&[(10.0, 10.0), (15.0, 12.0), (12.0, 20.0), (20.0, 15.0), (20.0, 70.0)]);
        let finding = SpacingHeuristic::new().evaluate(&play, &AnalysisContext::default());

        let clustering = finding
            .observations
            .iter()
            .find(|o| o.issue.kind == "clustering")
            .expect("clustering issue");
        assert_eq!(clustering.issue.severity, Severity::Major);
        assert_eq!(clustering.issue.zone, Some(Zone::DefensiveLeft));

        let suggestion = clustering.suggestion.as_ref().unwrap();
        assert_eq!(suggestion.category, SuggestionCategory::Positioning);
        assert!(suggestion.text.contains("defensive-left"));

        // 4 close pairs (−16) and major clustering (−20)
        assert_eq!(finding.score, 64);
    }

    #[test]
    fn test_moderate_clustering() {
        let play = play_with(&[(50.0, 60.0), (60.0, 80.0), (45.0, 95.0), (10.0, 10.0)]);
        let finding = SpacingHeuristic::new().evaluate(&play, &AnalysisContext::default());
        let clustering = finding
            .observations
            .iter()
            .find(|o| o.issue.kind == "clustering")
            .unwrap();
        assert_eq!(clustering.issue.severity, Severity::Moderate);
        assert_eq!(clustering.issue.zone, Some(Zone::MiddleRight));
    }
}
