//! Timing heuristic.
//!
//! **Question**: Do the runs follow each other in a usable rhythm?
//!
//! Movements are ordered by start time and the gaps between consecutive
//! starts are inspected.
//!
//! | Check | Penalty |
//! |-------|---------|
//! | Gap between consecutive starts above 3 s | −10 each, `moderate` |
//! | A player starts a run before finishing the previous one | −15 each, `major` |
//! | Movement for a player not in the play | −5 each, `minor` |
//! | No movements at all | score fixed at 50 |

use std::collections::HashMap;

use crate::play::Play;
use crate::types::{
    AnalysisContext, Category, Issue, Priority, Severity, Suggestion, SuggestionCategory,
};

use super::{score_after_penalties, CategoryFinding, Heuristic, Observation};

/// Largest gap between consecutive run starts that keeps the play flowing.
pub const MAX_SEQUENCE_GAP_SECS: f64 = 3.0;

const NO_MOVEMENT_SCORE: u8 = 50;

/// The timing heuristic.
pub struct TimingHeuristic;

impl TimingHeuristic {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TimingHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl Heuristic for TimingHeuristic {
    fn category(&self) -> Category {
        Category::Timing
    }

    fn evaluate(&self, play: &Play, _context: &AnalysisContext) -> CategoryFinding {
        let ordered = play.ordered_movements();

        if ordered.is_empty() {
            let issue = Issue::new(
                "no_movement",
                Severity::Minor,
                "Play has no movements, timing cannot be assessed",
            );
            let suggestion = Suggestion::new(
                SuggestionCategory::Timing,
                Priority::Low,
                "Add the runs each player makes so sequencing can be checked",
            );
            return CategoryFinding {
                category: self.category(),
                score: NO_MOVEMENT_SCORE,
                observations: vec![Observation::new(issue, suggestion)],
                guidance: vec![],
            };
        }

        let mut penalty = 0u32;
        let mut observations = Vec::new();

        for pair in ordered.windows(2) {
            let gap = pair[1].start_secs - pair[0].start_secs;
            if gap > MAX_SEQUENCE_GAP_SECS {
                penalty += 10;
                let issue = Issue::new(
                    "sequencing_gap",
                    Severity::Moderate,
                    format!(
                        "{:.1}s gap between {}'s run and {}'s run",
                        gap, pair[0].player_id, pair[1].player_id
                    ),
                );
                let suggestion = Suggestion::new(
                    SuggestionCategory::Timing,
                    Priority::Medium,
                    format!(
                        "Start {}'s run sooner after {} moves to keep the defence reacting",
                        pair[1].player_id, pair[0].player_id
                    ),
                );
                observations.push(Observation::new(issue, suggestion));
            }
        }

        let mut busy_until: HashMap<&str, f64> = HashMap::new();
        for movement in &ordered {
            if play.player(&movement.player_id).is_none() {
                penalty += 5;
                observations.push(Observation::issue_only(Issue::new(
                    "unknown_player",
                    Severity::Minor,
                    format!("Movement references unknown player {}", movement.player_id),
                )));
                continue;
            }

            let id = movement.player_id.as_str();
            if let Some(until) = busy_until.get(id) {
                if movement.start_secs < *until {
                    penalty += 15;
                    let issue = Issue::new(
                        "overlapping_runs",
                        Severity::Major,
                        format!(
                            "{} starts a new run at {:.1}s before finishing the previous one at {:.1}s",
                            id, movement.start_secs, until
                        ),
                    );
                    let suggestion = Suggestion::new(
                        SuggestionCategory::Timing,
                        Priority::High,
                        format!("Let {} complete one run before starting the next", id),
                    );
                    observations.push(Observation::new(issue, suggestion));
                }
            }
            let end = movement.end_secs();
            busy_until
                .entry(id)
                .and_modify(|until| *until = until.max(end))
                .or_insert(end);
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
    use crate::play::{Movement, Player, Position};

    fn play(movements: Vec<Movement>) -> Play {
        Play {
            name: "Timing".to_string(),
            formation: None,
            players: vec![
                Player {
                    id: "a".to_string(),
                    position: Position::new(20.0, 20.0),
                    role: None,
                },
                Player {
                    id: "b".to_string(),
                    position: Position::new(20.0, 80.0),
                    role: None,
                },
            ],
            movements,
            objectives: vec![],
        }
    }

    fn run(player: &str, start: f64, duration: f64) -> Movement {
        Movement {
            player_id: player.to_string(),
            to: Position::new(50.0, 50.0),
            start_secs: start,
            duration_secs: duration,
        }
    }

    #[test]
    fn test_no_movements_is_neutral() {
        let finding = TimingHeuristic::new().evaluate(&play(vec![]), &AnalysisContext::default());
        assert_eq!(finding.score, 50);
        assert_eq!(finding.observations[0].issue.kind, "no_movement");
    }

    #[test]
    fn test_tight_sequence_scores_full() {
        let finding = TimingHeuristic::new().evaluate(
            &play(vec![run("a", 0.0, 1.0), run("b", 1.5, 1.0)]),
            &AnalysisContext::default(),
        );
        assert_eq!(finding.score, 100);
    }

    #[test]
    fn test_gap_penalized() {
        let finding = TimingHeuristic::new().evaluate(
            &play(vec![run("b", 5.0, 1.0), run("a", 0.0, 1.0)]),
            &AnalysisContext::default(),
        );
        assert_eq!(finding.score, 90);
        assert_eq!(finding.observations[0].issue.kind, "sequencing_gap");
    }

    #[test]
    fn test_overlapping_runs_and_unknown_player() {
        let finding = TimingHeuristic::new().evaluate(
            &play(vec![run("a", 0.0, 3.0), run("a", 1.0, 1.0), run("ghost", 2.0, 1.0)]),
            &AnalysisContext::default(),
        );
        assert_eq!(finding.score, 80);
        assert!(finding.issues().any(|i| i.kind == "overlapping_runs" && i.severity == Severity::Major));
        assert!(finding.issues().any(|i| i.kind == "unknown_player"));
    }
}
