//! Effectiveness heuristic.
//!
//! **Question**: Does the play move the ball toward what it is meant to achieve?
//!
//! Half of the score is the share of runs that gain ground toward the
//! attacking end; the other half is the share of recognised objectives the
//! final positions satisfy.

use crate::play::{Play, Position, Third, ZoneOccupancy};
use crate::types::{
    clamp_score, AnalysisContext, Category, Issue, Priority, Severity, Suggestion,
    SuggestionCategory,
};

use super::geometry::{classify_objective, forward_progress_ratio, ObjectiveKind};
use super::{CategoryFinding, Heuristic, Observation};

/// Used for either half of the score when there is nothing to measure.
const NEUTRAL_RATIO: f64 = 0.5;
const NO_OBJECTIVE_RATIO: f64 = 0.6;

/// Minimum forward gain (field units) for a run to count as a transition run.
const TRANSITION_RUN: f64 = 20.0;

/// The effectiveness heuristic.
pub struct EffectivenessHeuristic;

impl EffectivenessHeuristic {
    pub fn new() -> Self {
        Self
    }

    fn satisfied(&self, kind: ObjectiveKind, play: &Play, finals: &ZoneOccupancy) -> bool {
        match kind {
            ObjectiveKind::Attack => finals.third_count(Third::Attacking) >= 2,
            ObjectiveKind::Defend => {
                let total = play.players.len();
                let behind = total - finals.third_count(Third::Attacking);
                behind * 2 >= total
            }
            ObjectiveKind::Possession => {
                let (left, right) = finals.half_counts();
                left > 0 && right > 0 && finals.occupied() >= 3
            }
            ObjectiveKind::Transition => self.has_transition_run(play),
        }
    }

    fn has_transition_run(&self, play: &Play) -> bool {
        play.movements.iter().any(|m| {
            play.player(&m.player_id)
                .map(|p| m.to.x - p.position.x >= TRANSITION_RUN)
                .unwrap_or(false)
        })
    }
}

impl Default for EffectivenessHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl Heuristic for EffectivenessHeuristic {
    fn category(&self) -> Category {
        Category::Effectiveness
    }

    fn evaluate(&self, play: &Play, _context: &AnalysisContext) -> CategoryFinding {
        let mut observations = Vec::new();

        let forward = forward_progress_ratio(play).unwrap_or(NEUTRAL_RATIO);
        if forward < NEUTRAL_RATIO {
            let issue = Issue::new(
                "backward_play",
                Severity::Minor,
                format!("Only {:.0}% of runs gain ground", forward * 100.0),
            );
            let suggestion = Suggestion::new(
                SuggestionCategory::Effectiveness,
                Priority::Low,
                "Add a forward run to give the ball carrier a progressive option",
            );
            observations.push(Observation::new(issue, suggestion));
        }

        let finals: Vec<Position> = play.final_positions().into_iter().map(|(_, p)| p).collect();
        let final_occupancy = ZoneOccupancy::from_positions(finals.iter());

        let mut recognised = 0usize;
        let mut met = 0usize;
        for objective in &play.objectives {
            let Some(kind) = classify_objective(objective) else {
                observations.push(Observation::issue_only(Issue::new(
                    "objective_unrecognised",
                    Severity::Minor,
                    format!("Objective '{}' could not be measured", objective),
                )));
                continue;
            };

            recognised += 1;
            if self.satisfied(kind, play, &final_occupancy) {
                met += 1;
            } else {
                let issue = Issue::new(
                    "objective_unmet",
                    Severity::Moderate,
                    format!("Final positions do not support objective '{}'", objective),
                );
                let suggestion = Suggestion::new(
                    SuggestionCategory::Effectiveness,
                    Priority::Medium,
                    format!("Adjust the final positions so the play can '{}'", objective),
                );
                observations.push(Observation::new(issue, suggestion));
            }
        }

        let objective_ratio = if recognised == 0 {
            NO_OBJECTIVE_RATIO
        } else {
            met as f64 / recognised as f64
        };

        CategoryFinding {
            category: self.category(),
            score: clamp_score(50.0 * forward + 50.0 * objective_ratio),
            observations,
            guidance: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::play::{Movement, Player};

    fn base_play() -> Play {
        Play {
            name: "Attack".to_string(),
            formation: None,
            players: vec![
                Player {
                    id: "a".to_string(),
                    position: Position::new(40.0, 20.0),
                    role: None,
                },
                Player {
                    id: "b".to_string(),
                    position: Position::new(40.0, 80.0),
                    role: None,
                },
                Player {
                    id: "c".to_string(),
                    position: Position::new(20.0, 50.0),
                    role: None,
                },
            ],
            movements: vec![
                Movement {
                    player_id: "a".to_string(),
                    to: Position::new(75.0, 20.0),
                    start_secs: 0.0,
                    duration_secs: 2.0,
                },
                Movement {
                    player_id: "b".to_string(),
                    to: Position::new(80.0, 80.0),
                    start_secs: 1.0,
                    duration_secs: 2.0,
                },
            ],
            objectives: vec![],
        }
    }

    #[test]
    fn test_no_objectives_uses_neutral_ratio() {
        let finding = EffectivenessHeuristic::new().evaluate(&base_play(), &AnalysisContext::default());
        // 50 * 1.0 + 50 * 0.6
        assert_eq!(finding.score, 80);
    }

    #[test]
    fn test_objectives_met() {
        let mut play = base_play();
        play.objectives = vec!["Score from the wing".to_string(), "Quick counter".to_string()];
        let finding = EffectivenessHeuristic::new().evaluate(&play, &AnalysisContext::default());
        assert_eq!(finding.score, 100);
        assert!(finding.observations.is_empty());
    }

    #[test]
    fn test_objective_unmet() {
        let mut play = base_play();
        play.movements.clear();
        play.objectives = vec!["Score early".to_string(), "Enjoy it".to_string()];
        let finding = EffectivenessHeuristic::new().evaluate(&play, &AnalysisContext::default());
        // 50 * 0.5 + 50 * 0.0
        assert_eq!(finding.score, 25);
        assert!(finding.issues().any(|i| i.kind == "objective_unmet"));
        assert!(finding.issues().any(|i| i.kind == "objective_unrecognised"));
    }
}
