//! Tactical adherence heuristic.
//!
//! **Question**: Does the play fit the match situation it is used in?
//!
//! Without context only width is checked. With context the final positions
//! are compared against what the game situation and opponent call for.

use crate::play::{Play, Position, Third, ZoneOccupancy};
use crate::types::{
    AnalysisContext, Category, GameSituation, Issue, Priority, Severity, Suggestion,
    SuggestionCategory,
};

use super::geometry::formation_distribution;
use super::{score_after_penalties, CategoryFinding, Heuristic, Observation};

const MAX_FOCUS_GUIDANCE: usize = 3;

/// Runs beyond which a play is considered complex for developing squads.
const COMPLEX_PLAY_MOVEMENTS: usize = 6;

/// The tactical adherence heuristic.
pub struct TacticalHeuristic;

impl TacticalHeuristic {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TacticalHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl Heuristic for TacticalHeuristic {
    fn category(&self) -> Category {
        Category::Tactical
    }

    fn evaluate(&self, play: &Play, context: &AnalysisContext) -> CategoryFinding {
        let mut penalty = 0u32;
        let mut observations = Vec::new();

        let (left, right) = play.zone_occupancy().half_counts();
        if play.players.len() >= 3 && (left == 0 || right == 0) {
            penalty += 15;
            let side = if left == 0 { "right" } else { "left" };
            let issue = Issue::new(
                "no_width",
                Severity::Moderate,
                format!("Every player starts on the {} half of the pitch", side),
            );
            let suggestion = Suggestion::new(
                SuggestionCategory::Tactical,
                Priority::Medium,
                "Station one player on the far side to stop the defence shifting across",
            );
            observations.push(Observation::new(issue, suggestion));
        }

        let finals: Vec<Position> = play.final_positions().into_iter().map(|(_, p)| p).collect();
        let final_occupancy = ZoneOccupancy::from_positions(finals.iter());
        let attackers = final_occupancy.third_count(Third::Attacking);
        let total = play.players.len();

        match context.game_situation {
            Some(GameSituation::Trailing) if attackers < 2 => {
                penalty += 20;
                let issue = Issue::new(
                    "passive_when_trailing",
                    Severity::Moderate,
                    format!("Only {} player(s) finish in the attacking third while trailing", attackers),
                );
                let suggestion = Suggestion::new(
                    SuggestionCategory::Tactical,
                    Priority::Medium,
                    "Commit a second runner into the attacking third when chasing the game",
                );
                observations.push(Observation::new(issue, suggestion));
            }
            Some(GameSituation::Leading) if (total - attackers) * 2 < total => {
                penalty += 20;
                let issue = Issue::new(
                    "overcommitted_when_leading",
                    Severity::Moderate,
                    format!("{} of {} players finish in the attacking third while leading", attackers, total),
                );
                let suggestion = Suggestion::new(
                    SuggestionCategory::Tactical,
                    Priority::Medium,
                    "Keep at least half the team behind the ball to protect the lead",
                );
                observations.push(Observation::new(issue, suggestion));
            }
            _ => {}
        }

        if let Some(opponent) = context.opponent_formation.as_deref() {
            if let Some([their_defence, _, _]) = formation_distribution(opponent) {
                if their_defence >= 4 && attackers <= 1 {
                    penalty += 5;
                    observations.push(Observation::issue_only(Issue::new(
                        "outnumbered_up_front",
                        Severity::Minor,
                        format!("{} attacker(s) against a back {} from {}", attackers, their_defence, opponent),
                    )));
                }
            }
        }

        if let Some(level) = context.skill_level.as_deref() {
            let developing = matches!(level.to_lowercase().as_str(), "youth" | "beginner" | "novice");
            if developing && play.movements.len() > COMPLEX_PLAY_MOVEMENTS {
                penalty += 5;
                let issue = Issue::new(
                    "complex_for_level",
                    Severity::Minor,
                    format!("{} runs is a lot to coordinate for a {} squad", play.movements.len(), level),
                );
                let suggestion = Suggestion::new(
                    SuggestionCategory::Tactical,
                    Priority::Low,
                    "Trim the play to its key runs before introducing the full version",
                );
                observations.push(Observation::new(issue, suggestion));
            }
        }

        let guidance = context
            .focus_areas
            .iter()
            .take(MAX_FOCUS_GUIDANCE)
            .map(|area| {
                Suggestion::new(
                    SuggestionCategory::from_keywords(area),
                    Priority::Low,
                    format!("Focus area '{}': rehearse this play with that emphasis", area),
                )
            })
            .collect();

        CategoryFinding {
            category: self.category(),
            score: score_after_penalties(penalty),
            observations,
            guidance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::play::Player;

    fn play(positions: &[(f64, f64)]) -> Play {
        Play {
            name: "Tactics".to_string(),
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
    fn test_no_context_only_checks_width() {
        let finding = TacticalHeuristic::new()
            .evaluate(&play(&[(20.0, 20.0), (50.0, 30.0), (80.0, 10.0)]), &AnalysisContext::default());
        assert_eq!(finding.score, 85);
        assert_eq!(finding.observations[0].issue.kind, "no_width");
        assert!(finding.guidance.is_empty());
    }

    #[test]
    fn test_trailing_needs_attackers() {
        let context = AnalysisContext {
            game_situation: Some(GameSituation::Trailing),
            ..Default::default()
        };
        let finding = TacticalHeuristic::new()
            .evaluate(&play(&[(20.0, 20.0), (50.0, 80.0), (80.0, 10.0)]), &context);
        assert_eq!(finding.score, 80);
        assert!(finding.issues().any(|i| i.kind == "passive_when_trailing"));
    }

    #[test]
    fn test_leading_overcommitted_and_focus_guidance() {
        let context = AnalysisContext {
            game_situation: Some(GameSituation::Leading),
            focus_areas: vec!["timing of runs".to_string()],
            ..Default::default()
        };
        let finding = TacticalHeuristic::new()
            .evaluate(&play(&[(70.0, 20.0), (80.0, 80.0), (20.0, 10.0)]), &context);
        assert!(finding.issues().any(|i| i.kind == "overcommitted_when_leading"));
        assert_eq!(finding.guidance.len(), 1);
        assert_eq!(finding.guidance[0].category, SuggestionCategory::Timing);
    }
}
