//! # playsight-core
//!
//! Deterministic tactical play analysis engine.
//!
//! This crate scores a play (player positions, runs and objectives) across
//! five categories and answers:
//! - Is the team spread well enough to receive and support?
//! - Do the runs follow each other in a usable rhythm?
//! - Does the play fit the shape, objectives and match situation?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same play and context always produce the same analysis
//! 2. **No external calls**: All scoring is rule-based
//! 3. **Bounded**: Scores are 0–100 and suggestion/risk lists are capped
//! 4. **Always available**: This is the floor the runtime falls back to
//!
//! ## Example
//!
//! ```rust,ignore
//! use playsight_core::{analyze, AnalysisType, Play};
//!
//! let play = Play::from_file("overlap.yaml")?;
//! let analysis = analyze(&play, AnalysisType::Quick, None)?;
//!
//! println!("overall {}/100", analysis.overall_score);
//! for suggestion in &analysis.suggestions {
//!     println!("- {}", suggestion.text);
//! }
//! ```

pub mod heuristics;
pub mod play;
pub mod scorer;
pub mod types;

// Re-export main types at crate root
pub use heuristics::{
    CategoryFinding, EffectivenessHeuristic, FormationHeuristic, Heuristic, Observation,
    SpacingHeuristic, TacticalHeuristic, TimingHeuristic,
};
pub use play::{Movement, Play, PlayError, Player, Position, Third, Zone, ZoneOccupancy};
pub use scorer::Scorer;
pub use types::{
    clamp_score, AnalysisContext, AnalysisMetadata, AnalysisType, Category, CategoryScore,
    CategoryScores, DataQuality, GameSituation, Issue, Priority, Risk, Severity,
    StructuredAnalysis, Suggestion, SuggestionCategory, LOCAL_BACKEND, MAX_RISKS,
    MAX_SUGGESTIONS, SCHEMA_VERSION,
};

use thiserror::Error;

/// Errors that can occur during analysis
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Play error: {0}")]
    Play(#[from] PlayError),

    #[error("Invalid play: {0}")]
    InvalidPlay(String),
}

/// Analyze a play.
///
/// This is the main entry point for local analysis. The play is validated
/// first; an invalid play is rejected rather than scored.
///
/// # Arguments
///
/// * `play` - The play to analyze
/// * `analysis_type` - Shapes which suggestions and risks are reported
/// * `context` - Optional match context (game situation, opponent, focus areas)
pub fn analyze(
    play: &Play,
    analysis_type: AnalysisType,
    context: Option<&AnalysisContext>,
) -> Result<StructuredAnalysis, AnalysisError> {
    play.validate()?;

    if play.outfield_players().next().is_none() {
        return Err(AnalysisError::InvalidPlay(format!(
            "play '{}' has no outfield players",
            play.name
        )));
    }

    let analysis = Scorer::new().analyze(play, analysis_type, context);
    tracing::debug!(
        play = %play.name,
        analysis_type = %analysis_type,
        overall = analysis.overall_score,
        "Local analysis complete"
    );

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CLUSTERED_PLAY: &str = r#"
name: "Crowded build-up"
players:
  - id: p1
    position: { x: 10, y: 10 }
  - id: p2
    position: { x: 15, y: 12 }
  - id: p3
    position: { x: 12, y: 20 }
  - id: p4
    position: { x: 20, y: 15 }
  - id: p5
    position: { x: 20, y: 70 }
"#;

    #[test]
    fn test_clustered_play_flags_defensive_left() {
        let play = Play::from_yaml(CLUSTERED_PLAY).unwrap();
        let analysis = analyze(&play, AnalysisType::Quick, None).unwrap();

        assert!(analysis.categories.spacing.score < 70);
        assert!(analysis
            .categories
            .spacing
            .issues
            .iter()
            .any(|i| i.kind == "clustering" && i.zone == Some(Zone::DefensiveLeft)));
        assert!(analysis.suggestions.iter().any(|s| {
            s.category == SuggestionCategory::Positioning && s.text.contains("defensive-left")
        }));
        assert!(analysis.is_local());
    }

    #[test]
    fn test_invalid_play_rejected() {
        let play = Play {
            name: "Empty".to_string(),
            formation: None,
            players: vec![],
            movements: vec![],
            objectives: vec![],
        };
        let result = analyze(&play, AnalysisType::Quick, None);
        assert!(matches!(result, Err(AnalysisError::Play(_))));
    }

    #[test]
    fn test_goalkeeper_only_rejected() {
        let yaml = r#"
name: "Keeper"
players:
  - id: gk
    role: goalkeeper
    position: { x: 2, y: 50 }
"#;
        let play = Play::from_yaml(yaml).unwrap();
        let result = analyze(&play, AnalysisType::Detailed, None);
        assert!(matches!(result, Err(AnalysisError::InvalidPlay(_))));
    }

    #[test]
    fn test_oversized_formation_still_scores() {
        let yaml = r#"
name: "Typo"
formation: "5000000000-1-1"
players:
  - { id: a, position: { x: 20, y: 30 } }
  - { id: b, position: { x: 50, y: 50 } }
  - { id: c, position: { x: 80, y: 70 } }
"#;
        let play = Play::from_yaml(yaml).unwrap();
        let analysis = analyze(&play, AnalysisType::Quick, None).unwrap();
        assert!(analysis
            .categories
            .formation
            .issues
            .iter()
            .any(|i| i.kind == "formation_unrecognised"));
    }

    fn arb_play() -> impl Strategy<Value = Play> {
        prop::collection::vec((0.0f64..=100.0, 0.0f64..=100.0), 1..12).prop_map(|positions| Play {
            name: "Generated".to_string(),
            formation: None,
            players: positions
                .into_iter()
                .enumerate()
                .map(|(i, (x, y))| Player {
                    id: format!("p{}", i),
                    position: Position::new(x, y),
                    role: None,
                })
                .collect(),
            movements: vec![],
            objectives: vec![],
        })
    }

    proptest! {
        #[test]
        fn prop_analysis_is_bounded_and_deterministic(play in arb_play(), type_idx in 0usize..5) {
            let analysis_type = AnalysisType::ALL[type_idx];
            let first = analyze(&play, analysis_type, None).unwrap();
            let second = analyze(&play, analysis_type, None).unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert!(first.overall_score <= 100);
            for category in Category::ALL {
                prop_assert!(first.categories.get(category).score <= 100);
            }
            prop_assert!(first.suggestions.len() <= MAX_SUGGESTIONS);
            prop_assert!(first.risks.len() <= MAX_RISKS);
            prop_assert_eq!(first.overall_score, first.categories.weighted_overall());
        }
    }
}
