//! Scorer: combines heuristic findings into a structured analysis.
//!
//! The scorer applies fixed, non-configurable rules:
//! 1. Overall score is the weighted sum of the five category scores
//!    (spacing 0.25, timing 0.20, formation 0.25, effectiveness 0.20,
//!    tactical 0.10).
//! 2. Suggestions come from issues, highest priority first; `quick`
//!    analyses skip minor issues.
//! 3. Major issues always become risks.
//! 4. Lists are capped so cached entries stay bounded.

use crate::heuristics::{
    CategoryFinding, EffectivenessHeuristic, FormationHeuristic, Heuristic, SpacingHeuristic,
    TacticalHeuristic, TimingHeuristic,
};
use crate::play::Play;
use crate::types::{
    AnalysisContext, AnalysisMetadata, AnalysisType, Category, CategoryScore, CategoryScores,
    DataQuality, Priority, Risk, Severity, StructuredAnalysis, Suggestion, SuggestionCategory,
    LOCAL_BACKEND, SCHEMA_VERSION,
};

const BASE_CONFIDENCE: u8 = 60;
const CONFIDENCE_PER_SIGNAL: u8 = 5;

/// Squad size from which spacing and shape readings are considered reliable.
const FULL_SQUAD: usize = 5;

/// The Scorer runs every heuristic and assembles the result.
pub struct Scorer {
    heuristics: Vec<Box<dyn Heuristic>>,
}

impl Scorer {
    pub fn new() -> Self {
        Self {
            heuristics: vec![
                Box::new(SpacingHeuristic::new()),
                Box::new(TimingHeuristic::new()),
                Box::new(FormationHeuristic::new()),
                Box::new(EffectivenessHeuristic::new()),
                Box::new(TacticalHeuristic::new()),
            ],
        }
    }

    /// Analyze a play that has already been validated.
    pub fn analyze(
        &self,
        play: &Play,
        analysis_type: AnalysisType,
        context: Option<&AnalysisContext>,
    ) -> StructuredAnalysis {
        let empty = AnalysisContext::default();
        let context = context.unwrap_or(&empty);

        let findings: Vec<CategoryFinding> = self
            .heuristics
            .iter()
            .map(|h| h.evaluate(play, context))
            .collect();

        let categories = self.build_scores(&findings);
        let overall_score = categories.weighted_overall();
        let mut suggestions = self.build_suggestions(&findings, analysis_type);
        let mut risks = self.build_risks(&findings, analysis_type);

        match analysis_type {
            AnalysisType::Comparative => {
                suggestions.push(self.comparison_note(play, &categories));
            }
            AnalysisType::Learning => {
                suggestions.insert(0, self.lesson(categories.weakest()));
            }
            _ => {}
        }

        suggestions.extend(findings.iter().flat_map(|f| f.guidance.iter().cloned()));

        // Stable sort keeps heuristic order within a priority band
        risks.sort_by(|a, b| b.severity.cmp(&a.severity));

        let signals = self.count_signals(play, context);
        let mut analysis = StructuredAnalysis {
            overall_score,
            categories,
            suggestions,
            risks,
            metadata: AnalysisMetadata {
                source_backend: LOCAL_BACKEND.to_string(),
                confidence: BASE_CONFIDENCE + CONFIDENCE_PER_SIGNAL * signals,
                data_quality: match signals {
                    0 | 1 => DataQuality::Low,
                    2 | 3 => DataQuality::Medium,
                    _ => DataQuality::High,
                },
                schema_version: SCHEMA_VERSION.to_string(),
                analysis_type,
            },
        };
        analysis.cap_lists();
        analysis
    }

    fn build_scores(&self, findings: &[CategoryFinding]) -> CategoryScores {
        let score_for = |category: Category| {
            findings
                .iter()
                .find(|f| f.category == category)
                .map(|f| CategoryScore {
                    score: f.score,
                    issues: f.issues().cloned().collect(),
                })
                .unwrap_or(CategoryScore {
                    score: 0,
                    issues: vec![],
                })
        };

        CategoryScores {
            spacing: score_for(Category::Spacing),
            timing: score_for(Category::Timing),
            formation: score_for(Category::Formation),
            effectiveness: score_for(Category::Effectiveness),
            tactical: score_for(Category::Tactical),
        }
    }

    fn build_suggestions(&self, findings: &[CategoryFinding], analysis_type: AnalysisType) -> Vec<Suggestion> {
        let mut suggestions: Vec<Suggestion> = findings
            .iter()
            .flat_map(|f| f.observations.iter())
            .filter(|o| analysis_type != AnalysisType::Quick || o.issue.severity >= Severity::Moderate)
            .filter_map(|o| o.suggestion.clone())
            .collect();

        suggestions.sort_by(|a, b| b.priority.cmp(&a.priority));
        suggestions
    }

    fn build_risks(&self, findings: &[CategoryFinding], analysis_type: AnalysisType) -> Vec<Risk> {
        let issues = findings.iter().flat_map(|f| f.issues());

        if analysis_type == AnalysisType::OpponentPerspective {
            issues
                .filter(|i| i.severity >= Severity::Moderate)
                .map(|i| Risk::new(i.severity, format!("Opponent can exploit: {}", i.description)))
                .collect()
        } else {
            issues
                .filter(|i| i.severity == Severity::Major)
                .map(|i| Risk::new(i.severity, i.description.clone()))
                .collect()
        }
    }

    fn comparison_note(&self, play: &Play, categories: &CategoryScores) -> Suggestion {
        let weakest = categories.weakest();
        let template = play.formation.as_deref().unwrap_or("balanced");
        Suggestion::new(
            SuggestionCategory::from(weakest),
            Priority::Medium,
            format!(
                "Against a textbook {} template, {} is furthest off at {}/100",
                template,
                weakest,
                categories.get(weakest).score
            ),
        )
    }

    fn lesson(&self, weakest: Category) -> Suggestion {
        let text = match weakest {
            Category::Spacing => {
                "Lesson: good spacing keeps at least 10 units between teammates so one defender cannot mark two"
            }
            Category::Timing => {
                "Lesson: runs should follow each other within about three seconds so the defence never resets"
            }
            Category::Formation => {
                "Lesson: the starting shape should match the declared formation line by line"
            }
            Category::Effectiveness => {
                "Lesson: every run should either gain ground or create a passing option toward the objective"
            }
            Category::Tactical => {
                "Lesson: the same play needs different risk levels depending on the score and the opponent"
            }
        };
        Suggestion::new(SuggestionCategory::from(weakest), Priority::Medium, text)
    }

    fn count_signals(&self, play: &Play, context: &AnalysisContext) -> u8 {
        [
            play.players.len() >= FULL_SQUAD,
            !play.movements.is_empty(),
            play.formation.is_some(),
            !play.objectives.is_empty(),
            !context.is_empty(),
        ]
        .iter()
        .filter(|present| **present)
        .count() as u8
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new()
    }
}
