//! Analysis request and result types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::play::Zone;

/// Version of the `StructuredAnalysis` schema.
pub const SCHEMA_VERSION: &str = "1.0";

/// Backend id used for results computed without any external call.
pub const LOCAL_BACKEND: &str = "local";

/// Upper bound on suggestions carried by one analysis.
pub const MAX_SUGGESTIONS: usize = 10;

/// Upper bound on risks carried by one analysis.
pub const MAX_RISKS: usize = 8;

/// Kind of analysis requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisType {
    Quick,
    Detailed,
    Comparative,
    OpponentPerspective,
    Learning,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 5] = [
        AnalysisType::Quick,
        AnalysisType::Detailed,
        AnalysisType::Comparative,
        AnalysisType::OpponentPerspective,
        AnalysisType::Learning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Quick => "quick",
            AnalysisType::Detailed => "detailed",
            AnalysisType::Comparative => "comparative",
            AnalysisType::OpponentPerspective => "opponent-perspective",
            AnalysisType::Learning => "learning",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisType::ALL
            .iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("Unknown analysis type: {}", s))
    }
}

/// Score state of the match when the play is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameSituation {
    Leading,
    Trailing,
    Level,
}

/// Optional context the play is analyzed under.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    #[serde(default)]
    pub game_situation: Option<GameSituation>,

    /// Formation the opponent is expected to line up in
    #[serde(default)]
    pub opponent_formation: Option<String>,

    /// Skill level of the squad (free text, e.g. "youth", "amateur")
    #[serde(default)]
    pub skill_level: Option<String>,

    /// Areas the coach wants feedback on
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

impl AnalysisContext {
    pub fn is_empty(&self) -> bool {
        self.game_situation.is_none()
            && self.opponent_formation.is_none()
            && self.skill_level.is_none()
            && self.focus_areas.is_empty()
    }
}

/// The five scored categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Spacing,
    Timing,
    Formation,
    Effectiveness,
    Tactical,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Spacing,
        Category::Timing,
        Category::Formation,
        Category::Effectiveness,
        Category::Tactical,
    ];

    /// Fixed weight of this category in the overall score.
    pub fn weight(&self) -> f64 {
        match self {
            Category::Spacing => 0.25,
            Category::Timing => 0.20,
            Category::Formation => 0.25,
            Category::Effectiveness => 0.20,
            Category::Tactical => 0.10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Spacing => "spacing",
            Category::Timing => "timing",
            Category::Formation => "formation",
            Category::Effectiveness => "effectiveness",
            Category::Tactical => "tactical",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious an issue or risk is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Major,
}

/// A problem a heuristic found in the play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Short machine-friendly kind (e.g., "clustering", "sequencing_gap")
    pub kind: String,

    pub severity: Severity,

    pub description: String,

    /// Zone the issue is located in, when it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
}

impl Issue {
    pub fn new(kind: impl Into<String>, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            severity,
            description: description.into(),
            zone: None,
        }
    }

    pub fn in_zone(mut self, zone: Zone) -> Self {
        self.zone = Some(zone);
        self
    }
}

/// Category a suggestion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    Positioning,
    Spacing,
    Timing,
    Formation,
    Effectiveness,
    Tactical,
    General,
}

impl SuggestionCategory {
    /// Classify free text by its first category keyword.
    pub fn from_keywords(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("position") || lower.contains("zone") {
            SuggestionCategory::Positioning
        } else if lower.contains("spac") || lower.contains("width") || lower.contains("distance") {
            SuggestionCategory::Spacing
        } else if lower.contains("timing") || lower.contains("tempo") || lower.contains("sequenc") {
            SuggestionCategory::Timing
        } else if lower.contains("formation") || lower.contains("shape") {
            SuggestionCategory::Formation
        } else if lower.contains("effective") || lower.contains("objective") || lower.contains("finish") {
            SuggestionCategory::Effectiveness
        } else if lower.contains("tactic") || lower.contains("press") || lower.contains("counter") {
            SuggestionCategory::Tactical
        } else {
            SuggestionCategory::General
        }
    }
}

impl From<Category> for SuggestionCategory {
    fn from(category: Category) -> Self {
        match category {
            Category::Spacing => SuggestionCategory::Spacing,
            Category::Timing => SuggestionCategory::Timing,
            Category::Formation => SuggestionCategory::Formation,
            Category::Effectiveness => SuggestionCategory::Effectiveness,
            Category::Tactical => SuggestionCategory::Tactical,
        }
    }
}

/// Suggestion priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl From<Severity> for Priority {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Minor => Priority::Low,
            Severity::Moderate => Priority::Medium,
            Severity::Major => Priority::High,
        }
    }
}

/// An actionable improvement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: SuggestionCategory,
    pub priority: Priority,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
}

impl Suggestion {
    pub fn new(category: SuggestionCategory, priority: Priority, text: impl Into<String>) -> Self {
        Self {
            category,
            priority,
            text: text.into(),
            zone: None,
        }
    }

    pub fn in_zone(mut self, zone: Zone) -> Self {
        self.zone = Some(zone);
        self
    }
}

/// Something that could go wrong when the play is run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub severity: Severity,
    pub description: String,
}

impl Risk {
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
        }
    }
}

/// Score of one category with the issues that drove it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// 0–100
    pub score: u8,

    #[serde(default)]
    pub issues: Vec<Issue>,
}

/// Scores of all five categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub spacing: CategoryScore,
    pub timing: CategoryScore,
    pub formation: CategoryScore,
    pub effectiveness: CategoryScore,
    pub tactical: CategoryScore,
}

impl CategoryScores {
    pub fn get(&self, category: Category) -> &CategoryScore {
        match category {
            Category::Spacing => &self.spacing,
            Category::Timing => &self.timing,
            Category::Formation => &self.formation,
            Category::Effectiveness => &self.effectiveness,
            Category::Tactical => &self.tactical,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut CategoryScore {
        match category {
            Category::Spacing => &mut self.spacing,
            Category::Timing => &mut self.timing,
            Category::Formation => &mut self.formation,
            Category::Effectiveness => &mut self.effectiveness,
            Category::Tactical => &mut self.tactical,
        }
    }

    /// Weighted overall score, rounded to the nearest integer.
    pub fn weighted_overall(&self) -> u8 {
        let total: f64 = Category::ALL
            .iter()
            .map(|c| f64::from(self.get(*c).score) * c.weight())
            .sum();
        clamp_score(total)
    }

    /// Lowest-scoring category; ties resolve to the first in weight order.
    pub fn weakest(&self) -> Category {
        let mut weakest = Category::Spacing;
        for category in Category::ALL {
            if self.get(category).score < self.get(weakest).score {
                weakest = category;
            }
        }
        weakest
    }
}

/// How complete the input data was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Low,
    Medium,
    High,
}

/// Provenance of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Backend that contributed the result ("local" when none did)
    pub source_backend: String,

    /// 0–100
    pub confidence: u8,

    pub data_quality: DataQuality,

    pub schema_version: String,

    pub analysis_type: AnalysisType,
}

/// The structured result of analyzing a play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    /// 0–100
    pub overall_score: u8,

    pub categories: CategoryScores,

    pub suggestions: Vec<Suggestion>,

    pub risks: Vec<Risk>,

    pub metadata: AnalysisMetadata,
}

impl StructuredAnalysis {
    /// Truncate suggestion and risk lists to their caps.
    pub fn cap_lists(&mut self) {
        self.suggestions.truncate(MAX_SUGGESTIONS);
        self.risks.truncate(MAX_RISKS);
    }

    /// Whether the result came from the local engine only.
    pub fn is_local(&self) -> bool {
        self.metadata.source_backend == LOCAL_BACKEND
    }
}

/// Round and clamp a raw score into 0–100.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}
