//! Free-text response parsing.
//!
//! Backends answer in natural language. The default [`TextResponseParser`]
//! reads the line-oriented format the system prompt asks for, but is lenient
//! about everything else:
//!
//! | Field | Pattern (tried in order) | Default |
//! |-------|--------------------------|---------|
//! | Scores | `<label>: N/100`, `<label>: N%`, `<label>: N` | 50 |
//! | Judgments | `<label>: true\|yes\|good\|optimal` | false |
//! | Recommendations | bullets under a `… recommendations` heading, ≤3 per category | none |
//! | Risks | bullets under a `risks` heading | none |
//!
//! Every rule lives in a table keyed by label, so a backend with different
//! conventions registers its own parser instead of touching merge logic.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

use playsight_core::{
    clamp_score, Category, Priority, Risk, Severity, Suggestion, SuggestionCategory, MAX_RISKS,
};

/// Neutral score used for any score field the response did not contain.
pub const DEFAULT_SCORE: u8 = 50;

/// Recommendations kept per suggestion category.
pub const MAX_RECOMMENDATIONS_PER_CATEGORY: usize = 3;

/// Judgments the default system prompt asks for.
pub const JUDGMENT_LABELS: [&str; 4] = [
    "spacing adequate",
    "timing optimal",
    "formation valid",
    "objectives achievable",
];

lazy_static! {
    static ref TRUTHY: Regex = Regex::new(r"(?i)\b(true|yes|good|optimal)\b").unwrap();

    static ref BULLET: Regex = Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+?)\s*$").unwrap();

    static ref RECOMMENDATION_HEADING: Regex = Regex::new(
        r"(?i)^[#*\s]*([a-z][a-z\- ]*?)?\s*(?:recommendations?|suggestions?)(?:\s+for\s+([a-z\- ]+?))?\s*[:*]*\s*$"
    ).unwrap();

    static ref RISK_HEADING: Regex = Regex::new(
        r"(?i)^[#*\s]*(?:[a-z][a-z\- ]*\s)?risks?\s*[:*]*\s*$"
    ).unwrap();

    static ref MAJOR_WORDS: Regex = Regex::new(r"(?i)\b(critical|major|severe|high)\b").unwrap();

    static ref MINOR_WORDS: Regex = Regex::new(r"(?i)\b(minor|low|slight)\b").unwrap();

    static ref URGENT_WORDS: Regex = Regex::new(r"(?i)\b(critical|must|urgent|immediately)\b").unwrap();

    static ref DEFAULT_SCORE_RULES: Vec<ScoreRule> = vec![
        ScoreRule::new(ScoreField::Overall, "overall").unwrap(),
        ScoreRule::new(ScoreField::Category(Category::Spacing), "spacing").unwrap(),
        ScoreRule::new(ScoreField::Category(Category::Timing), "timing").unwrap(),
        ScoreRule::new(ScoreField::Category(Category::Formation), "formation").unwrap(),
        ScoreRule::new(ScoreField::Category(Category::Effectiveness), "effectiveness").unwrap(),
        ScoreRule::new(ScoreField::Category(Category::Tactical), "tactical").unwrap(),
    ];

    static ref DEFAULT_JUDGMENT_RULES: Vec<JudgmentRule> = JUDGMENT_LABELS
        .iter()
        .map(|label| JudgmentRule::new(label).unwrap())
        .collect();
}

/// Score a rule writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreField {
    Overall,
    Category(Category),
}

/// Label → ordered patterns for one numeric score.
#[derive(Debug, Clone)]
pub struct ScoreRule {
    pub field: ScoreField,
    pub label: String,
    patterns: [Regex; 3],
}

impl ScoreRule {
    /// Build the `N/100`, `N%` and bare `N` patterns for a label.
    pub fn new(field: ScoreField, label: &str) -> Result<Self, regex::Error> {
        let prefix = format!(r"(?im)^[^\w\n]*{}\b[^:\n]*:[ \t]*(\d{{1,3}}(?:\.\d+)?)", regex::escape(label));
        Ok(Self {
            field,
            label: label.to_string(),
            patterns: [
                Regex::new(&format!(r"{}[ \t]*/[ \t]*100\b", prefix))?,
                Regex::new(&format!(r"{}[ \t]*%", prefix))?,
                Regex::new(&format!(r"{}\b", prefix))?,
            ],
        })
    }

    /// First match in descending specificity.
    fn find(&self, text: &str) -> Option<u8> {
        self.patterns.iter().find_map(|pattern| {
            pattern
                .captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .map(clamp_score)
        })
    }
}

/// Label → pattern for one boolean judgment.
#[derive(Debug, Clone)]
pub struct JudgmentRule {
    pub label: String,
    pattern: Regex,
}

impl JudgmentRule {
    pub fn new(label: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            label: label.to_string(),
            pattern: Regex::new(&format!(
                r"(?im)^[^\w\n]*{}\b[^:\n]*:[ \t]*([^\n]+)",
                regex::escape(label)
            ))?,
        })
    }

    fn find(&self, text: &str) -> Option<bool> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|value| TRUTHY.is_match(value.as_str()))
    }
}

/// What a parser found; absent fields stay `None` so merge can skip them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub overall: Option<u8>,
    pub categories: HashMap<Category, u8>,
    pub judgments: BTreeMap<String, bool>,
    pub suggestions: Vec<Suggestion>,
    pub risks: Vec<Risk>,
}

impl ParsedResponse {
    pub fn category(&self, category: Category) -> Option<u8> {
        self.categories.get(&category).copied()
    }

    /// True when nothing at all was recognised.
    pub fn is_empty(&self) -> bool {
        self.overall.is_none()
            && self.categories.is_empty()
            && self.judgments.is_empty()
            && self.suggestions.is_empty()
            && self.risks.is_empty()
    }

    /// Every field filled, using the neutral defaults for misses.
    pub fn resolved(&self) -> ResolvedResponse {
        let mut judgments: BTreeMap<String, bool> = JUDGMENT_LABELS
            .iter()
            .map(|label| (label.to_string(), false))
            .collect();
        judgments.extend(self.judgments.iter().map(|(k, v)| (k.clone(), *v)));

        ResolvedResponse {
            overall: self.overall.unwrap_or(DEFAULT_SCORE),
            categories: Category::ALL
                .iter()
                .map(|c| (*c, self.category(*c).unwrap_or(DEFAULT_SCORE)))
                .collect(),
            judgments,
            suggestions: self.suggestions.clone(),
            risks: self.risks.clone(),
        }
    }
}

/// A parsed response with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResponse {
    pub overall: u8,
    pub categories: HashMap<Category, u8>,
    pub judgments: BTreeMap<String, bool>,
    pub suggestions: Vec<Suggestion>,
    pub risks: Vec<Risk>,
}

/// Turns backend text into a [`ParsedResponse`].
///
/// Parsing never fails: unrecognised text yields an empty response.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, text: &str) -> ParsedResponse;
}

/// Table-driven parser for the line-oriented response format.
#[derive(Debug, Clone)]
pub struct TextResponseParser {
    score_rules: Vec<ScoreRule>,
    judgment_rules: Vec<JudgmentRule>,
}

impl TextResponseParser {
    pub fn new() -> Self {
        Self {
            score_rules: DEFAULT_SCORE_RULES.clone(),
            judgment_rules: DEFAULT_JUDGMENT_RULES.clone(),
        }
    }

    /// Add an alias label for a score (e.g. "width" for spacing).
    ///
    /// Rules are tried in registration order; the first label that matches wins.
    pub fn with_score_label(mut self, field: ScoreField, label: &str) -> Result<Self, regex::Error> {
        self.score_rules.push(ScoreRule::new(field, label)?);
        Ok(self)
    }

    pub fn with_judgment_label(mut self, label: &str) -> Result<Self, regex::Error> {
        self.judgment_rules.push(JudgmentRule::new(label)?);
        Ok(self)
    }

    fn parse_scores(&self, text: &str, parsed: &mut ParsedResponse) {
        for rule in &self.score_rules {
            let already = match rule.field {
                ScoreField::Overall => parsed.overall.is_some(),
                ScoreField::Category(c) => parsed.categories.contains_key(&c),
            };
            if already {
                continue;
            }
            match (rule.field, rule.find(text)) {
                (ScoreField::Overall, Some(score)) => parsed.overall = Some(score),
                (ScoreField::Category(c), Some(score)) => {
                    parsed.categories.insert(c, score);
                }
                (_, None) => {}
            }
        }

        if parsed.overall.is_none() {
            tracing::debug!(field = "overall", "No score found in backend response");
        }
        for category in Category::ALL {
            if !parsed.categories.contains_key(&category) {
                tracing::debug!(field = %category, "No score found in backend response");
            }
        }
    }

    fn parse_judgments(&self, text: &str, parsed: &mut ParsedResponse) {
        for rule in &self.judgment_rules {
            match rule.find(text) {
                Some(value) => {
                    parsed.judgments.insert(rule.label.clone(), value);
                }
                None => tracing::debug!(judgment = %rule.label, "No judgment found in backend response"),
            }
        }
    }

    fn parse_sections(&self, text: &str, parsed: &mut ParsedResponse) {
        enum Section {
            None,
            Recommendations(Option<SuggestionCategory>),
            Risks,
        }

        let mut section = Section::None;
        let mut per_category: HashMap<SuggestionCategory, usize> = HashMap::new();

        for line in text.lines() {
            if let Some(caps) = RECOMMENDATION_HEADING.captures(line) {
                let heading = [caps.get(1), caps.get(2)]
                    .iter()
                    .flatten()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                let category = match SuggestionCategory::from_keywords(&heading) {
                    SuggestionCategory::General => None,
                    category => Some(category),
                };
                section = Section::Recommendations(category);
                continue;
            }
            if RISK_HEADING.is_match(line) {
                section = Section::Risks;
                continue;
            }

            let Some(item) = BULLET.captures(line).and_then(|caps| caps.get(1)) else {
                if !line.trim().is_empty() {
                    section = Section::None;
                }
                continue;
            };
            let item = item.as_str();

            match section {
                Section::Recommendations(heading_category) => {
                    let category =
                        heading_category.unwrap_or_else(|| SuggestionCategory::from_keywords(item));
                    let count = per_category.entry(category).or_insert(0);
                    if *count >= MAX_RECOMMENDATIONS_PER_CATEGORY {
                        continue;
                    }
                    *count += 1;
                    let priority = if URGENT_WORDS.is_match(item) {
                        Priority::High
                    } else {
                        Priority::Medium
                    };
                    parsed.suggestions.push(Suggestion::new(category, priority, item));
                }
                Section::Risks => {
                    if parsed.risks.len() >= MAX_RISKS {
                        continue;
                    }
                    let severity = if MAJOR_WORDS.is_match(item) {
                        Severity::Major
                    } else if MINOR_WORDS.is_match(item) {
                        Severity::Minor
                    } else {
                        Severity::Moderate
                    };
                    parsed.risks.push(Risk::new(severity, item));
                }
                Section::None => {}
            }
        }

        if parsed.suggestions.is_empty() {
            tracing::debug!("No recommendations found in backend response");
        }
    }
}

impl Default for TextResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser for TextResponseParser {
    fn parse(&self, text: &str) -> ParsedResponse {
        let mut parsed = ParsedResponse::default();
        self.parse_scores(text, &mut parsed);
        self.parse_judgments(text, &mut parsed);
        self.parse_sections(text, &mut parsed);
        parsed
    }
}
