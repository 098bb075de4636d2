//! Shared geometry and pattern helpers for heuristics.
//!
//! Distance checks, formation pattern matching and objective keyword
//! detection used by more than one heuristic live here so every heuristic
//! reads the field the same way.

use lazy_static::lazy_static;
use regex::Regex;

use crate::play::{Play, Position, Third};

/// Players closer than this (field units) crowd each other.
pub const MIN_SPACING: f64 = 10.0;

/// Largest plausible single line in a numeric formation.
pub const MAX_FORMATION_LINE: usize = 11;

/// Largest plausible outfield total in a numeric formation.
pub const MAX_FORMATION_TOTAL: usize = 20;

lazy_static! {
    /// Numeric formation such as "4-3-3" or "2-1-2"
    pub static ref NUMERIC_FORMATION: Regex = Regex::new(r"^\s*(\d+)(?:\s*-\s*\d+)+\s*$").unwrap();

    static ref FORMATION_LINE: Regex = Regex::new(r"\d+").unwrap();

    /// Objective families, matched against lowercase objective text
    pub static ref OBJECTIVE_PATTERNS: Vec<(ObjectiveKind, Regex)> = vec![
        (ObjectiveKind::Attack, Regex::new(r"(?i)\b(score|attack|finish|shoot|goal)").unwrap()),
        (ObjectiveKind::Defend, Regex::new(r"(?i)\b(defend|press|protect|block|recover)").unwrap()),
        (ObjectiveKind::Possession, Regex::new(r"(?i)\b(possession|build|width|circulat|keep the ball)").unwrap()),
        (ObjectiveKind::Transition, Regex::new(r"(?i)\b(counter|transition|break)").unwrap()),
    ];
}

/// Family an objective belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveKind {
    Attack,
    Defend,
    Possession,
    Transition,
}

/// Classify an objective; `None` if no family keyword matches.
pub fn classify_objective(objective: &str) -> Option<ObjectiveKind> {
    OBJECTIVE_PATTERNS
        .iter()
        .find(|(_, regex)| regex.is_match(objective))
        .map(|(kind, _)| *kind)
}

/// Index pairs of positions closer than [`MIN_SPACING`].
pub fn close_pairs(positions: &[Position]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if positions[i].distance_to(&positions[j]) < MIN_SPACING {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Expected outfield players per third (defensive, middle, attacking).
pub type ThirdDistribution = [usize; 3];

/// Parse a formation into its expected per-third distribution.
///
/// Numeric formations map the first line to the defensive third, the last
/// line to the attacking third and everything in between to the middle.
/// A handful of named shapes are recognised as well. Numeric formations
/// with an implausible line or total are treated as unrecognised.
pub fn formation_distribution(formation: &str) -> Option<ThirdDistribution> {
    if NUMERIC_FORMATION.is_match(formation) {
        let lines = FORMATION_LINE
            .find_iter(formation)
            .map(|m| m.as_str().parse::<usize>().ok().filter(|n| *n <= MAX_FORMATION_LINE))
            .collect::<Option<Vec<_>>>()?;
        if lines.iter().sum::<usize>() > MAX_FORMATION_TOTAL {
            return None;
        }
        let (first, rest) = lines.split_first()?;
        let (last, middle) = rest.split_last()?;
        return Some([*first, middle.iter().sum(), *last]);
    }

    match formation.trim().to_lowercase().as_str() {
        "diamond" => Some([1, 2, 1]),
        "box" | "square" => Some([2, 0, 2]),
        "triangle" => Some([2, 0, 1]),
        "stack" => Some([0, 1, 3]),
        "line" | "flat" => Some([0, 4, 0]),
        _ => None,
    }
}

/// Actual outfield players per third at the starting positions.
pub fn outfield_distribution(play: &Play) -> ThirdDistribution {
    let mut counts = [0usize; 3];
    for player in play.outfield_players() {
        let slot = match Third::containing(player.position.x) {
            Third::Defensive => 0,
            Third::Middle => 1,
            Third::Attacking => 2,
        };
        counts[slot] += 1;
    }
    counts
}

/// Fraction of movements that gain ground toward the attacking end.
///
/// `None` when the play has no movements for known players.
pub fn forward_progress_ratio(play: &Play) -> Option<f64> {
    let mut current: Vec<(&str, Position)> = play
        .players
        .iter()
        .map(|p| (p.id.as_str(), p.position))
        .collect();

    let mut forward = 0usize;
    let mut counted = 0usize;
    for movement in play.ordered_movements() {
        if let Some(slot) = current.iter_mut().find(|(id, _)| *id == movement.player_id) {
            counted += 1;
            if movement.to.x > slot.1.x {
                forward += 1;
            }
            slot.1 = movement.to;
        }
    }

    if counted == 0 {
        None
    } else {
        Some(forward as f64 / counted as f64)
    }
}
