//! Play parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::zone::{Zone, ZoneOccupancy, FIELD_LENGTH, FIELD_WIDTH};

/// Errors that can occur when parsing plays.
#[derive(Error, Debug)]
pub enum PlayError {
    #[error("Failed to read play file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Play validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// A point on the field, in field units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    /// Distance from the defending end line (0) to the attacking end line (100)
    pub x: f64,

    /// Distance from the left touchline (0) to the right touchline (100)
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Zone containing this position.
    pub fn zone(&self) -> Zone {
        Zone::containing(self)
    }

    fn is_on_field(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && (0.0..=FIELD_LENGTH).contains(&self.x)
            && (0.0..=FIELD_WIDTH).contains(&self.y)
    }
}

/// A player at their starting position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    /// Unique identifier within the play (e.g., "p1", "lw")
    pub id: String,

    /// Starting position
    pub position: Position,

    /// Role hint (e.g., "goalkeeper", "striker")
    #[serde(default)]
    pub role: Option<String>,
}

impl Player {
    /// Goalkeepers are excluded from outfield shape checks.
    pub fn is_goalkeeper(&self) -> bool {
        matches!(
            self.role.as_deref().map(str::to_lowercase).as_deref(),
            Some("goalkeeper") | Some("gk") | Some("keeper")
        )
    }
}

/// A single player movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movement {
    /// Player making the run
    pub player_id: String,

    /// Destination of the run
    pub to: Position,

    /// Seconds from the start of the play
    pub start_secs: f64,

    /// How long the run takes
    #[serde(default)]
    pub duration_secs: f64,
}

impl Movement {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// A tactical play.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Play {
    /// Human-readable name
    pub name: String,

    /// Declared formation (e.g., "4-3-3", "diamond")
    #[serde(default)]
    pub formation: Option<String>,

    /// Players at their starting positions
    pub players: Vec<Player>,

    /// Movements in any order; analysis sorts them by start time
    #[serde(default)]
    pub movements: Vec<Movement>,

    /// What the play is meant to achieve
    #[serde(default)]
    pub objectives: Vec<String>,
}

impl Play {
    /// Parse a play from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, PlayError> {
        let play: Play = serde_yaml::from_str(yaml)?;
        play.validate()?;
        Ok(play)
    }

    /// Parse a play from JSON string.
    pub fn from_json(json: &str) -> Result<Self, PlayError> {
        let play: Play = serde_json::from_str(json)?;
        play.validate()?;
        Ok(play)
    }

    /// Parse a play from a file, choosing the format by extension.
    ///
    /// `.json` is parsed as JSON, everything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PlayError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Validate the play structure.
    pub fn validate(&self) -> Result<(), PlayError> {
        if self.name.trim().is_empty() {
            return Err(PlayError::MissingField("name".to_string()));
        }

        if self.players.is_empty() {
            return Err(PlayError::MissingField("players".to_string()));
        }

        let mut seen = HashSet::new();
        for player in &self.players {
            if player.id.is_empty() {
                return Err(PlayError::MissingField("players[].id".to_string()));
            }
            if !seen.insert(player.id.as_str()) {
                return Err(PlayError::ValidationError(format!(
                    "Duplicate player ID: {}",
                    player.id
                )));
            }
            if !player.position.is_on_field() {
                return Err(PlayError::ValidationError(format!(
                    "Player {} is off the field at ({}, {})",
                    player.id, player.position.x, player.position.y
                )));
            }
        }

        for (index, movement) in self.movements.iter().enumerate() {
            if !movement.to.is_on_field() {
                return Err(PlayError::ValidationError(format!(
                    "Movement {} targets a point off the field",
                    index
                )));
            }
            if !(movement.start_secs.is_finite() && movement.start_secs >= 0.0)
                || !(movement.duration_secs.is_finite() && movement.duration_secs >= 0.0)
            {
                return Err(PlayError::ValidationError(format!(
                    "Movement {} has a negative or non-finite time",
                    index
                )));
            }
        }

        Ok(())
    }

    /// Look up a player by ID.
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Players excluding goalkeepers.
    pub fn outfield_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.is_goalkeeper())
    }

    /// Movements ordered by start time (stable for equal starts).
    pub fn ordered_movements(&self) -> Vec<&Movement> {
        let mut ordered: Vec<&Movement> = self.movements.iter().collect();
        ordered.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));
        ordered
    }

    /// Zone occupancy at the starting positions.
    pub fn zone_occupancy(&self) -> ZoneOccupancy {
        ZoneOccupancy::from_positions(self.players.iter().map(|p| &p.position))
    }

    /// Final position of each player after every movement is applied in order.
    pub fn final_positions(&self) -> Vec<(&str, Position)> {
        let mut positions: Vec<(&str, Position)> = self
            .players
            .iter()
            .map(|p| (p.id.as_str(), p.position))
            .collect();

        for movement in self.ordered_movements() {
            if let Some(slot) = positions.iter_mut().find(|(id, _)| *id == movement.player_id) {
                slot.1 = movement.to;
            }
        }

        positions
    }
}
