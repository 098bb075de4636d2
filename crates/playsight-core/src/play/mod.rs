//! Play parsing and validation.
//!
//! A play is a snapshot of player positions plus an ordered list of
//! movements and the objectives the play is meant to achieve. This module
//! handles parsing YAML/JSON plays and validating them.

mod parser;
mod zone;

pub use parser::{Movement, Play, PlayError, Player, Position};
pub use zone::{Third, Zone, ZoneOccupancy, FIELD_LENGTH, FIELD_WIDTH};
