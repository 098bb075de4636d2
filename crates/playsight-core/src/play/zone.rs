//! Field zones.
//!
//! The field is split into three thirds along its length and two halves
//! across its width, giving six zones. Occupancy vectors are always ordered
//! defensive-left, defensive-right, middle-left, middle-right,
//! attacking-left, attacking-right.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::parser::Position;

/// Field length in field units.
pub const FIELD_LENGTH: f64 = 100.0;

/// Field width in field units.
pub const FIELD_WIDTH: f64 = 100.0;

/// A third of the field along its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Third {
    Defensive,
    Middle,
    Attacking,
}

impl Third {
    pub fn containing(x: f64) -> Self {
        if x < FIELD_LENGTH / 3.0 {
            Third::Defensive
        } else if x < FIELD_LENGTH * 2.0 / 3.0 {
            Third::Middle
        } else {
            Third::Attacking
        }
    }
}

/// One of the six field zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Zone {
    DefensiveLeft,
    DefensiveRight,
    MiddleLeft,
    MiddleRight,
    AttackingLeft,
    AttackingRight,
}

impl Zone {
    /// All zones in occupancy order.
    pub const ALL: [Zone; 6] = [
        Zone::DefensiveLeft,
        Zone::DefensiveRight,
        Zone::MiddleLeft,
        Zone::MiddleRight,
        Zone::AttackingLeft,
        Zone::AttackingRight,
    ];

    /// Zone containing a position.
    pub fn containing(position: &Position) -> Self {
        let left = position.y < FIELD_WIDTH / 2.0;
        match (Third::containing(position.x), left) {
            (Third::Defensive, true) => Zone::DefensiveLeft,
            (Third::Defensive, false) => Zone::DefensiveRight,
            (Third::Middle, true) => Zone::MiddleLeft,
            (Third::Middle, false) => Zone::MiddleRight,
            (Third::Attacking, true) => Zone::AttackingLeft,
            (Third::Attacking, false) => Zone::AttackingRight,
        }
    }

    /// Index into an occupancy vector.
    pub fn index(&self) -> usize {
        match self {
            Zone::DefensiveLeft => 0,
            Zone::DefensiveRight => 1,
            Zone::MiddleLeft => 2,
            Zone::MiddleRight => 3,
            Zone::AttackingLeft => 4,
            Zone::AttackingRight => 5,
        }
    }

    pub fn third(&self) -> Third {
        match self {
            Zone::DefensiveLeft | Zone::DefensiveRight => Third::Defensive,
            Zone::MiddleLeft | Zone::MiddleRight => Third::Middle,
            Zone::AttackingLeft | Zone::AttackingRight => Third::Attacking,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::DefensiveLeft => "defensive-left",
            Zone::DefensiveRight => "defensive-right",
            Zone::MiddleLeft => "middle-left",
            Zone::MiddleRight => "middle-right",
            Zone::AttackingLeft => "attacking-left",
            Zone::AttackingRight => "attacking-right",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Player counts per zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZoneOccupancy([usize; 6]);

impl ZoneOccupancy {
    pub fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Self {
        let mut counts = [0usize; 6];
        for position in positions {
            counts[Zone::containing(position).index()] += 1;
        }
        Self(counts)
    }

    pub fn count(&self, zone: Zone) -> usize {
        self.0[zone.index()]
    }

    pub fn counts(&self) -> [usize; 6] {
        self.0
    }

    /// Zones holding at least one player.
    pub fn occupied(&self) -> usize {
        self.0.iter().filter(|c| **c > 0).count()
    }

    pub fn third_count(&self, third: Third) -> usize {
        Zone::ALL
            .iter()
            .filter(|z| z.third() == third)
            .map(|z| self.count(*z))
            .sum()
    }

    /// (left, right) half counts.
    pub fn half_counts(&self) -> (usize, usize) {
        let left = self.0[0] + self.0[2] + self.0[4];
        let right = self.0[1] + self.0[3] + self.0[5];
        (left, right)
    }

    /// Zones paired with their counts, in occupancy order.
    pub fn iter(&self) -> impl Iterator<Item = (Zone, usize)> + '_ {
        Zone::ALL.iter().map(move |z| (*z, self.count(*z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_boundaries() {
        assert_eq!(Zone::containing(&Position::new(0.0, 0.0)), Zone::DefensiveLeft);
        assert_eq!(Zone::containing(&Position::new(33.0, 50.0)), Zone::DefensiveRight);
        assert_eq!(Zone::containing(&Position::new(34.0, 49.9)), Zone::MiddleLeft);
        assert_eq!(Zone::containing(&Position::new(66.0, 90.0)), Zone::MiddleRight);
        assert_eq!(Zone::containing(&Position::new(67.0, 10.0)), Zone::AttackingLeft);
        assert_eq!(Zone::containing(&Position::new(100.0, 100.0)), Zone::AttackingRight);
    }

    #[test]
    fn test_occupancy_counts() {
        let positions = [
            Position::new(10.0, 10.0),
            Position::new(12.0, 20.0),
            Position::new(50.0, 70.0),
            Position::new(80.0, 30.0),
        ];
        let occupancy = ZoneOccupancy::from_positions(positions.iter());

        assert_eq!(occupancy.counts(), [2, 0, 0, 1, 1, 0]);
        assert_eq!(occupancy.occupied(), 3);
        assert_eq!(occupancy.third_count(Third::Defensive), 2);
        assert_eq!(occupancy.half_counts(), (3, 1));
    }
}
