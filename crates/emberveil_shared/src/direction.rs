//! # Walking Directions
//!
//! The eight compass directions a single step can take, with the wire ids
//! the client expects in movement sectors.
//!
//! ```text
//!   0 1 2        NW  N  NE
//!   3   4   =>   W      E
//!   5 6 7        SW  S  SE
//! ```

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// One tile step in one of eight directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// x - 1, y + 1
    NorthWest = 0,
    /// y + 1
    North = 1,
    /// x + 1, y + 1
    NorthEast = 2,
    /// x - 1
    West = 3,
    /// x + 1
    East = 4,
    /// x - 1, y - 1
    SouthWest = 5,
    /// y - 1
    South = 6,
    /// x + 1, y - 1
    SouthEast = 7,
}

impl Direction {
    /// All directions in wire-id order.
    pub const ALL: [Self; 8] = [
        Self::NorthWest,
        Self::North,
        Self::NorthEast,
        Self::West,
        Self::East,
        Self::SouthWest,
        Self::South,
        Self::SouthEast,
    ];

    /// Returns the 3-bit wire id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Decodes a 3-bit wire id.
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::NorthWest),
            1 => Some(Self::North),
            2 => Some(Self::NorthEast),
            3 => Some(Self::West),
            4 => Some(Self::East),
            5 => Some(Self::SouthWest),
            6 => Some(Self::South),
            7 => Some(Self::SouthEast),
            _ => None,
        }
    }

    /// Returns the `(dx, dy)` tile delta of one step.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::NorthWest => (-1, 1),
            Self::North => (0, 1),
            Self::NorthEast => (1, 1),
            Self::West => (-1, 0),
            Self::East => (1, 0),
            Self::SouthWest => (-1, -1),
            Self::South => (0, -1),
            Self::SouthEast => (1, -1),
        }
    }

    /// Returns the direction of a one-tile step, or `None` when the delta is
    /// not a single adjacent step.
    #[must_use]
    pub const fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (-1, 1) => Some(Self::NorthWest),
            (0, 1) => Some(Self::North),
            (1, 1) => Some(Self::NorthEast),
            (-1, 0) => Some(Self::West),
            (1, 0) => Some(Self::East),
            (-1, -1) => Some(Self::SouthWest),
            (0, -1) => Some(Self::South),
            (1, -1) => Some(Self::SouthEast),
            _ => None,
        }
    }

    /// Direction of the step from `from` to the adjacent tile `to`.
    #[must_use]
    pub fn between(from: Position, to: Position) -> Option<Self> {
        if from.plane != to.plane {
            return None;
        }
        let (dx, dy) = from.delta_to(to);
        Self::from_delta(dx, dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_id(direction.id()), Some(direction));
        }
        assert_eq!(Direction::from_id(8), None);
    }

    #[test]
    fn test_delta_round_trip() {
        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            assert_eq!(Direction::from_delta(dx, dy), Some(direction));
        }
        assert_eq!(Direction::from_delta(0, 0), None);
        assert_eq!(Direction::from_delta(2, 0), None);
    }

    #[test]
    fn test_between_adjacent_tiles() {
        let from = Position::new(3200, 3200, 0);
        assert_eq!(
            Direction::between(from, Position::new(3201, 3199, 0)),
            Some(Direction::SouthEast)
        );
        assert_eq!(Direction::between(from, Position::new(3202, 3200, 0)), None);
        assert_eq!(Direction::between(from, Position::new(3201, 3200, 1)), None);
    }
}
