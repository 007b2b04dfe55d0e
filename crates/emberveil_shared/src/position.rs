//! # Tile Positions
//!
//! Absolute tile coordinates plus the region arithmetic the client uses to
//! turn them into 7-bit local coordinates.
//!
//! ## Regions
//!
//! The client keeps a 104x104 tile map centred on the last region it was
//! sent. A region is 8x8 tiles; the loaded map starts six regions west and
//! south of the base region:
//!
//! ```text
//! local_x = x - 8 * (base.region_x - 6)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::direction::Direction;

/// Size of the client's loaded map, in tiles.
pub const LOADED_AREA_SIZE: i32 = 104;

/// Local coordinates closer than this to the loaded edge force a new base.
pub const REBASE_MARGIN: i32 = 16;

/// Absolute tile position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// West-east tile coordinate.
    pub x: u16,
    /// South-north tile coordinate.
    pub y: u16,
    /// Height level (0..=3).
    pub plane: u8,
}

impl Position {
    /// Creates a position.
    #[inline]
    #[must_use]
    pub const fn new(x: u16, y: u16, plane: u8) -> Self {
        Self { x, y, plane }
    }

    /// Region column containing this tile.
    #[inline]
    #[must_use]
    pub const fn region_x(self) -> u16 {
        self.x >> 3
    }

    /// Region row containing this tile.
    #[inline]
    #[must_use]
    pub const fn region_y(self) -> u16 {
        self.y >> 3
    }

    /// X coordinate inside the map loaded around `base`.
    #[must_use]
    pub fn local_x(self, base: Self) -> i32 {
        i32::from(self.x) - 8 * (i32::from(base.region_x()) - 6)
    }

    /// Y coordinate inside the map loaded around `base`.
    #[must_use]
    pub fn local_y(self, base: Self) -> i32 {
        i32::from(self.y) - 8 * (i32::from(base.region_y()) - 6)
    }

    /// Returns true when this position is too close to the edge of the map
    /// loaded around `base` (or outside it) and the client needs a new base.
    #[must_use]
    pub fn needs_rebase(self, base: Self) -> bool {
        let (lx, ly) = (self.local_x(base), self.local_y(base));
        let range = REBASE_MARGIN..LOADED_AREA_SIZE - REBASE_MARGIN;
        !range.contains(&lx) || !range.contains(&ly)
    }

    /// Signed `(dx, dy)` from `self` to `other`.
    #[inline]
    #[must_use]
    pub fn delta_to(self, other: Self) -> (i32, i32) {
        (
            i32::from(other.x) - i32::from(self.x),
            i32::from(other.y) - i32::from(self.y),
        )
    }

    /// Returns true when `other` is on the same plane and within `distance`
    /// tiles on both axes.
    ///
    /// The accepted window is `-distance - 1 ..= distance`, which for the
    /// maximum distance of 15 is exactly the 5-bit signed range `-16..=15`.
    #[must_use]
    pub fn is_viewable_from(self, other: Self, distance: u8) -> bool {
        if self.plane != other.plane {
            return false;
        }
        let distance = i32::from(distance.min(crate::constants::MAX_VIEW_DISTANCE));
        let (dx, dy) = self.delta_to(other);
        let window = -distance - 1..=distance;
        window.contains(&dx) && window.contains(&dy)
    }

    /// Returns the position one step in `direction`, saturating at the map
    /// bounds.
    #[must_use]
    pub fn translate(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: offset(self.x, dx),
            y: offset(self.y, dy),
            plane: self.plane,
        }
    }
}

fn offset(value: u16, delta: i32) -> u16 {
    let moved = (i32::from(value) + delta).clamp(0, i32::from(u16::MAX));
    u16::try_from(moved).unwrap_or(value)
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.plane)
    }
}
