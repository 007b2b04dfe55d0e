//! # Movement Steps
//!
//! What the movement queue collaborator hands over once per tick: up to two
//! step directions, plus the placement (teleport) and queue-reset bits.

use emberveil_shared::Direction;

/// One entity's movement for the current tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovementStep {
    /// First step, if the entity moved.
    pub primary: Option<Direction>,
    /// Second step, if the entity ran.
    pub secondary: Option<Direction>,
    /// The entity was placed (teleported) and must be re-placed absolutely.
    pub needs_placement: bool,
    /// The client should discard its interpolation queue for this entity.
    pub reset_queue: bool,
}

impl MovementStep {
    /// A single walking step.
    #[must_use]
    pub const fn walk(direction: Direction) -> Self {
        Self {
            primary: Some(direction),
            secondary: None,
            needs_placement: false,
            reset_queue: false,
        }
    }

    /// A two-step run.
    #[must_use]
    pub const fn run(first: Direction, second: Direction) -> Self {
        Self {
            primary: Some(first),
            secondary: Some(second),
            needs_placement: false,
            reset_queue: false,
        }
    }

    /// An absolute placement.
    #[must_use]
    pub const fn placement(reset_queue: bool) -> Self {
        Self {
            primary: None,
            secondary: None,
            needs_placement: true,
            reset_queue,
        }
    }

    /// Returns true when nothing moved.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.primary.is_none() && !self.needs_placement
    }
}
