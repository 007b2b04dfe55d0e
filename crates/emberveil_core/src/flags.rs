//! # Dirty Flags
//!
//! One bit per aspect of an entity that changed since the last tick. These
//! are internal bits; the wire mask each flag maps to depends on the packet
//! (player and NPC blocks assign different bits) and lives with the encoders.

use bitflags::bitflags;

bitflags! {
    /// Aspects of an entity that must be serialized this tick.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct UpdateFlags: u16 {
        /// A graphic (spot animation) started.
        const GRAPHICS        = 1 << 0;
        /// An animation started.
        const ANIMATION       = 1 << 1;
        /// Forced overhead text was set.
        const FORCED_CHAT     = 1 << 2;
        /// The entity spoke in public chat.
        const CHAT            = 1 << 3;
        /// The appearance block changed.
        const APPEARANCE      = 1 << 4;
        /// The entity turned to face another entity.
        const FACE_ENTITY     = 1 << 5;
        /// The entity turned to face a tile.
        const FACE_COORDINATE = 1 << 6;
        /// First hit splat of the tick.
        const HIT             = 1 << 7;
        /// Second hit splat of the tick.
        const HIT2            = 1 << 8;
    }
}
