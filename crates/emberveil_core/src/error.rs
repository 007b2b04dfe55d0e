//! # World Error Types
//!
//! All errors that can occur while mutating the world model.

use thiserror::Error;

use crate::entity::{EntityId, EntityKind};

/// Errors that can occur in the world model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// Every slot of a registry is occupied.
    #[error("{kind:?} registry full: capacity {capacity}")]
    RegistryFull {
        /// Which registry.
        kind: EntityKind,
        /// Its capacity.
        capacity: usize,
    },

    /// A registry was configured larger than its slot width allows.
    #[error("{kind:?} capacity {requested} exceeds the wire limit of {max}")]
    CapacityTooLarge {
        /// Which registry.
        kind: EntityKind,
        /// Requested capacity.
        requested: usize,
        /// Largest capacity the slot width can address.
        max: usize,
    },

    /// The handle does not name a live entity (never registered, or stale).
    #[error("unknown or stale entity {0:?}")]
    UnknownEntity(EntityId),

    /// Both hit slots of the entity are already used this tick.
    #[error("entity {0:?} already has two hits queued this tick")]
    HitSlotsFull(EntityId),

    /// Public chat longer than its one-byte length field.
    #[error("chat from {entity:?} is {length} bytes, limit {max}")]
    ChatTooLong {
        /// Speaker.
        entity: EntityId,
        /// Length of the rejected message.
        length: usize,
        /// Longest accepted message.
        max: usize,
    },

    /// Forced chat containing the string terminator.
    #[error("forced chat for {0:?} contains a line break")]
    LineBreakInText(EntityId),

    /// Hitpoints above what a hit splat can carry.
    #[error("hitpoints {requested} exceed the limit of {max}")]
    HitpointsTooLarge {
        /// Rejected value.
        requested: u16,
        /// Largest accepted value.
        max: u16,
    },

    /// A player-only operation was applied to an NPC.
    #[error("entity {0:?} is not a player")]
    NotAPlayer(EntityId),
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
