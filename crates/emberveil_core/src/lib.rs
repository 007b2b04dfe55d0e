//! # EMBERVEIL Core
//!
//! The world model the entity update protocol synchronizes.
//!
//! ## Architecture Rules
//!
//! 1. **Slots, not pointers** - entities live in fixed-capacity registries and
//!    are referenced by generation-checked [`EntityId`] handles
//! 2. **Setters raise flags** - gameplay never touches bytes; every change goes
//!    through a setter that stores a payload and raises a dirty flag
//! 3. **Resolve once** - hits are applied to hitpoints exactly once per tick,
//!    before any observer's packet is encoded
//!
//! ## Example
//!
//! ```rust,ignore
//! use emberveil_core::{PlayerDetails, WorldRegistry};
//!
//! let mut world = WorldRegistry::new(2000, 8192)?;
//! let id = world.register_player(PlayerDetails::new("alice", connection), spawn)?;
//! world.get_mut(id)?.play_animation(Animation::new(866, 0));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod appearance;
pub mod collaborators;
pub mod entity;
pub mod error;
pub mod flags;
pub mod movement;
pub mod registry;
pub mod session;
pub mod updates;

pub use appearance::{Appearance, BodyPart, Equipment, EquipmentSlot, Gender};
pub use collaborators::{DeathPipeline, ItemDefinitions, PlainItems};
pub use entity::{Entity, EntityDetails, EntityId, EntityKind, Hitpoints, NpcDetails, PlayerDetails};
pub use error::{WorldError, WorldResult};
pub use flags::UpdateFlags;
pub use movement::MovementStep;
pub use registry::{Registry, WorldRegistry};
pub use session::ConnectionId;
pub use updates::{Animation, ChatMessage, Graphic, Hit, HitType, PendingUpdates, ResolvedHit};
