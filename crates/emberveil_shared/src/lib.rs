//! # EMBERVEIL Shared
//!
//! Vocabulary shared by every layer of the entity update protocol.
//!
//! ## CRITICAL RULE
//!
//! Everything in this crate is baked into the client. Changing a constant,
//! a direction id or the name hash alphabet breaks every connected client.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod direction;
pub mod name;
pub mod position;

pub use constants::{
    MAX_ADMISSIONS_PER_TICK, MAX_LOCAL_ENTITIES, NPC_UPDATE_OPCODE, PLAYER_UPDATE_OPCODE,
};
pub use direction::Direction;
pub use name::name_hash;
pub use position::Position;
