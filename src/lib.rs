//! # EMBERVEIL
//!
//! Entity synchronization for the EMBERVEIL game server.
//!
//! | Crate | Role |
//! |-------|------|
//! | [`shared`] | wire constants, directions, positions, name hashing |
//! | [`world`] | world registry, entities, dirty flags, hits |
//! | [`networking`] | packet buffer, sectors, attribute blocks, visibility, tick |

#![deny(unsafe_code)]

pub use emberveil_core as world;
pub use emberveil_networking as networking;
pub use emberveil_shared as shared;
