//! # EMBERVEIL Networking - The Update Protocol
//!
//! Every tick, every connected client is told how every nearby player and
//! NPC moved and changed, in the bit-packed format the client expects.
//!
//! ## Architecture
//!
//! - **Buffer**: bit/byte packet writer with value transforms, byte orders
//!   and var-short framing, plus the matching reader
//! - **Movement**: one sector per entity per tick (no move, walk, run,
//!   placement or removal)
//! - **Attributes**: dirty-flag driven blocks from fixed-order field tables,
//!   shared between observers through a per-tick cache
//! - **Visibility**: bounded local lists with per-tick admission caps
//! - **Coordinator**: one isolated packet per observer per list kind
//! - **Server**: queued world commands applied at tick boundaries
//!
//! ## Packet Shape
//!
//! ```text
//! [opcode][length u16]
//! ├─ bit region:  own sector, local count, known sectors, add records, terminator
//! └─ byte region: attribute blocks in the order entities were visited
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use emberveil_networking::{SyncConfig, SyncServer, WorldCommand};
//!
//! let mut server = SyncServer::new(&SyncConfig::default())?;
//! let connection = server.connections().write().register();
//! server.command_sender().send(WorldCommand::Login { connection, username, position })?;
//! let report = server.tick();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod attributes;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod movement;
pub mod reader;
pub mod server;
pub mod tick;
pub mod visibility;

pub use attributes::{AttributeBlockBuilder, AttributeCache, BlockContext};
pub use buffer::{ByteOrder, PacketBuffer, Transform};
pub use config::SyncConfig;
pub use connection::{ConnectionEntry, ConnectionState, ConnectionTable, SharedConnections};
pub use coordinator::{ObserverViews, TickReport, UpdateCoordinator};
pub use error::{ConfigError, DecodeError, EncodeError, SyncError, SyncResult};
pub use movement::Sector;
pub use reader::PacketReader;
pub use server::{OutboundPacket, PacketSink, SyncServer, WorldCommand};
pub use tick::{TickLoop, TickStats};
pub use visibility::{LocalList, ObserverView, VisibilityTracker};
