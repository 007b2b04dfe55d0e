//! # Connection Table
//!
//! Session state for every client, keyed by [`ConnectionId`].
//!
//! ## Design
//!
//! - Players hold a `ConnectionId`, never the session itself
//! - I/O threads connect, disconnect and time out sessions through a shared
//!   [`SharedConnections`] lock; the tick thread only reads
//! - Only [`ConnectionState::Connected`] sessions are synchronized. Anything
//!   else is skipped as an observer and lazily dropped from other observers'
//!   local lists

use std::collections::BTreeMap;
use std::sync::Arc;

use emberveil_core::{ConnectionId, EntityId};
use parking_lot::RwLock;

/// Connection table shared between I/O threads and the tick thread.
pub type SharedConnections = Arc<RwLock<ConnectionTable>>;

/// State of a client connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Gone, or never seen.
    #[default]
    Disconnected = 0,
    /// Handshake in progress.
    Connecting = 1,
    /// Logged in and receiving updates.
    Connected = 2,
    /// Stopped answering, pending cleanup.
    TimedOut = 3,
}

impl ConnectionState {
    /// Returns true when entities of this session take part in sync.
    #[inline]
    #[must_use]
    pub const fn is_synchronizable(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// One session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionEntry {
    /// Session id.
    pub id: ConnectionId,
    /// Lifecycle state.
    pub state: ConnectionState,
    /// Player entity bound to this session after login.
    pub player: Option<EntityId>,
}

/// Every known session.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    entries: BTreeMap<ConnectionId, ConnectionEntry>,
    next_id: u32,
}

impl ConnectionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new table for sharing with I/O threads.
    #[must_use]
    pub fn shared() -> SharedConnections {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Allocates a session in the `Connecting` state.
    pub fn register(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        if self.next_id == ConnectionId::NULL.0 {
            self.next_id = 0;
        }
        self.entries.insert(
            id,
            ConnectionEntry {
                id,
                state: ConnectionState::Connecting,
                player: None,
            },
        );
        id
    }

    /// Changes the state of a session. Returns false for unknown ids.
    pub fn set_state(&mut self, id: ConnectionId, state: ConnectionState) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    /// Binds the player entity that logged in on this session.
    pub fn bind_player(&mut self, id: ConnectionId, player: EntityId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.player = Some(player);
                true
            }
            None => false,
        }
    }

    /// Forgets a session.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionEntry> {
        self.entries.remove(&id)
    }

    /// State of a session; unknown ids are `Disconnected`.
    #[must_use]
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        self.entries
            .get(&id)
            .map_or(ConnectionState::Disconnected, |entry| entry.state)
    }

    /// Returns true when the session is `Connected`.
    #[inline]
    #[must_use]
    pub fn is_synchronizable(&self, id: ConnectionId) -> bool {
        self.state(id).is_synchronizable()
    }

    /// Session details.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionEntry> {
        self.entries.get(&id)
    }

    /// All sessions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ConnectionEntry> {
        self.entries.values()
    }

    /// Synchronizable sessions with a bound player, in id order.
    pub fn observers(&self) -> impl Iterator<Item = (ConnectionId, EntityId)> + '_ {
        self.entries
            .values()
            .filter(|entry| entry.state.is_synchronizable())
            .filter_map(|entry| entry.player.map(|player| (entry.id, player)))
    }

    /// Number of sessions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there are no sessions.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
