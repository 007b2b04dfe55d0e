//! # Visibility Tracking
//!
//! Every observer keeps two local lists (players and NPCs): the entities its
//! client currently knows about, in the order the client stores them.
//!
//! One pass over a list, per tick:
//!
//! 1. Each known entity gets either a removal sector (out of range, session
//!    no longer synchronizable, gone from the registry, or re-placed) or its
//!    movement sector plus an attribute block when something is pending.
//! 2. The registry is scanned in slot order for visible entities the client
//!    does not know yet. Each is admitted with an add record and a forced
//!    full attribute block, until the list holds the maximum number of
//!    entities or the per-tick admission cap is reached.
//!
//! Results go into a candidate list. The view keeps its old list until the
//! caller commits the candidate after the whole packet was encoded, so a
//! failed packet never leaves the view ahead of what the client received.

use std::collections::HashSet;

use emberveil_core::{Entity, EntityId, EntityKind, ItemDefinitions, WorldRegistry};
use emberveil_shared::constants::{
    MAX_LOCAL_ENTITIES, MAX_VIEW_DISTANCE, NPC_INDEX_BITS, PLAYER_INDEX_BITS,
};
use tracing::trace;

use crate::attributes::{has_attributes, AttributeBlockBuilder, AttributeCache, BlockContext};
use crate::buffer::PacketBuffer;
use crate::connection::ConnectionTable;
use crate::error::{EncodeError, EncodeResult};
use crate::movement::{encode_sector, select_sector, Sector};

/// Ordered set of entities one client knows about.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalList {
    entries: Vec<EntityId>,
    members: HashSet<EntityId>,
}

impl LocalList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Number of tracked entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is tracked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true when `id` is tracked.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    /// Tracked entities in client order.
    #[inline]
    #[must_use]
    pub fn ids(&self) -> &[EntityId] {
        &self.entries
    }

    fn push(&mut self, id: EntityId) {
        if self.members.insert(id) {
            self.entries.push(id);
        }
    }
}

/// What one observer's client knows.
#[derive(Clone, Debug)]
pub struct ObserverView {
    owner: EntityId,
    players: LocalList,
    npcs: LocalList,
    admitted_players: usize,
    admitted_npcs: usize,
}

impl ObserverView {
    /// Creates an empty view for the player `owner`.
    #[must_use]
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            players: LocalList::new(),
            npcs: LocalList::new(),
            admitted_players: 0,
            admitted_npcs: 0,
        }
    }

    /// The observing player.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> EntityId {
        self.owner
    }

    /// Known players.
    #[inline]
    #[must_use]
    pub const fn players(&self) -> &LocalList {
        &self.players
    }

    /// Known NPCs.
    #[inline]
    #[must_use]
    pub const fn npcs(&self) -> &LocalList {
        &self.npcs
    }

    /// Local list for `kind`.
    #[must_use]
    pub const fn list(&self, kind: EntityKind) -> &LocalList {
        match kind {
            EntityKind::Player => &self.players,
            EntityKind::Npc => &self.npcs,
        }
    }

    /// Entities of `kind` admitted during the current tick. Each list has
    /// its own admission cap, so this never exceeds the per-tick limit.
    #[inline]
    #[must_use]
    pub const fn admitted_this_tick(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Player => self.admitted_players,
            EntityKind::Npc => self.admitted_npcs,
        }
    }

    /// Resets the per-tick admission counters.
    pub fn begin_tick(&mut self) {
        self.admitted_players = 0;
        self.admitted_npcs = 0;
    }

    /// Replaces a local list with the outcome of a successfully sent packet.
    pub fn commit(&mut self, kind: EntityKind, update: ListUpdate) {
        match kind {
            EntityKind::Player => {
                self.admitted_players = update.admitted;
                self.players = update.list;
            }
            EntityKind::Npc => {
                self.admitted_npcs = update.admitted;
                self.npcs = update.list;
            }
        }
    }
}

/// Outcome of one pass over a local list.
#[derive(Clone, Debug, Default)]
pub struct ListUpdate {
    /// The list the client will hold once the packet arrives.
    pub list: LocalList,
    /// Entities removed this pass.
    pub removed: usize,
    /// Entities admitted this pass.
    pub admitted: usize,
}

/// Shared inputs of a visibility pass.
pub struct TrackerEnv<'a> {
    /// Every entity.
    pub world: &'a WorldRegistry,
    /// Session states.
    pub connections: &'a ConnectionTable,
    /// Attribute block builder.
    pub builder: &'a mut AttributeBlockBuilder,
    /// This tick's attribute cache.
    pub cache: &'a mut AttributeCache,
    /// Item content queries.
    pub items: &'a dyn ItemDefinitions,
}

/// Runs the per-list visibility pass with fixed caps.
#[derive(Clone, Copy, Debug)]
pub struct VisibilityTracker {
    view_distance: u8,
    max_local_entities: usize,
    max_admissions: usize,
}

impl VisibilityTracker {
    /// Creates a tracker. Caps above what the wire can carry are clamped.
    #[must_use]
    pub fn new(view_distance: u8, max_local_entities: usize, max_admissions: usize) -> Self {
        Self {
            view_distance: view_distance.min(MAX_VIEW_DISTANCE),
            max_local_entities: max_local_entities.min(MAX_LOCAL_ENTITIES),
            max_admissions: max_admissions.min(max_local_entities),
        }
    }

    /// View distance in tiles.
    #[inline]
    #[must_use]
    pub const fn view_distance(&self) -> u8 {
        self.view_distance
    }

    /// Returns true when `other` belongs in `observer`'s local list.
    #[must_use]
    pub fn is_visible(&self, observer: &Entity, other: &Entity, connections: &ConnectionTable) -> bool {
        other.id() != observer.id()
            && observer
                .position()
                .is_viewable_from(other.position(), self.view_distance)
            && is_synchronizable(other, connections)
    }

    /// Writes the entity count, every known entity's sector (with attribute
    /// blocks appended to `tail`) and the add records for `kind`.
    ///
    /// # Errors
    ///
    /// Any encoding error. The caller must then discard both buffers and the
    /// returned update is never produced, so the view stays unchanged.
    pub fn update_list(
        &self,
        packet: &mut PacketBuffer,
        tail: &mut PacketBuffer,
        observer: &Entity,
        known: &LocalList,
        kind: EntityKind,
        env: &mut TrackerEnv<'_>,
    ) -> EncodeResult<ListUpdate> {
        let mut update = ListUpdate {
            list: LocalList::with_capacity(known.len() + self.max_admissions),
            ..ListUpdate::default()
        };

        packet.write_bits(8, known.len() as u32)?;
        for &id in known.ids() {
            let Some(other) = env.world.get(id) else {
                encode_sector(packet, Sector::Removal, false)?;
                update.removed += 1;
                trace!(observer = ?observer.id(), entity = ?id, "stale entity removed");
                continue;
            };

            let sector = select_sector(other, false)?;
            if sector == Sector::Removal || !self.is_visible(observer, other, env.connections) {
                encode_sector(packet, Sector::Removal, false)?;
                update.removed += 1;
                trace!(observer = ?observer.id(), entity = ?id, "entity removed");
                continue;
            }

            let context = observed_context(observer, other);
            let pending = has_attributes(other, context);
            encode_sector(packet, sector, pending)?;
            if pending {
                env.builder
                    .append(tail, other, context, env.cache, env.items)?;
            }
            update.list.push(id);
        }

        for other in env.world.iter_kind(kind) {
            if update.admitted >= self.max_admissions
                || update.list.len() >= self.max_local_entities
            {
                break;
            }
            if update.list.contains(other.id()) || !self.is_visible(observer, other, env.connections) {
                continue;
            }

            let context = BlockContext {
                force_appearance: true,
                ..observed_context(observer, other)
            };
            let pending = has_attributes(other, context);
            write_add_record(packet, observer, other, pending)?;
            if pending {
                env.builder
                    .append(tail, other, context, env.cache, env.items)?;
            }
            update.list.push(other.id());
            update.admitted += 1;
            trace!(observer = ?observer.id(), entity = ?other.id(), "entity admitted");
        }

        Ok(update)
    }
}

/// Context for a third-party block: chat is left out if the observer muted
/// the speaker.
fn observed_context(observer: &Entity, other: &Entity) -> BlockContext {
    let muted = observer
        .as_player()
        .is_some_and(|details| details.is_muting(other.id()));
    BlockContext {
        suppress_chat: muted,
        ..BlockContext::OBSERVER
    }
}

/// NPCs always take part; players only while their session is connected.
#[must_use]
pub fn is_synchronizable(entity: &Entity, connections: &ConnectionTable) -> bool {
    entity
        .as_player()
        .map_or(true, |details| connections.is_synchronizable(details.connection))
}

fn write_add_record(
    packet: &mut PacketBuffer,
    observer: &Entity,
    other: &Entity,
    pending: bool,
) -> EncodeResult<()> {
    let (dx, dy) = observer.position().delta_to(other.position());
    let dx = delta("add record dx", dx)?;
    let dy = delta("add record dy", dy)?;
    let index = u32::from(other.id().index());

    match other.details() {
        emberveil_core::EntityDetails::Player(_) => {
            packet.write_bits(PLAYER_INDEX_BITS, index)?;
            packet.write_bit(pending)?;
            packet.write_bit(true)?;
            packet.write_bits(5, dy)?;
            packet.write_bits(5, dx)
        }
        emberveil_core::EntityDetails::Npc(npc) => {
            packet.write_bits(NPC_INDEX_BITS, index)?;
            packet.write_bits(5, dy)?;
            packet.write_bits(5, dx)?;
            packet.write_bit(true)?;
            packet.write_bits(12, u32::from(npc.definition_id))?;
            packet.write_bit(pending)
        }
    }
}

/// Two's complement of a 5-bit signed delta.
fn delta(field: &'static str, value: i32) -> EncodeResult<u32> {
    if !(-16..=15).contains(&value) {
        return Err(EncodeError::FieldOutOfRange {
            field,
            value: i64::from(value),
        });
    }
    Ok((value as u32) & 0x1F)
}
