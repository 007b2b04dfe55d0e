//! # Update Cycle Coordinator
//!
//! Builds one player packet (opcode 81) and one NPC packet (opcode 65) per
//! connected observer, once per tick.
//!
//! ## Tick order
//!
//! ```text
//! 1. cache.begin_tick        stale blocks can never cross a tick
//! 2. world.resolve_hits      damage and deaths applied exactly once
//! 3. region rebase pre-pass  observers near the edge of their map
//! 4. per observer            player packet, then NPC packet
//! 5. world.finish_tick       flags, payloads and steps cleared
//! ```
//!
//! ## Player packet layout
//!
//! ```text
//! [81][len u16]
//! bits:  own sector | count(8) | known sectors | add records | 2047(11)?
//! bytes: attribute blocks, in visiting order
//! ```
//!
//! The terminator is only written when attribute blocks follow. An observer
//! whose packet fails is logged and skipped; its view is left untouched and
//! nothing reaches the sink for it.

use std::collections::{BTreeMap, HashSet};

use emberveil_core::{
    ConnectionId, DeathPipeline, Entity, EntityId, EntityKind, ItemDefinitions, PlainItems,
    WorldRegistry,
};
use emberveil_shared::constants::{
    NPC_INDEX_BITS, NPC_LIST_TERMINATOR, NPC_UPDATE_OPCODE, PLAYER_INDEX_BITS,
    PLAYER_LIST_TERMINATOR, PLAYER_UPDATE_OPCODE,
};
use tracing::{debug, trace, warn};

use crate::attributes::{has_attributes, AttributeBlockBuilder, AttributeCache, BlockContext};
use crate::buffer::PacketBuffer;
use crate::config::SyncConfig;
use crate::connection::ConnectionTable;
use crate::error::SyncResult;
use crate::movement::{encode_sector, placement_sector, select_sector};
use crate::server::{OutboundPacket, PacketSink};
use crate::visibility::{ListUpdate, ObserverView, TrackerEnv, VisibilityTracker};

/// Per-connection observer views.
pub type ObserverViews = BTreeMap<ConnectionId, ObserverView>;

/// Summary of one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number.
    pub tick: u64,
    /// Observers that had a bound, live player.
    pub observers: usize,
    /// Packets handed to the sink.
    pub packets_sent: usize,
    /// Packets abandoned because encoding failed.
    pub failures: usize,
    /// Bytes handed to the sink.
    pub bytes: usize,
    /// Entities that died this tick.
    pub deaths: usize,
    /// Attribute cache hits.
    pub cache_hits: u64,
    /// Attribute cache misses.
    pub cache_misses: u64,
}

impl TickReport {
    /// Fraction of cacheable lookups served from the cache.
    #[must_use]
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }
}

/// Owns the reusable buffers and the per-tick attribute cache.
pub struct UpdateCoordinator {
    sync_npcs: bool,
    tracker: VisibilityTracker,
    builder: AttributeBlockBuilder,
    cache: AttributeCache,
    packet: PacketBuffer,
    tail: PacketBuffer,
    items: Box<dyn ItemDefinitions + Send + Sync>,
    tick: u64,
}

impl UpdateCoordinator {
    /// Creates a coordinator from a validated configuration.
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            sync_npcs: config.sync_npcs,
            tracker: VisibilityTracker::new(
                config.view_distance,
                config.max_local_entities,
                config.max_admissions_per_tick,
            ),
            builder: AttributeBlockBuilder::new(config.packet_capacity),
            cache: AttributeCache::new(),
            packet: PacketBuffer::new(config.packet_capacity),
            tail: PacketBuffer::new(config.packet_capacity),
            items: Box::new(PlainItems),
            tick: 0,
        }
    }

    /// Replaces the item definitions used for appearance blocks.
    #[must_use]
    pub fn with_items(mut self, items: impl ItemDefinitions + Send + Sync + 'static) -> Self {
        self.items = Box::new(items);
        self
    }

    /// Ticks run so far.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Attribute cache of the current tick.
    #[inline]
    #[must_use]
    pub const fn cache(&self) -> &AttributeCache {
        &self.cache
    }

    /// Runs one complete update cycle.
    pub fn run_tick(
        &mut self,
        world: &mut WorldRegistry,
        views: &mut ObserverViews,
        connections: &ConnectionTable,
        sink: &mut dyn PacketSink,
        deaths: &mut dyn DeathPipeline,
    ) -> TickReport {
        self.tick += 1;
        self.cache.begin_tick(self.tick);
        let mut report = TickReport {
            tick: self.tick,
            deaths: world.resolve_hits(deaths),
            ..TickReport::default()
        };

        views.retain(|connection, _| connections.get(*connection).is_some());
        let observers: Vec<(ConnectionId, EntityId)> = connections.observers().collect();
        let rebased = rebase_regions(world, &observers);

        let shared: &WorldRegistry = world;
        for (connection, owner) in observers {
            let Some(observer) = shared.get(owner) else {
                trace!(?connection, observer = ?owner, "observer entity gone");
                continue;
            };
            report.observers += 1;

            let view = views
                .entry(connection)
                .or_insert_with(|| ObserverView::new(owner));
            if view.owner() != owner {
                *view = ObserverView::new(owner);
            }
            view.begin_tick();

            let placement = rebased.contains(&owner);
            let result = self.build_player_packet(shared, connections, observer, view, placement);
            self.deliver(connection, PLAYER_UPDATE_OPCODE, result, view, sink, &mut report);

            if self.sync_npcs {
                let result = self.build_npc_packet(shared, connections, observer, view);
                self.deliver(connection, NPC_UPDATE_OPCODE, result, view, sink, &mut report);
            }
        }

        report.cache_hits = self.cache.hits();
        report.cache_misses = self.cache.misses();
        world.finish_tick();
        report
    }

    fn deliver(
        &self,
        connection: ConnectionId,
        opcode: u8,
        result: SyncResult<(Vec<u8>, ListUpdate)>,
        view: &mut ObserverView,
        sink: &mut dyn PacketSink,
        report: &mut TickReport,
    ) {
        let kind = if opcode == PLAYER_UPDATE_OPCODE {
            EntityKind::Player
        } else {
            EntityKind::Npc
        };
        match result {
            Ok((bytes, update)) => {
                debug!(
                    observer = ?view.owner(),
                    opcode,
                    len = bytes.len(),
                    local = update.list.len(),
                    admitted = update.admitted,
                    removed = update.removed,
                    "update packet built"
                );
                report.packets_sent += 1;
                report.bytes += bytes.len();
                view.commit(kind, update);
                sink.send(OutboundPacket {
                    connection,
                    opcode,
                    bytes,
                });
            }
            Err(error) => {
                report.failures += 1;
                warn!(observer = ?view.owner(), opcode, tick = self.tick, error = %error, "update packet abandoned");
            }
        }
    }

    fn build_player_packet(
        &mut self,
        world: &WorldRegistry,
        connections: &ConnectionTable,
        observer: &Entity,
        view: &ObserverView,
        force_placement: bool,
    ) -> SyncResult<(Vec<u8>, ListUpdate)> {
        let Self {
            tracker,
            builder,
            cache,
            packet,
            tail,
            items,
            ..
        } = self;
        packet.clear();
        tail.clear();

        packet.begin_var_short(PLAYER_UPDATE_OPCODE)?;
        packet.start_bit_access()?;

        let own_sector = if force_placement {
            placement_sector(observer, true)?
        } else {
            select_sector(observer, true)?
        };
        let own_pending = has_attributes(observer, BlockContext::OWN);
        encode_sector(packet, own_sector, own_pending)?;
        if own_pending {
            builder.append(tail, observer, BlockContext::OWN, cache, &**items)?;
        }

        let mut env = TrackerEnv {
            world,
            connections,
            builder,
            cache,
            items: &**items,
        };
        let update = tracker.update_list(
            packet,
            tail,
            observer,
            view.players(),
            EntityKind::Player,
            &mut env,
        )?;

        close_packet(packet, tail, PLAYER_INDEX_BITS, PLAYER_LIST_TERMINATOR)?;
        Ok((packet.as_slice().to_vec(), update))
    }

    fn build_npc_packet(
        &mut self,
        world: &WorldRegistry,
        connections: &ConnectionTable,
        observer: &Entity,
        view: &ObserverView,
    ) -> SyncResult<(Vec<u8>, ListUpdate)> {
        let Self {
            tracker,
            builder,
            cache,
            packet,
            tail,
            items,
            ..
        } = self;
        packet.clear();
        tail.clear();

        packet.begin_var_short(NPC_UPDATE_OPCODE)?;
        packet.start_bit_access()?;

        let mut env = TrackerEnv {
            world,
            connections,
            builder,
            cache,
            items: &**items,
        };
        let update =
            tracker.update_list(packet, tail, observer, view.npcs(), EntityKind::Npc, &mut env)?;

        close_packet(packet, tail, NPC_INDEX_BITS, NPC_LIST_TERMINATOR)?;
        Ok((packet.as_slice().to_vec(), update))
    }
}

/// Writes the terminator if blocks follow, leaves bit mode, appends the
/// blocks and patches the frame length.
fn close_packet(
    packet: &mut PacketBuffer,
    tail: &PacketBuffer,
    index_bits: u32,
    terminator: u32,
) -> SyncResult<()> {
    if !tail.is_empty() {
        packet.write_bits(index_bits, terminator)?;
    }
    packet.finish_bit_access()?;
    packet.write_bytes(tail.as_slice())?;
    packet.end_var_short()?;
    Ok(())
}

/// Moves the region base of observers that walked too close to the edge of
/// their loaded map. Returns the observers whose own sector must be a
/// placement this tick.
fn rebase_regions(world: &mut WorldRegistry, observers: &[(ConnectionId, EntityId)]) -> HashSet<EntityId> {
    let mut rebased = HashSet::new();
    for &(_, owner) in observers {
        let Some(entity) = world.get_mut(owner) else {
            continue;
        };
        if entity.position().needs_rebase(entity.region_base()) {
            let base = entity.position();
            entity.set_region_base(base);
            rebased.insert(owner);
            trace!(observer = ?owner, x = base.x, y = base.y, "region rebased");
        }
    }
    rebased
}
