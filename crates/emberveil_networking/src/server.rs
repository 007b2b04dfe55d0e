//! # Sync Server
//!
//! Owns the world, the observer views and the coordinator, and runs the
//! update cycle on the tick thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  WorldCommand   ┌──────────────────────────┐  OutboundPacket  ┌────────────┐
//! │ I/O threads│ ──────────────▶ │ SyncServer::tick          │ ───────────────▶ │ I/O threads│
//! │ (sessions) │  bounded queue  │ 1. drain commands         │  bounded queue   │ (flush)    │
//! └─────┬──────┘                 │ 2. UpdateCoordinator      │  try_send        └────────────┘
//!       │ connect / disconnect   └────────────┬─────────────┘
//!       ▼                                     │ read
//! ┌───────────────────────────────────────────▼──┐
//! │ SharedConnections (parking_lot RwLock)        │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Gameplay changes from other threads are queued and applied only at the
//! start of a tick, so the world never changes while packets are built.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use emberveil_core::{
    Animation, ChatMessage, ConnectionId, EntityId, Graphic, HitType, PlayerDetails,
    WorldRegistry,
};
use emberveil_shared::{Direction, Position};
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::connection::{ConnectionState, ConnectionTable, SharedConnections};
use crate::coordinator::{ObserverViews, TickReport, UpdateCoordinator};
use crate::error::{SyncError, SyncResult};

/// A finished update packet for one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundPacket {
    /// Target session.
    pub connection: ConnectionId,
    /// Packet opcode (81 or 65).
    pub opcode: u8,
    /// Complete frame: opcode, length and payload.
    pub bytes: Vec<u8>,
}

/// Where finished packets go. Sending never blocks the tick.
pub trait PacketSink {
    /// Hands a packet to the send path.
    fn send(&mut self, packet: OutboundPacket);
}

impl PacketSink for Sender<OutboundPacket> {
    fn send(&mut self, packet: OutboundPacket) {
        match self.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(packet)) => {
                warn!(connection = ?packet.connection, opcode = packet.opcode, "outbound queue full, packet dropped");
            }
            Err(TrySendError::Disconnected(packet)) => {
                warn!(connection = ?packet.connection, opcode = packet.opcode, "outbound queue closed, packet dropped");
            }
        }
    }
}

impl PacketSink for Vec<OutboundPacket> {
    fn send(&mut self, packet: OutboundPacket) {
        self.push(packet);
    }
}

/// A world change requested outside the tick thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorldCommand {
    /// A session finished logging in; spawn its player.
    Login {
        /// Session registered in the connection table.
        connection: ConnectionId,
        /// Display name.
        username: String,
        /// Spawn tile.
        position: Position,
    },
    /// The player left; despawn it and forget the session.
    Logout {
        /// Session of the player.
        connection: ConnectionId,
    },
    /// The session dropped. The player stays until logout.
    Disconnect {
        /// Session that dropped.
        connection: ConnectionId,
    },
    /// Spawn an NPC.
    SpawnNpc {
        /// NPC definition id.
        definition_id: u16,
        /// Spawn tile.
        position: Position,
        /// Maximum hitpoints.
        hitpoints: u16,
    },
    /// Despawn an NPC.
    DespawnNpc {
        /// The NPC.
        npc: EntityId,
    },
    /// One step.
    Walk {
        /// Moving entity.
        entity: EntityId,
        /// Step direction.
        direction: Direction,
    },
    /// Two steps.
    Run {
        /// Moving entity.
        entity: EntityId,
        /// First step.
        first: Direction,
        /// Second step.
        second: Direction,
    },
    /// Instant move.
    Teleport {
        /// Moving entity.
        entity: EntityId,
        /// Destination.
        to: Position,
    },
    /// Play an animation.
    Animate {
        /// Animating entity.
        entity: EntityId,
        /// The animation.
        animation: Animation,
    },
    /// Play a graphic.
    Graphic {
        /// Target entity.
        entity: EntityId,
        /// The graphic.
        graphic: Graphic,
    },
    /// Public chat.
    Say {
        /// Speaking player.
        player: EntityId,
        /// Packed message.
        message: ChatMessage,
    },
    /// Overhead text.
    ForceChat {
        /// Speaking entity.
        entity: EntityId,
        /// Text.
        text: String,
    },
    /// Turn towards another entity.
    FaceEntity {
        /// Turning entity.
        entity: EntityId,
        /// Faced entity.
        target: EntityId,
    },
    /// Turn towards a tile.
    FaceCoordinate {
        /// Turning entity.
        entity: EntityId,
        /// Faced tile.
        target: Position,
    },
    /// Damage from the combat engine.
    Hit {
        /// Target entity.
        entity: EntityId,
        /// Requested damage.
        damage: u16,
        /// Splat kind.
        kind: HitType,
    },
    /// Resend the appearance block.
    RefreshAppearance {
        /// The player.
        player: EntityId,
    },
    /// Stop or resume receiving another player's public chat.
    Mute {
        /// The player doing the muting.
        player: EntityId,
        /// The speaker.
        speaker: EntityId,
        /// Mute (true) or unmute (false).
        muted: bool,
    },
}

/// The entity synchronization server.
pub struct SyncServer {
    world: WorldRegistry,
    views: ObserverViews,
    connections: SharedConnections,
    coordinator: UpdateCoordinator,
    command_tx: Sender<WorldCommand>,
    command_rx: Receiver<WorldCommand>,
    outbound_tx: Sender<OutboundPacket>,
    outbound_rx: Receiver<OutboundPacket>,
    deaths: Vec<EntityId>,
    last_report: TickReport,
}

impl SyncServer {
    /// Creates a server from a validated configuration.
    ///
    /// # Errors
    ///
    /// [`emberveil_core::WorldError::CapacityTooLarge`] for registry capacities the wire
    /// cannot address.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let (command_tx, command_rx) = bounded(config.command_queue_capacity);
        let (outbound_tx, outbound_rx) = bounded(config.outbound_queue_capacity);
        Ok(Self {
            world: WorldRegistry::new(config.player_capacity, config.npc_capacity)?,
            views: ObserverViews::new(),
            connections: ConnectionTable::shared(),
            coordinator: UpdateCoordinator::new(config),
            command_tx,
            command_rx,
            outbound_tx,
            outbound_rx,
            deaths: Vec::new(),
            last_report: TickReport::default(),
        })
    }

    /// Replaces the coordinator (to install item definitions).
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: UpdateCoordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// Queue for I/O threads to submit world commands.
    #[must_use]
    pub fn command_sender(&self) -> Sender<WorldCommand> {
        self.command_tx.clone()
    }

    /// Queue of finished packets for the I/O threads to flush.
    #[must_use]
    pub fn outbound(&self) -> Receiver<OutboundPacket> {
        self.outbound_rx.clone()
    }

    /// The connection table, shared with I/O threads.
    #[must_use]
    pub fn connections(&self) -> SharedConnections {
        SharedConnections::clone(&self.connections)
    }

    /// Entities that died during the last tick.
    #[must_use]
    pub fn deaths(&self) -> &[EntityId] {
        &self.deaths
    }

    /// The world model. Tick thread only.
    #[inline]
    #[must_use]
    pub const fn world(&self) -> &WorldRegistry {
        &self.world
    }

    /// Mutable world model. Tick thread only, between ticks.
    #[inline]
    pub fn world_mut(&mut self) -> &mut WorldRegistry {
        &mut self.world
    }

    /// Observer views by session.
    #[inline]
    #[must_use]
    pub const fn views(&self) -> &ObserverViews {
        &self.views
    }

    /// Report of the last tick.
    #[inline]
    #[must_use]
    pub const fn last_report(&self) -> TickReport {
        self.last_report
    }

    /// Runs one tick: applies queued commands, then builds and sends every
    /// observer's packets.
    pub fn tick(&mut self) -> TickReport {
        while let Ok(command) = self.command_rx.try_recv() {
            if let Err(error) = self.apply(command) {
                warn!(error = %error, "world command rejected");
            }
        }

        self.deaths.clear();
        let connections = self.connections.read();
        self.last_report = self.coordinator.run_tick(
            &mut self.world,
            &mut self.views,
            &connections,
            &mut self.outbound_tx,
            &mut self.deaths,
        );
        self.last_report
    }

    /// Applies one command immediately. Tick thread only, between ticks.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownConnection`] for logins and logouts of sessions
    /// the connection table does not know, otherwise whatever the world
    /// model rejects.
    pub fn apply(&mut self, command: WorldCommand) -> SyncResult<()> {
        match command {
            WorldCommand::Login {
                connection,
                username,
                position,
            } => self.login(connection, username, position)?,
            WorldCommand::Logout { connection } => self.logout(connection)?,
            WorldCommand::Disconnect { connection } => {
                self.connections
                    .write()
                    .set_state(connection, ConnectionState::Disconnected);
                self.views.remove(&connection);
                info!(?connection, "session disconnected");
            }
            WorldCommand::SpawnNpc {
                definition_id,
                position,
                hitpoints,
            } => {
                self.world.register_npc(definition_id, position, hitpoints)?;
            }
            WorldCommand::DespawnNpc { npc } => {
                self.world.deregister(npc)?;
            }
            WorldCommand::Walk { entity, direction } => self.world.entity_mut(entity)?.walk(direction),
            WorldCommand::Run {
                entity,
                first,
                second,
            } => self.world.entity_mut(entity)?.run(first, second),
            WorldCommand::Teleport { entity, to } => self.world.entity_mut(entity)?.teleport(to),
            WorldCommand::Animate { entity, animation } => {
                self.world.entity_mut(entity)?.play_animation(animation);
            }
            WorldCommand::Graphic { entity, graphic } => {
                self.world.entity_mut(entity)?.play_graphic(graphic);
            }
            WorldCommand::Say { player, message } => self.world.entity_mut(player)?.say(message)?,
            WorldCommand::ForceChat { entity, text } => {
                self.world.entity_mut(entity)?.force_chat(text)?;
            }
            WorldCommand::FaceEntity { entity, target } => {
                self.world.entity_mut(entity)?.face_entity(target);
            }
            WorldCommand::FaceCoordinate { entity, target } => {
                self.world.entity_mut(entity)?.face_coordinate(target);
            }
            WorldCommand::Hit {
                entity,
                damage,
                kind,
            } => self.world.entity_mut(entity)?.queue_hit(damage, kind)?,
            WorldCommand::RefreshAppearance { player } => {
                self.world.entity_mut(player)?.refresh_appearance()?;
            }
            WorldCommand::Mute {
                player,
                speaker,
                muted,
            } => self.world.entity_mut(player)?.set_muted(speaker, muted)?,
        }
        Ok(())
    }

    fn login(&mut self, connection: ConnectionId, username: String, position: Position) -> SyncResult<()> {
        let mut connections = self.connections.write();
        if connections.get(connection).is_none() {
            return Err(SyncError::UnknownConnection(connection));
        }
        let id = self
            .world
            .register_player(PlayerDetails::new(username.as_str(), connection), position)?;
        connections.bind_player(connection, id);
        connections.set_state(connection, ConnectionState::Connected);
        info!(?connection, player = ?id, %username, "player logged in");
        Ok(())
    }

    fn logout(&mut self, connection: ConnectionId) -> SyncResult<()> {
        let entry = self.connections.write().remove(connection);
        self.views.remove(&connection);
        let player = entry
            .and_then(|entry| entry.player)
            .ok_or(SyncError::UnknownConnection(connection))?;
        self.world.deregister(player)?;
        info!(?connection, ?player, "player logged out");
        Ok(())
    }
}
