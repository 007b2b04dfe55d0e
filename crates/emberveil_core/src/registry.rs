//! # World Registry
//!
//! Owns every entity. All memory is allocated when the registry is created;
//! registering and deregistering only flip slots.
//!
//! Slot indices are what the client sees, so a registry never hands out an
//! index its wire field cannot carry, and the lowest free slot is always
//! reused first.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use emberveil_shared::constants::{MAX_NPC_CAPACITY, MAX_PLAYER_CAPACITY};
use emberveil_shared::Position;
use tracing::{debug, trace};

use crate::collaborators::DeathPipeline;
use crate::entity::{
    check_hitpoints, Entity, EntityDetails, EntityId, EntityKind, Hitpoints, NpcDetails,
    PlayerDetails,
};
use crate::error::{WorldError, WorldResult};

/// Hitpoints a newly registered player starts with.
pub const DEFAULT_PLAYER_HITPOINTS: u16 = 10;

#[derive(Debug)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Fixed-capacity slot array for one entity kind.
#[derive(Debug)]
pub struct Registry {
    kind: EntityKind,
    slots: Box<[Slot]>,
    free: BinaryHeap<Reverse<u16>>,
    len: usize,
}

impl Registry {
    fn new(kind: EntityKind, capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                entity: None,
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let free = (0..capacity)
            .filter_map(|index| u16::try_from(index).ok())
            .map(Reverse)
            .collect();

        Self {
            kind,
            slots,
            free,
            len: 0,
        }
    }

    /// Entity kind stored here.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true when no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn insert(
        &mut self,
        details: EntityDetails,
        position: Position,
        hitpoints: Hitpoints,
    ) -> WorldResult<EntityId> {
        let Some(Reverse(index)) = self.free.pop() else {
            return Err(WorldError::RegistryFull {
                kind: self.kind,
                capacity: self.capacity(),
            });
        };
        let slot = &mut self.slots[usize::from(index)];
        let id = EntityId::new(self.kind, index, slot.generation);
        slot.entity = Some(Entity::new(id, details, position, hitpoints));
        self.len += 1;
        trace!(kind = ?self.kind, slot = index, "entity registered");
        Ok(id)
    }

    fn remove(&mut self, id: EntityId) -> WorldResult<Entity> {
        let slot = self
            .slots
            .get_mut(usize::from(id.index()))
            .filter(|slot| slot.generation == id.generation())
            .ok_or(WorldError::UnknownEntity(id))?;
        let entity = slot.entity.take().ok_or(WorldError::UnknownEntity(id))?;

        // Invalidate outstanding handles before the slot can be reused.
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(Reverse(id.index()));
        self.len -= 1;
        trace!(kind = ?self.kind, slot = id.index(), "entity deregistered");
        Ok(entity)
    }

    /// Live entity behind `id`; `None` for stale or foreign handles.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        if id.kind() != self.kind {
            return None;
        }
        self.slots
            .get(usize::from(id.index()))
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entity.as_ref())
    }

    /// Mutable access to the live entity behind `id`.
    #[must_use]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if id.kind() != self.kind {
            return None;
        }
        self.slots
            .get_mut(usize::from(id.index()))
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entity.as_mut())
    }

    /// Live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter_map(|slot| slot.entity.as_ref())
    }

    /// Live entities in slot order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.slots.iter_mut().filter_map(|slot| slot.entity.as_mut())
    }
}

/// Every player and NPC in the world.
///
/// Passed by reference into the update coordinator; there is no global
/// registry.
#[derive(Debug)]
pub struct WorldRegistry {
    players: Registry,
    npcs: Registry,
}

impl WorldRegistry {
    /// Creates a world with room for `player_capacity` players and
    /// `npc_capacity` NPCs.
    ///
    /// # Errors
    ///
    /// [`WorldError::CapacityTooLarge`] when a capacity would produce slot
    /// indices that collide with the list terminator of its packet.
    pub fn new(player_capacity: usize, npc_capacity: usize) -> WorldResult<Self> {
        check_capacity(EntityKind::Player, player_capacity, MAX_PLAYER_CAPACITY)?;
        check_capacity(EntityKind::Npc, npc_capacity, MAX_NPC_CAPACITY)?;
        debug!(player_capacity, npc_capacity, "world registry allocated");

        Ok(Self {
            players: Registry::new(EntityKind::Player, player_capacity),
            npcs: Registry::new(EntityKind::Npc, npc_capacity),
        })
    }

    /// Registers a player at `position` in the lowest free slot.
    ///
    /// # Errors
    ///
    /// [`WorldError::RegistryFull`] when every player slot is taken.
    pub fn register_player(
        &mut self,
        details: PlayerDetails,
        position: Position,
    ) -> WorldResult<EntityId> {
        self.players.insert(
            EntityDetails::Player(details),
            position,
            Hitpoints::full(DEFAULT_PLAYER_HITPOINTS),
        )
    }

    /// Registers an NPC at `position` in the lowest free slot.
    ///
    /// # Errors
    ///
    /// [`WorldError::RegistryFull`] when every NPC slot is taken,
    /// [`WorldError::HitpointsTooLarge`] above
    /// [`emberveil_shared::constants::MAX_HITPOINTS`].
    pub fn register_npc(
        &mut self,
        definition_id: u16,
        position: Position,
        hitpoints: u16,
    ) -> WorldResult<EntityId> {
        check_hitpoints(hitpoints)?;
        self.npcs.insert(
            EntityDetails::Npc(NpcDetails { definition_id }),
            position,
            Hitpoints::full(hitpoints),
        )
    }

    /// Removes an entity and frees its slot.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownEntity`] for stale or unknown handles.
    pub fn deregister(&mut self, id: EntityId) -> WorldResult<Entity> {
        self.registry_mut(id.kind()).remove(id)
    }

    /// Live entity behind `id`.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.registry(id.kind()).get(id)
    }

    /// Mutable access to the live entity behind `id`.
    #[inline]
    #[must_use]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.registry_mut(id.kind()).get_mut(id)
    }

    /// Like [`Self::get_mut`], but reports missing entities as an error.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownEntity`] for stale or unknown handles.
    pub fn entity_mut(&mut self, id: EntityId) -> WorldResult<&mut Entity> {
        self.get_mut(id).ok_or(WorldError::UnknownEntity(id))
    }

    /// Registry holding `kind`.
    #[inline]
    #[must_use]
    pub const fn registry(&self, kind: EntityKind) -> &Registry {
        match kind {
            EntityKind::Player => &self.players,
            EntityKind::Npc => &self.npcs,
        }
    }

    fn registry_mut(&mut self, kind: EntityKind) -> &mut Registry {
        match kind {
            EntityKind::Player => &mut self.players,
            EntityKind::Npc => &mut self.npcs,
        }
    }

    /// Live entities of one kind in slot order.
    pub fn iter_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.registry(kind).iter()
    }

    /// Total number of live entities.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.players.len() + self.npcs.len()
    }

    /// Returns true when the world is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies every queued hit to hitpoints and calls `deaths` once for each
    /// entity that reached zero. Returns the number of deaths.
    ///
    /// Runs once per tick before any packet is encoded; encoders only read
    /// the resolved values.
    pub fn resolve_hits(&mut self, deaths: &mut dyn DeathPipeline) -> usize {
        let mut died = 0;
        for entity in self.players.iter_mut().chain(self.npcs.iter_mut()) {
            if entity.resolve_hits() {
                debug!(entity = ?entity.id(), "entity died");
                deaths.on_death(entity.id());
                died += 1;
            }
        }
        died
    }

    /// Clears every entity's flags, payloads and movement.
    pub fn finish_tick(&mut self) {
        for entity in self.players.iter_mut().chain(self.npcs.iter_mut()) {
            entity.finish_tick();
        }
    }
}

fn check_capacity(kind: EntityKind, requested: usize, max: usize) -> WorldResult<()> {
    if requested > max {
        return Err(WorldError::CapacityTooLarge {
            kind,
            requested,
            max,
        });
    }
    Ok(())
}
