//! # Entities
//!
//! Entities are mobile things observers can see: players and NPCs. Each one
//! is addressed by an [`EntityId`]:
//! - the registry it lives in (player or NPC)
//! - its slot index (what goes on the wire)
//! - a generation counter for detecting stale handles after slot reuse

use std::collections::BTreeSet;

use emberveil_shared::constants::{
    FACE_PLAYER_OFFSET, MAX_CHAT_LENGTH, MAX_HITPOINTS, STRING_TERMINATOR,
};
use emberveil_shared::{name_hash, Direction, Position};

use crate::appearance::{Appearance, Equipment, EquipmentSlot};
use crate::error::{WorldError, WorldResult};
use crate::flags::UpdateFlags;
use crate::movement::MovementStep;
use crate::session::ConnectionId;
use crate::updates::{Animation, ChatMessage, Graphic, Hit, HitType, PendingUpdates, ResolvedHit};

/// Which registry an entity lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// A logged-in player.
    Player,
    /// A non-player character.
    Npc,
}

/// Generation-checked handle to an entity slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    kind: EntityKind,
    index: u16,
    generation: u32,
}

impl EntityId {
    /// Creates a handle.
    #[inline]
    #[must_use]
    pub const fn new(kind: EntityKind, index: u16, generation: u32) -> Self {
        Self {
            kind,
            index,
            generation,
        }
    }

    /// Registry this handle points into.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> EntityKind {
        self.kind
    }

    /// Slot index; this is the value written in add records.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u16 {
        self.index
    }

    /// Generation the slot had when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Index other entities use to face this one.
    #[must_use]
    pub const fn face_index(self) -> u16 {
        match self.kind {
            EntityKind::Player => self.index.wrapping_add(FACE_PLAYER_OFFSET),
            EntityKind::Npc => self.index,
        }
    }
}

/// Current and maximum hitpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hitpoints {
    /// Hitpoints left.
    pub current: u16,
    /// Hitpoints when fully healed.
    pub maximum: u16,
}

impl Hitpoints {
    /// Full health at `maximum`.
    #[must_use]
    pub const fn full(maximum: u16) -> Self {
        Self {
            current: maximum,
            maximum,
        }
    }
}

/// Player-only state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerDetails {
    /// Display name.
    pub username: String,
    /// Base-37 packed name, cached at login.
    pub name_hash: u64,
    /// Transport session; resolved through the connection table.
    pub connection: ConnectionId,
    /// Looks, colors and movement animations.
    pub appearance: Appearance,
    /// Worn items.
    pub equipment: Equipment,
    /// Level shown above the head.
    pub combat_level: u8,
    /// Chat crown.
    pub rank: u8,
    /// Entities whose public chat this player does not receive.
    pub muted: BTreeSet<EntityId>,
}

impl PlayerDetails {
    /// Returns true when chat from `speaker` must be withheld from this player.
    #[inline]
    #[must_use]
    pub fn is_muting(&self, speaker: EntityId) -> bool {
        self.muted.contains(&speaker)
    }
}

impl PlayerDetails {
    /// Creates a level-3 player with the default appearance.
    #[must_use]
    pub fn new(username: impl Into<String>, connection: ConnectionId) -> Self {
        let username = username.into();
        Self {
            name_hash: name_hash(&username),
            username,
            connection,
            appearance: Appearance::default(),
            equipment: Equipment::default(),
            combat_level: 3,
            rank: 0,
            muted: BTreeSet::new(),
        }
    }
}

/// NPC-only state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NpcDetails {
    /// Content definition id, sent in add records.
    pub definition_id: u16,
}

/// Kind-specific state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityDetails {
    /// Player state.
    Player(PlayerDetails),
    /// NPC state.
    Npc(NpcDetails),
}

/// A registered entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    id: EntityId,
    position: Position,
    region_base: Position,
    movement: MovementStep,
    flags: UpdateFlags,
    updates: PendingUpdates,
    hitpoints: Hitpoints,
    dead: bool,
    details: EntityDetails,
}

impl Entity {
    pub(crate) fn new(
        id: EntityId,
        details: EntityDetails,
        position: Position,
        hitpoints: Hitpoints,
    ) -> Self {
        let mut entity = Self {
            id,
            position,
            region_base: position,
            movement: MovementStep::placement(true),
            flags: UpdateFlags::empty(),
            updates: PendingUpdates::default(),
            hitpoints,
            dead: false,
            details,
        };
        if matches!(entity.details, EntityDetails::Player(_)) {
            entity.flags |= UpdateFlags::APPEARANCE;
        }
        entity
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Handle of this entity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Registry kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.id.kind
    }

    /// Current tile.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Base of the map region last sent to this entity's client.
    #[inline]
    #[must_use]
    pub const fn region_base(&self) -> Position {
        self.region_base
    }

    /// Records the map region the client was told to load.
    pub fn set_region_base(&mut self, base: Position) {
        self.region_base = base;
    }

    /// This tick's movement.
    #[inline]
    #[must_use]
    pub const fn movement(&self) -> &MovementStep {
        &self.movement
    }

    /// Raised dirty flags.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> UpdateFlags {
        self.flags
    }

    /// Payloads behind the raised flags.
    #[inline]
    #[must_use]
    pub const fn updates(&self) -> &PendingUpdates {
        &self.updates
    }

    /// Hitpoints.
    #[inline]
    #[must_use]
    pub const fn hitpoints(&self) -> Hitpoints {
        self.hitpoints
    }

    /// Whether the death pipeline has been triggered for this entity.
    #[inline]
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.dead
    }

    /// Kind-specific state.
    #[inline]
    #[must_use]
    pub const fn details(&self) -> &EntityDetails {
        &self.details
    }

    /// Player state, if this is a player.
    #[must_use]
    pub const fn as_player(&self) -> Option<&PlayerDetails> {
        match &self.details {
            EntityDetails::Player(player) => Some(player),
            EntityDetails::Npc(_) => None,
        }
    }

    /// NPC state, if this is an NPC.
    #[must_use]
    pub const fn as_npc(&self) -> Option<&NpcDetails> {
        match &self.details {
            EntityDetails::Npc(npc) => Some(npc),
            EntityDetails::Player(_) => None,
        }
    }

    fn player_mut(&mut self) -> WorldResult<&mut PlayerDetails> {
        match &mut self.details {
            EntityDetails::Player(player) => Ok(player),
            EntityDetails::Npc(_) => Err(WorldError::NotAPlayer(self.id)),
        }
    }

    // =========================================================================
    // MOVEMENT
    // =========================================================================

    /// Takes one step.
    pub fn walk(&mut self, direction: Direction) {
        self.apply_step(MovementStep::walk(direction));
    }

    /// Takes two steps.
    pub fn run(&mut self, first: Direction, second: Direction) {
        self.apply_step(MovementStep::run(first, second));
    }

    /// Moves to `to` absolutely; observers re-place the entity.
    pub fn teleport(&mut self, to: Position) {
        self.position = to;
        self.movement = MovementStep::placement(true);
    }

    /// Applies a step produced by the movement queue collaborator.
    ///
    /// A placement already pending this tick wins over later steps.
    pub fn apply_step(&mut self, step: MovementStep) {
        if self.movement.needs_placement {
            return;
        }
        if let Some(direction) = step.primary {
            self.position = self.position.translate(direction);
        }
        if let Some(direction) = step.secondary {
            self.position = self.position.translate(direction);
        }
        self.movement = step;
    }

    // =========================================================================
    // DIRTY FLAG SETTERS
    // =========================================================================

    /// Plays a graphic.
    pub fn play_graphic(&mut self, graphic: Graphic) {
        self.updates.graphic = Some(graphic);
        self.flags |= UpdateFlags::GRAPHICS;
    }

    /// Plays an animation.
    pub fn play_animation(&mut self, animation: Animation) {
        self.updates.animation = Some(animation);
        self.flags |= UpdateFlags::ANIMATION;
    }

    /// Shows overhead text without a chat-box line.
    ///
    /// # Errors
    ///
    /// [`WorldError::LineBreakInText`] when the text contains the string
    /// terminator; the flag is left untouched.
    pub fn force_chat(&mut self, text: impl Into<String>) -> WorldResult<()> {
        let text = text.into();
        if text.bytes().any(|b| b == STRING_TERMINATOR) {
            return Err(WorldError::LineBreakInText(self.id));
        }
        self.updates.forced_chat = Some(text);
        self.flags |= UpdateFlags::FORCED_CHAT;
        Ok(())
    }

    /// Speaks in public chat.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotAPlayer`] for NPCs, [`WorldError::ChatTooLong`] when
    /// the text does not fit the one-byte length field.
    pub fn say(&mut self, message: ChatMessage) -> WorldResult<()> {
        self.player_mut()?;
        if message.text.len() > MAX_CHAT_LENGTH {
            return Err(WorldError::ChatTooLong {
                entity: self.id,
                length: message.text.len(),
                max: MAX_CHAT_LENGTH,
            });
        }
        self.updates.chat = Some(message);
        self.flags |= UpdateFlags::CHAT;
        Ok(())
    }

    /// Turns towards another entity.
    pub fn face_entity(&mut self, target: EntityId) {
        self.updates.face_entity = Some(target.face_index());
        self.flags |= UpdateFlags::FACE_ENTITY;
    }

    /// Turns towards a tile.
    pub fn face_coordinate(&mut self, target: Position) {
        self.updates.face_coordinate = Some((target.x, target.y));
        self.flags |= UpdateFlags::FACE_COORDINATE;
    }

    /// Marks the appearance block as changed.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotAPlayer`] for NPCs.
    pub fn refresh_appearance(&mut self) -> WorldResult<()> {
        self.player_mut()?;
        self.flags |= UpdateFlags::APPEARANCE;
        Ok(())
    }

    /// Replaces the appearance and marks it changed.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotAPlayer`] for NPCs.
    pub fn set_appearance(&mut self, appearance: Appearance) -> WorldResult<()> {
        self.player_mut()?.appearance = appearance;
        self.flags |= UpdateFlags::APPEARANCE;
        Ok(())
    }

    /// Wears (or removes) an item and marks the appearance changed.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotAPlayer`] for NPCs.
    pub fn equip(&mut self, slot: EquipmentSlot, item: Option<u16>) -> WorldResult<()> {
        self.player_mut()?.equipment.set(slot, item);
        self.flags |= UpdateFlags::APPEARANCE;
        Ok(())
    }

    /// Stops (or resumes) receiving public chat from `speaker`.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotAPlayer`] for NPCs.
    pub fn set_muted(&mut self, speaker: EntityId, muted: bool) -> WorldResult<()> {
        let player = self.player_mut()?;
        if muted {
            player.muted.insert(speaker);
        } else {
            player.muted.remove(&speaker);
        }
        Ok(())
    }

    /// Queues a hit from the combat engine. The first hit of a tick uses the
    /// primary splat, the second the secondary one.
    ///
    /// # Errors
    ///
    /// [`WorldError::HitSlotsFull`] when two hits are already queued.
    pub fn queue_hit(&mut self, damage: u16, kind: HitType) -> WorldResult<()> {
        let hit = Hit::new(damage, kind);
        if self.updates.hit.is_none() {
            self.updates.hit = Some(hit);
            self.flags |= UpdateFlags::HIT;
        } else if self.updates.hit2.is_none() {
            self.updates.hit2 = Some(hit);
            self.flags |= UpdateFlags::HIT2;
        } else {
            return Err(WorldError::HitSlotsFull(self.id));
        }
        Ok(())
    }

    /// Heals to `hitpoints` and clears the dead mark.
    ///
    /// # Errors
    ///
    /// [`WorldError::HitpointsTooLarge`] when either value exceeds
    /// [`MAX_HITPOINTS`].
    pub fn restore(&mut self, hitpoints: Hitpoints) -> WorldResult<()> {
        check_hitpoints(hitpoints.maximum.max(hitpoints.current))?;
        self.hitpoints = hitpoints;
        self.dead = false;
        Ok(())
    }

    // =========================================================================
    // TICK BOUNDARIES
    // =========================================================================

    /// Applies every unresolved hit to hitpoints. Returns true if this call
    /// killed the entity.
    pub(crate) fn resolve_hits(&mut self) -> bool {
        let mut died = false;
        for hit in [&mut self.updates.hit, &mut self.updates.hit2]
            .into_iter()
            .flatten()
        {
            if hit.resolved.is_some() {
                continue;
            }
            let damage = hit.requested.min(self.hitpoints.current);
            self.hitpoints.current -= damage;
            hit.resolved = Some(ResolvedHit {
                damage,
                hitpoints: self.hitpoints.current,
                max_hitpoints: self.hitpoints.maximum,
            });
            if self.hitpoints.current == 0 && !self.dead {
                self.dead = true;
                died = true;
            }
        }
        died
    }

    /// Drops this tick's flags, payloads and movement.
    pub(crate) fn finish_tick(&mut self) {
        self.flags = UpdateFlags::empty();
        self.updates.clear();
        self.movement = MovementStep::default();
    }
}

/// Rejects hitpoint values a hit splat cannot carry.
pub(crate) fn check_hitpoints(value: u16) -> WorldResult<()> {
    if value > MAX_HITPOINTS {
        return Err(WorldError::HitpointsTooLarge {
            requested: value,
            max: MAX_HITPOINTS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Entity {
        Entity::new(
            EntityId::new(EntityKind::Player, 1, 0),
            EntityDetails::Player(PlayerDetails::new("alice", ConnectionId(1))),
            Position::new(3200, 3200, 0),
            Hitpoints::full(10),
        )
    }

    fn npc() -> Entity {
        Entity::new(
            EntityId::new(EntityKind::Npc, 4, 0),
            EntityDetails::Npc(NpcDetails { definition_id: 1 }),
            Position::new(3200, 3200, 0),
            Hitpoints::full(5),
        )
    }

    #[test]
    fn test_new_player_needs_placement_and_appearance() {
        let entity = player();
        assert!(entity.movement().needs_placement);
        assert!(entity.flags().contains(UpdateFlags::APPEARANCE));
        assert!(!npc().flags().contains(UpdateFlags::APPEARANCE));
    }

    #[test]
    fn test_walk_translates() {
        let mut entity = player();
        entity.finish_tick();
        entity.walk(Direction::North);
        assert_eq!(entity.position(), Position::new(3200, 3201, 0));
        entity.finish_tick();
        entity.run(Direction::East, Direction::East);
        assert_eq!(entity.position(), Position::new(3202, 3201, 0));
    }

    #[test]
    fn test_placement_wins_over_steps() {
        let mut entity = player();
        entity.finish_tick();
        entity.teleport(Position::new(3000, 3000, 0));
        entity.walk(Direction::North);
        assert_eq!(entity.position(), Position::new(3000, 3000, 0));
        assert!(entity.movement().needs_placement);
    }

    #[test]
    fn test_hit_slots() {
        let mut entity = player();
        entity.queue_hit(1, HitType::Normal).unwrap();
        entity.queue_hit(2, HitType::Poison).unwrap();
        assert!(entity.flags().contains(UpdateFlags::HIT | UpdateFlags::HIT2));
        assert_eq!(
            entity.queue_hit(3, HitType::Normal),
            Err(WorldError::HitSlotsFull(entity.id()))
        );
    }

    #[test]
    fn test_hit_resolution_clamps_and_kills_once() {
        let mut entity = player();
        entity.queue_hit(200, HitType::Normal).unwrap();
        entity.queue_hit(4, HitType::Normal).unwrap();

        assert!(entity.resolve_hits());
        assert!(!entity.resolve_hits());

        let first = entity.updates().hit.unwrap().resolved.unwrap();
        assert_eq!(first.damage, 10);
        assert_eq!(first.hitpoints, 0);
        let second = entity.updates().hit2.unwrap().resolved.unwrap();
        assert_eq!(second.damage, 0);
        assert!(entity.is_dead());
        assert_eq!(entity.hitpoints().current, 0);
    }

    #[test]
    fn test_player_only_setters_reject_npcs() {
        let mut entity = npc();
        let id = entity.id();
        assert_eq!(entity.refresh_appearance(), Err(WorldError::NotAPlayer(id)));
        let message = ChatMessage {
            color: 0,
            effects: 0,
            rank: 0,
            text: vec![1, 2],
        };
        assert_eq!(entity.say(message), Err(WorldError::NotAPlayer(id)));
    }

    #[test]
    fn test_chat_payloads_are_checked_before_flagging() {
        let mut entity = player();
        entity.finish_tick();
        let id = entity.id();

        assert_eq!(
            entity.force_chat("hi\nthere"),
            Err(WorldError::LineBreakInText(id))
        );
        let long = ChatMessage {
            color: 0,
            effects: 0,
            rank: 0,
            text: vec![b'a'; 300],
        };
        assert_eq!(
            entity.say(long),
            Err(WorldError::ChatTooLong {
                entity: id,
                length: 300,
                max: 255
            })
        );
        assert!(entity.flags().is_empty());
        assert!(entity.updates().forced_chat.is_none());
        assert!(entity.updates().chat.is_none());

        let longest = ChatMessage {
            color: 0,
            effects: 0,
            rank: 0,
            text: vec![b'a'; 255],
        };
        entity.say(longest).unwrap();
        entity.force_chat("hi there").unwrap();
        assert!(entity.flags().contains(UpdateFlags::CHAT | UpdateFlags::FORCED_CHAT));
    }

    #[test]
    fn test_restore_rejects_oversized_hitpoints() {
        let mut entity = npc();
        assert_eq!(
            entity.restore(Hitpoints::full(256)),
            Err(WorldError::HitpointsTooLarge {
                requested: 256,
                max: 255
            })
        );
        assert_eq!(entity.hitpoints(), Hitpoints::full(5));
        entity.restore(Hitpoints::full(255)).unwrap();
        assert_eq!(entity.hitpoints().current, 255);
    }

    #[test]
    fn test_mute_list() {
        let mut entity = player();
        let speaker = EntityId::new(EntityKind::Player, 9, 0);
        entity.set_muted(speaker, true).unwrap();
        assert!(entity.as_player().unwrap().is_muting(speaker));
        entity.set_muted(speaker, false).unwrap();
        assert!(!entity.as_player().unwrap().is_muting(speaker));
    }

    #[test]
    fn test_face_index_offsets_players() {
        assert_eq!(EntityId::new(EntityKind::Player, 5, 0).face_index(), 32773);
        assert_eq!(EntityId::new(EntityKind::Npc, 5, 0).face_index(), 5);
    }

    #[test]
    fn test_finish_tick_clears() {
        let mut entity = player();
        entity.play_animation(Animation::new(866, 0));
        entity.finish_tick();
        assert!(entity.flags().is_empty());
        assert!(entity.updates().animation.is_none());
        assert!(entity.movement().is_idle());
    }
}
