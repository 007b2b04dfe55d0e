//! # Attribute Blocks
//!
//! The byte-mode payload describing what changed about one entity this tick.
//!
//! ## Layout
//!
//! ```text
//! mask (1 byte, or 2 bytes little-endian with 0x40 set when mask >= 0x100)
//! field payloads, in table order, one per set mask bit
//! ```
//!
//! Wire order and mask bits live in one table per packet kind. Players and
//! NPCs share flag names but not bits, order or encodings.
//!
//! ## Caching
//!
//! A third-party observer that neither forces the appearance nor suppresses
//! chat sees exactly the entity's own flags, so every such observer gets the
//! same bytes. The first one builds the block and stores it in the
//! [`AttributeCache`]; the rest copy it. The cache is keyed by entity id and
//! emptied at the start of every tick.

use std::collections::HashMap;

use emberveil_core::{
    BodyPart, Entity, EntityId, EntityKind, EquipmentSlot, Gender, ItemDefinitions, PlayerDetails,
    ResolvedHit, UpdateFlags,
};
use emberveil_shared::constants::{
    npc_mask, player_mask, MASK_CONTINUATION, MASK_TWO_BYTE_THRESHOLD,
};
use tracing::trace;

use crate::buffer::{ByteOrder, PacketBuffer, Transform};
use crate::error::{EncodeError, EncodeResult};

type FieldEncoder = fn(&mut PacketBuffer, &Entity, &dyn ItemDefinitions) -> EncodeResult<()>;

/// One row of a field table.
#[derive(Clone, Copy)]
struct Field {
    flag: UpdateFlags,
    mask: u16,
    encode: FieldEncoder,
}

/// Player fields in wire order.
static PLAYER_FIELDS: [Field; 9] = [
    Field { flag: UpdateFlags::GRAPHICS, mask: player_mask::GRAPHICS, encode: player::graphics },
    Field { flag: UpdateFlags::ANIMATION, mask: player_mask::ANIMATION, encode: player::animation },
    Field { flag: UpdateFlags::FORCED_CHAT, mask: player_mask::FORCED_CHAT, encode: forced_chat },
    Field { flag: UpdateFlags::CHAT, mask: player_mask::CHAT, encode: player::chat },
    Field { flag: UpdateFlags::FACE_ENTITY, mask: player_mask::FACE_ENTITY, encode: player::face_entity },
    Field { flag: UpdateFlags::APPEARANCE, mask: player_mask::APPEARANCE, encode: player::appearance },
    Field { flag: UpdateFlags::FACE_COORDINATE, mask: player_mask::FACE_COORDINATE, encode: player::face_coordinate },
    Field { flag: UpdateFlags::HIT, mask: player_mask::HIT, encode: player::hit },
    Field { flag: UpdateFlags::HIT2, mask: player_mask::HIT2, encode: player::hit2 },
];

/// NPC fields in wire order. NPCs have no chat and no appearance.
static NPC_FIELDS: [Field; 7] = [
    Field { flag: UpdateFlags::ANIMATION, mask: npc_mask::ANIMATION, encode: npc::animation },
    Field { flag: UpdateFlags::HIT2, mask: npc_mask::HIT2, encode: npc::hit2 },
    Field { flag: UpdateFlags::GRAPHICS, mask: npc_mask::GRAPHICS, encode: npc::graphics },
    Field { flag: UpdateFlags::FACE_ENTITY, mask: npc_mask::FACE_ENTITY, encode: npc::face_entity },
    Field { flag: UpdateFlags::FORCED_CHAT, mask: npc_mask::FORCED_CHAT, encode: forced_chat },
    Field { flag: UpdateFlags::HIT, mask: npc_mask::HIT, encode: npc::hit },
    Field { flag: UpdateFlags::FACE_COORDINATE, mask: npc_mask::FACE_COORDINATE, encode: npc::face_coordinate },
];

fn fields(kind: EntityKind) -> &'static [Field] {
    match kind {
        EntityKind::Player => &PLAYER_FIELDS,
        EntityKind::Npc => &NPC_FIELDS,
    }
}

/// Flags every field table of `kind` knows about.
fn supported(kind: EntityKind) -> UpdateFlags {
    fields(kind)
        .iter()
        .fold(UpdateFlags::empty(), |acc, field| acc | field.flag)
}

/// How a block is being built for one observer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockContext {
    /// The observer is the entity itself.
    pub own: bool,
    /// Write the appearance even if it did not change (admissions).
    pub force_appearance: bool,
    /// Leave public chat out (the observer muted the entity).
    pub suppress_chat: bool,
}

impl BlockContext {
    /// Plain third-party observer.
    pub const OBSERVER: Self = Self {
        own: false,
        force_appearance: false,
        suppress_chat: false,
    };

    /// The observer's own entity.
    pub const OWN: Self = Self {
        own: true,
        force_appearance: false,
        suppress_chat: false,
    };

    /// Returns true when the block is identical for every observer using
    /// this context.
    #[inline]
    #[must_use]
    pub const fn is_cacheable(self) -> bool {
        !self.own && !self.force_appearance && !self.suppress_chat
    }
}

/// Flags that will actually be written for `entity` under `context`.
#[must_use]
pub fn effective_flags(entity: &Entity, context: BlockContext) -> UpdateFlags {
    let mut flags = entity.flags();
    if context.force_appearance && entity.kind() == EntityKind::Player {
        flags |= UpdateFlags::APPEARANCE;
    }
    if context.suppress_chat {
        flags -= UpdateFlags::CHAT;
    }
    flags & supported(entity.kind())
}

/// Returns true when an attribute block must follow this entity's sector.
#[inline]
#[must_use]
pub fn has_attributes(entity: &Entity, context: BlockContext) -> bool {
    !effective_flags(entity, context).is_empty()
}

/// Per-tick cache of third-party attribute blocks.
#[derive(Debug, Default)]
pub struct AttributeCache {
    tick: u64,
    blocks: HashMap<EntityId, Vec<u8>>,
    hits: u64,
    misses: u64,
}

impl AttributeCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every block and resets the counters. Called once, at tick start.
    pub fn begin_tick(&mut self, tick: u64) {
        self.blocks.clear();
        self.tick = tick;
        self.hits = 0;
        self.misses = 0;
    }

    /// Tick the cached blocks belong to.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Cache hits this tick.
    #[inline]
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Cache misses this tick.
    #[inline]
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    /// Number of cached blocks.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true when nothing is cached.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Cached block for `id`, counting the hit or miss.
    pub fn lookup(&mut self, id: EntityId) -> Option<&[u8]> {
        match self.blocks.get(&id) {
            Some(block) => {
                self.hits += 1;
                Some(block.as_slice())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn store(&mut self, id: EntityId, block: &[u8]) {
        self.blocks.insert(id, block.to_vec());
    }
}

/// Builds attribute blocks, reusing one scratch buffer.
#[derive(Debug)]
pub struct AttributeBlockBuilder {
    scratch: PacketBuffer,
}

impl AttributeBlockBuilder {
    /// Creates a builder whose blocks may be up to `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            scratch: PacketBuffer::new(capacity),
        }
    }

    /// Appends the block for `entity` to `out`. Returns false (and writes
    /// nothing) when no field is pending under `context`.
    ///
    /// # Errors
    ///
    /// Overflow of `out` or of the scratch buffer, a missing payload, or a
    /// payload that does not fit its field. `out` is unchanged on error.
    pub fn append(
        &mut self,
        out: &mut PacketBuffer,
        entity: &Entity,
        context: BlockContext,
        cache: &mut AttributeCache,
        items: &dyn ItemDefinitions,
    ) -> EncodeResult<bool> {
        let flags = effective_flags(entity, context);
        if flags.is_empty() {
            return Ok(false);
        }

        let cacheable = context.is_cacheable();
        if cacheable {
            if let Some(block) = cache.lookup(entity.id()) {
                out.write_bytes(block)?;
                return Ok(true);
            }
        }

        self.scratch.clear();
        encode_block(&mut self.scratch, entity, flags, items)?;
        if cacheable {
            trace!(entity = ?entity.id(), len = self.scratch.len(), "attribute block cached");
            cache.store(entity.id(), self.scratch.as_slice());
        }
        out.write_bytes(self.scratch.as_slice())?;
        Ok(true)
    }
}

fn encode_block(
    buf: &mut PacketBuffer,
    entity: &Entity,
    flags: UpdateFlags,
    items: &dyn ItemDefinitions,
) -> EncodeResult<()> {
    let table = fields(entity.kind());
    let mut mask = table
        .iter()
        .filter(|field| flags.contains(field.flag))
        .fold(0u16, |acc, field| acc | field.mask);

    if mask >= MASK_TWO_BYTE_THRESHOLD {
        mask |= MASK_CONTINUATION;
        buf.write_u16_with(mask, Transform::Plain, ByteOrder::Little)?;
    } else {
        buf.write_u8(mask as u8)?;
    }

    for field in table.iter().filter(|field| flags.contains(field.flag)) {
        (field.encode)(buf, entity, items)?;
    }
    Ok(())
}

// =============================================================================
// SHARED FIELD HELPERS
// =============================================================================

fn forced_chat(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
    let text = entity
        .updates()
        .forced_chat
        .as_deref()
        .ok_or(EncodeError::MissingPayload("forced chat"))?;
    buf.write_string(text)
}

fn resolved(hit: Option<emberveil_core::Hit>, name: &'static str) -> EncodeResult<(ResolvedHit, u8)> {
    let hit = hit.ok_or(EncodeError::MissingPayload(name))?;
    let resolved = hit.resolved.ok_or(EncodeError::MissingPayload(name))?;
    Ok((resolved, hit.kind as u8))
}

/// Hit values are single bytes on the wire.
fn byte(field: &'static str, value: u16) -> EncodeResult<u8> {
    u8::try_from(value).map_err(|_| EncodeError::FieldOutOfRange {
        field,
        value: i64::from(value),
    })
}

fn face_value(coordinate: u16) -> u16 {
    coordinate.wrapping_mul(2).wrapping_add(1)
}

// =============================================================================
// PLAYER FIELDS
// =============================================================================

mod player {
    use super::*;

    pub(super) fn graphics(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let graphic = entity
            .updates()
            .graphic
            .ok_or(EncodeError::MissingPayload("graphics"))?;
        buf.write_u16_with(graphic.id, Transform::Plain, ByteOrder::Little)?;
        buf.write_u32((u32::from(graphic.height) << 16) | u32::from(graphic.delay))
    }

    pub(super) fn animation(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let animation = entity
            .updates()
            .animation
            .ok_or(EncodeError::MissingPayload("animation"))?;
        buf.write_u16_with(animation.id, Transform::Plain, ByteOrder::Little)?;
        buf.write_u8_with(animation.delay, Transform::C)
    }

    pub(super) fn chat(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let message = entity
            .updates()
            .chat
            .as_ref()
            .ok_or(EncodeError::MissingPayload("chat"))?;
        let length = u8::try_from(message.text.len()).map_err(|_| EncodeError::FieldOutOfRange {
            field: "chat length",
            value: message.text.len() as i64,
        })?;
        let effects = (u16::from(message.color) << 8) | u16::from(message.effects);
        buf.write_u16_with(effects, Transform::Plain, ByteOrder::Little)?;
        buf.write_u8(message.rank)?;
        buf.write_u8_with(length, Transform::C)?;
        buf.write_bytes_reversed(&message.text)
    }

    pub(super) fn face_entity(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let index = entity
            .updates()
            .face_entity
            .ok_or(EncodeError::MissingPayload("face entity"))?;
        buf.write_u16_with(index, Transform::Plain, ByteOrder::Little)
    }

    pub(super) fn appearance(buf: &mut PacketBuffer, entity: &Entity, items: &dyn ItemDefinitions) -> EncodeResult<()> {
        let details = entity
            .as_player()
            .ok_or(EncodeError::MissingPayload("appearance"))?;
        let mut block = PacketBuffer::new(APPEARANCE_CAPACITY);
        appearance_block(&mut block, details, items)?;
        let length = u8::try_from(block.len()).map_err(|_| EncodeError::FieldOutOfRange {
            field: "appearance length",
            value: block.len() as i64,
        })?;
        buf.write_u8_with(length, Transform::C)?;
        buf.write_bytes(block.as_slice())
    }

    pub(super) fn face_coordinate(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let (x, y) = entity
            .updates()
            .face_coordinate
            .ok_or(EncodeError::MissingPayload("face coordinate"))?;
        buf.write_u16_with(face_value(x), Transform::A, ByteOrder::Little)?;
        buf.write_u16_with(face_value(y), Transform::Plain, ByteOrder::Little)
    }

    pub(super) fn hit(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let (hit, kind) = resolved(entity.updates().hit, "hit")?;
        buf.write_u8(byte("damage", hit.damage)?)?;
        buf.write_u8_with(kind, Transform::A)?;
        buf.write_u8_with(byte("hitpoints", hit.hitpoints)?, Transform::C)?;
        buf.write_u8(byte("max hitpoints", hit.max_hitpoints)?)
    }

    pub(super) fn hit2(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let (hit, kind) = resolved(entity.updates().hit2, "hit2")?;
        buf.write_u8(byte("damage", hit.damage)?)?;
        buf.write_u8_with(kind, Transform::S)?;
        buf.write_u8(byte("hitpoints", hit.hitpoints)?)?;
        buf.write_u8_with(byte("max hitpoints", hit.max_hitpoints)?, Transform::C)
    }
}

/// Largest appearance block the length byte can describe.
const APPEARANCE_CAPACITY: usize = u8::MAX as usize;

const ITEM_OFFSET: u16 = 0x200;
const LOOK_OFFSET: u16 = 0x100;
const NO_ICON: u8 = 0xFF;

fn appearance_block(
    buf: &mut PacketBuffer,
    details: &PlayerDetails,
    items: &dyn ItemDefinitions,
) -> EncodeResult<()> {
    let appearance = &details.appearance;
    let equipment = &details.equipment;

    buf.write_u8(appearance.gender as u8)?;
    buf.write_u8(appearance.head_icon.unwrap_or(NO_ICON))?;
    buf.write_u8(appearance.skull_icon.unwrap_or(NO_ICON))?;

    let hat = equipment.get(EquipmentSlot::Hat);
    let chest = equipment.get(EquipmentSlot::Chest);
    let full_body = chest.is_some_and(|item| items.is_full_body(item));
    let full_helm = hat.is_some_and(|item| items.is_full_helm(item));
    let full_mask = hat.is_some_and(|item| items.is_full_mask(item));

    let item = |buf: &mut PacketBuffer, slot: EquipmentSlot| match equipment.get(slot) {
        Some(id) => buf.write_u16(ITEM_OFFSET.wrapping_add(id)),
        None => buf.write_u8(0),
    };
    let item_or_look = |buf: &mut PacketBuffer, slot: EquipmentSlot, part: BodyPart| {
        match equipment.get(slot) {
            Some(id) => buf.write_u16(ITEM_OFFSET.wrapping_add(id)),
            None => buf.write_u16(LOOK_OFFSET.wrapping_add(appearance.look(part))),
        }
    };

    item(buf, EquipmentSlot::Hat)?;
    item(buf, EquipmentSlot::Cape)?;
    item(buf, EquipmentSlot::Amulet)?;
    item(buf, EquipmentSlot::Weapon)?;
    item_or_look(buf, EquipmentSlot::Chest, BodyPart::Torso)?;
    item(buf, EquipmentSlot::Shield)?;
    if full_body {
        buf.write_u8(0)?;
    } else {
        buf.write_u16(LOOK_OFFSET.wrapping_add(appearance.look(BodyPart::Arms)))?;
    }
    item_or_look(buf, EquipmentSlot::Legs, BodyPart::Legs)?;
    if full_helm || full_mask {
        buf.write_u8(0)?;
    } else {
        buf.write_u16(LOOK_OFFSET.wrapping_add(appearance.look(BodyPart::Head)))?;
    }
    item_or_look(buf, EquipmentSlot::Hands, BodyPart::Hands)?;
    item_or_look(buf, EquipmentSlot::Feet, BodyPart::Feet)?;
    if appearance.gender == Gender::Male && !full_mask {
        buf.write_u16(LOOK_OFFSET.wrapping_add(appearance.look(BodyPart::Beard)))?;
    } else {
        buf.write_u8(0)?;
    }

    buf.write_bytes(&appearance.colors)?;
    for animation in appearance.movement_animations {
        buf.write_u16(animation)?;
    }
    buf.write_u64(details.name_hash)?;
    buf.write_u8(details.combat_level)?;
    buf.write_u16(0)
}

// =============================================================================
// NPC FIELDS
// =============================================================================

mod npc {
    use super::*;

    pub(super) fn animation(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let animation = entity
            .updates()
            .animation
            .ok_or(EncodeError::MissingPayload("animation"))?;
        buf.write_u16_with(animation.id, Transform::Plain, ByteOrder::Little)?;
        buf.write_u8(animation.delay)
    }

    pub(super) fn hit2(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let (hit, kind) = resolved(entity.updates().hit2, "hit2")?;
        buf.write_u8_with(byte("damage", hit.damage)?, Transform::A)?;
        buf.write_u8_with(kind, Transform::C)?;
        buf.write_u8_with(byte("hitpoints", hit.hitpoints)?, Transform::A)?;
        buf.write_u8(byte("max hitpoints", hit.max_hitpoints)?)
    }

    pub(super) fn graphics(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let graphic = entity
            .updates()
            .graphic
            .ok_or(EncodeError::MissingPayload("graphics"))?;
        buf.write_u16(graphic.id)?;
        buf.write_u32((u32::from(graphic.height) << 16) | u32::from(graphic.delay))
    }

    pub(super) fn face_entity(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let index = entity
            .updates()
            .face_entity
            .ok_or(EncodeError::MissingPayload("face entity"))?;
        buf.write_u16(index)
    }

    pub(super) fn hit(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let (hit, kind) = resolved(entity.updates().hit, "hit")?;
        buf.write_u8_with(byte("damage", hit.damage)?, Transform::C)?;
        buf.write_u8_with(kind, Transform::S)?;
        buf.write_u8_with(byte("hitpoints", hit.hitpoints)?, Transform::S)?;
        buf.write_u8_with(byte("max hitpoints", hit.max_hitpoints)?, Transform::C)
    }

    pub(super) fn face_coordinate(buf: &mut PacketBuffer, entity: &Entity, _: &dyn ItemDefinitions) -> EncodeResult<()> {
        let (x, y) = entity
            .updates()
            .face_coordinate
            .ok_or(EncodeError::MissingPayload("face coordinate"))?;
        buf.write_u16_with(face_value(x), Transform::Plain, ByteOrder::Little)?;
        buf.write_u16_with(face_value(y), Transform::Plain, ByteOrder::Little)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberveil_core::{
        Animation, ChatMessage, ConnectionId, Graphic, HitType, PlainItems, PlayerDetails,
        WorldRegistry,
    };
    use emberveil_shared::Position;

    fn world() -> (WorldRegistry, EntityId, EntityId) {
        let mut world = WorldRegistry::new(4, 4).unwrap();
        let player = world
            .register_player(PlayerDetails::new("bob", ConnectionId(1)), Position::new(3200, 3200, 0))
            .unwrap();
        let npc = world.register_npc(50, Position::new(3201, 3200, 0), 20).unwrap();
        world.finish_tick();
        (world, player, npc)
    }

    fn build(entity: &Entity, context: BlockContext, cache: &mut AttributeCache) -> Vec<u8> {
        let mut out = PacketBuffer::new(512);
        let mut builder = AttributeBlockBuilder::new(512);
        builder
            .append(&mut out, entity, context, cache, &PlainItems)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_clean_entity_writes_nothing() {
        let (world, player, _) = world();
        let mut out = PacketBuffer::new(16);
        let mut builder = AttributeBlockBuilder::new(16);
        let mut cache = AttributeCache::new();
        let written = builder
            .append(&mut out, world.get(player).unwrap(), BlockContext::OBSERVER, &mut cache, &PlainItems)
            .unwrap();
        assert!(!written);
        assert!(out.is_empty());
    }

    #[test]
    fn test_single_byte_mask_animation() {
        let (mut world, player, _) = world();
        world
            .entity_mut(player)
            .unwrap()
            .play_animation(Animation::new(0x0366, 1));
        let bytes = build(world.get(player).unwrap(), BlockContext::OBSERVER, &mut AttributeCache::new());
        assert_eq!(bytes, vec![0x08, 0x66, 0x03, 0xFF]);
    }

    #[test]
    fn test_two_byte_mask_sets_continuation() {
        let (mut world, player, _) = world();
        let entity = world.entity_mut(player).unwrap();
        entity.play_graphic(Graphic { id: 0x0102, height: 100, delay: 0 });
        entity.play_animation(Animation::new(1, 0));
        let bytes = build(world.get(player).unwrap(), BlockContext::OBSERVER, &mut AttributeCache::new());
        // 0x100 | 0x08 | 0x40, little-endian
        assert_eq!(&bytes[..2], &[0x48, 0x01]);
        // graphics precedes animation
        assert_eq!(&bytes[2..4], &[0x02, 0x01]);
        assert_eq!(&bytes[4..8], &[0x00, 100, 0x00, 0x00]);
        assert_eq!(&bytes[8..], &[0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_chat_layout_and_suppression() {
        let (mut world, player, _) = world();
        world
            .entity_mut(player)
            .unwrap()
            .say(ChatMessage { color: 2, effects: 1, rank: 1, text: vec![10, 20, 30] })
            .unwrap();
        let entity = world.get(player).unwrap();
        let bytes = build(entity, BlockContext::OBSERVER, &mut AttributeCache::new());
        assert_eq!(bytes, vec![0x80, 0x01, 0x02, 0x01, 0xFD, 30, 20, 10]);

        let muted = BlockContext { suppress_chat: true, ..BlockContext::OBSERVER };
        assert!(!has_attributes(entity, muted));
        assert!(build(entity, muted, &mut AttributeCache::new()).is_empty());
    }

    #[test]
    fn test_forced_appearance_block() {
        let (world, player, _) = world();
        let entity = world.get(player).unwrap();
        let context = BlockContext { force_appearance: true, ..BlockContext::OBSERVER };
        let bytes = build(entity, context, &mut AttributeCache::new());
        assert_eq!(bytes[0], 0x10);
        let length = Transform::C.apply(bytes[1]) as usize;
        assert_eq!(bytes.len(), 2 + length);

        let block = &bytes[2..];
        // gender, head icon, skull icon
        assert_eq!(&block[..3], &[0, 0xFF, 0xFF]);
        // hat, cape, amulet, weapon empty; chest shows the torso look
        assert_eq!(&block[3..9], &[0, 0, 0, 0, 0x01, 18]);
        // trailing combat level and zero short
        assert_eq!(&block[block.len() - 3..], &[3, 0, 0]);
    }

    #[test]
    fn test_hits_require_resolution() {
        let (mut world, player, _) = world();
        world
            .entity_mut(player)
            .unwrap()
            .queue_hit(3, HitType::Normal)
            .unwrap();
        let mut out = PacketBuffer::new(64);
        let mut builder = AttributeBlockBuilder::new(64);
        let result = builder.append(
            &mut out,
            world.get(player).unwrap(),
            BlockContext::OBSERVER,
            &mut AttributeCache::new(),
            &PlainItems,
        );
        assert_eq!(result, Err(EncodeError::MissingPayload("hit")));
        assert!(out.is_empty());

        world.resolve_hits(&mut Vec::<EntityId>::new());
        let bytes = build(world.get(player).unwrap(), BlockContext::OBSERVER, &mut AttributeCache::new());
        // damage 3, type A(1), hitpoints C(7), max 10
        assert_eq!(bytes, vec![0x20, 3, 129, 249, 10]);
    }

    #[test]
    fn test_npc_table_order() {
        let (mut world, _, npc) = world();
        let entity = world.entity_mut(npc).unwrap();
        entity.force_chat("grr").unwrap();
        entity.play_animation(Animation::new(5, 2));
        let bytes = build(world.get(npc).unwrap(), BlockContext::OBSERVER, &mut AttributeCache::new());
        assert_eq!(bytes, vec![0x11, 5, 0, 2, b'g', b'r', b'r', 10]);
    }

    #[test]
    fn test_cache_hit_is_byte_identical() {
        let (mut world, player, _) = world();
        world.entity_mut(player).unwrap().force_chat("hello").unwrap();
        let entity = world.get(player).unwrap();
        let mut cache = AttributeCache::new();
        cache.begin_tick(1);

        let first = build(entity, BlockContext::OBSERVER, &mut cache);
        let second = build(entity, BlockContext::OBSERVER, &mut cache);
        assert_eq!(first, second);
        assert_eq!((cache.misses(), cache.hits()), (1, 1));

        // own and forced contexts bypass the cache entirely
        build(entity, BlockContext::OWN, &mut cache);
        assert_eq!((cache.misses(), cache.hits()), (1, 1));

        cache.begin_tick(2);
        assert!(cache.is_empty());
        assert_eq!(cache.tick(), 2);
    }

    #[test]
    fn test_hit_values_beyond_a_byte_are_rejected() {
        assert_eq!(byte("damage", 255), Ok(255));
        assert_eq!(
            byte("max hitpoints", 300),
            Err(EncodeError::FieldOutOfRange {
                field: "max hitpoints",
                value: 300
            })
        );
    }
}
