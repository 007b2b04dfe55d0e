//! # Pending Update Payloads
//!
//! The data behind each dirty flag. Gameplay collaborators (combat, chat,
//! emotes) produce these values; the encoders only read them.

/// A graphic (spot animation) played on an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Graphic {
    /// Graphic id.
    pub id: u16,
    /// Height above the ground.
    pub height: u16,
    /// Client ticks before it starts.
    pub delay: u16,
}

impl Graphic {
    /// Creates a ground-level graphic with no delay.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self { id, height: 0, delay: 0 }
    }
}

/// An animation played by an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Animation {
    /// Animation id (`0xFFFF` resets to idle).
    pub id: u16,
    /// Client ticks before it starts.
    pub delay: u8,
}

impl Animation {
    /// Animation id that resets the entity to its idle pose.
    pub const RESET: Self = Self { id: 0xFFFF, delay: 0 };

    /// Creates an animation.
    #[must_use]
    pub const fn new(id: u16, delay: u8) -> Self {
        Self { id, delay }
    }
}

/// A public chat message, already packed by the chat collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Text color.
    pub color: u8,
    /// Text effects (wave, scroll, ...).
    pub effects: u8,
    /// Crown shown next to the name.
    pub rank: u8,
    /// Packed text bytes.
    pub text: Vec<u8>,
}

/// Hit splat kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HitType {
    /// Blue zero splat.
    Block = 0,
    /// Red damage splat.
    #[default]
    Normal = 1,
    /// Green poison splat.
    Poison = 2,
    /// Orange disease splat.
    Disease = 3,
}

/// Values a hit resolves to once it has been applied to hitpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedHit {
    /// Damage after clamping to the hitpoints that were left.
    pub damage: u16,
    /// Hitpoints after the hit.
    pub hitpoints: u16,
    /// Maximum hitpoints.
    pub max_hitpoints: u16,
}

/// A hit queued against an entity this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    /// Damage the combat engine asked for.
    pub requested: u16,
    /// Splat kind.
    pub kind: HitType,
    /// Set by hit resolution, exactly once.
    pub resolved: Option<ResolvedHit>,
}

impl Hit {
    /// Creates an unresolved hit.
    #[must_use]
    pub const fn new(requested: u16, kind: HitType) -> Self {
        Self {
            requested,
            kind,
            resolved: None,
        }
    }
}

/// Payloads for every flag currently raised on an entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingUpdates {
    /// Payload for `GRAPHICS`.
    pub graphic: Option<Graphic>,
    /// Payload for `ANIMATION`.
    pub animation: Option<Animation>,
    /// Payload for `FORCED_CHAT`.
    pub forced_chat: Option<String>,
    /// Payload for `CHAT`.
    pub chat: Option<ChatMessage>,
    /// Wire index of the faced entity, for `FACE_ENTITY`.
    pub face_entity: Option<u16>,
    /// Faced tile, for `FACE_COORDINATE`.
    pub face_coordinate: Option<(u16, u16)>,
    /// Payload for `HIT`.
    pub hit: Option<Hit>,
    /// Payload for `HIT2`.
    pub hit2: Option<Hit>,
}

impl PendingUpdates {
    /// Drops every payload.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
