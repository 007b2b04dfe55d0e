//! # Protocol Constants
//!
//! **CRITICAL:** These values are baked into the client binary.
//! Changes require a client rebuild.

// =============================================================================
// PACKETS
// =============================================================================

/// Opcode of the player update packet.
pub const PLAYER_UPDATE_OPCODE: u8 = 81;

/// Opcode of the NPC update packet.
pub const NPC_UPDATE_OPCODE: u8 = 65;

/// Default hard capacity of one outbound update packet, in bytes.
///
/// Matches the client's inbound buffer size.
pub const DEFAULT_PACKET_CAPACITY: usize = 5000;

/// Default duration of one server tick in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 600;

// =============================================================================
// VISIBILITY
// =============================================================================

/// Maximum number of entities an observer tracks per list (8-bit count).
pub const MAX_LOCAL_ENTITIES: usize = 255;

/// Maximum number of entities admitted to a local list in one tick.
pub const MAX_ADMISSIONS_PER_TICK: usize = 15;

/// Default view distance in tiles.
///
/// Add records carry 5-bit signed deltas, so 15 is also the ceiling.
pub const DEFAULT_VIEW_DISTANCE: u8 = 15;

/// Largest view distance an add record can express.
pub const MAX_VIEW_DISTANCE: u8 = 15;

// =============================================================================
// INDICES
// =============================================================================

/// Width of a player slot in an add record.
pub const PLAYER_INDEX_BITS: u32 = 11;

/// Width of an NPC slot in an add record.
pub const NPC_INDEX_BITS: u32 = 14;

/// Player slot value that terminates the add-record region.
pub const PLAYER_LIST_TERMINATOR: u32 = (1 << PLAYER_INDEX_BITS) - 1;

/// NPC slot value that terminates the add-record region.
pub const NPC_LIST_TERMINATOR: u32 = (1 << NPC_INDEX_BITS) - 1;

/// Largest usable player registry (the terminator slot is reserved).
pub const MAX_PLAYER_CAPACITY: usize = PLAYER_LIST_TERMINATOR as usize;

/// Largest usable NPC registry (the terminator slot is reserved).
pub const MAX_NPC_CAPACITY: usize = NPC_LIST_TERMINATOR as usize;

/// Default player registry capacity.
pub const DEFAULT_PLAYER_CAPACITY: usize = 2000;

/// Default NPC registry capacity.
pub const DEFAULT_NPC_CAPACITY: usize = 8192;

/// Offset added to a player slot when an entity faces a player.
pub const FACE_PLAYER_OFFSET: u16 = 32768;

// =============================================================================
// PAYLOAD LIMITS
// =============================================================================

/// Terminator of newline-terminated strings (forced chat).
pub const STRING_TERMINATOR: u8 = 10;

/// Longest public chat message; its length is a single byte.
pub const MAX_CHAT_LENGTH: usize = u8::MAX as usize;

/// Largest hitpoint value; hit splats carry hitpoints in one byte.
pub const MAX_HITPOINTS: u16 = u8::MAX as u16;

// =============================================================================
// ATTRIBUTE MASK BITS - PLAYERS
// =============================================================================

/// Player mask bits. Assignment is fixed by the client.
pub mod player_mask {
    /// Graphic (spot animation).
    pub const GRAPHICS: u16 = 0x100;
    /// Animation.
    pub const ANIMATION: u16 = 0x8;
    /// Forced overhead text.
    pub const FORCED_CHAT: u16 = 0x4;
    /// Public chat.
    pub const CHAT: u16 = 0x80;
    /// Appearance block.
    pub const APPEARANCE: u16 = 0x10;
    /// Face another entity.
    pub const FACE_ENTITY: u16 = 0x1;
    /// Face a tile.
    pub const FACE_COORDINATE: u16 = 0x2;
    /// Primary hit splat.
    pub const HIT: u16 = 0x20;
    /// Secondary hit splat.
    pub const HIT2: u16 = 0x200;
}

// =============================================================================
// ATTRIBUTE MASK BITS - NPCS
// =============================================================================

/// NPC mask bits. Assignment is fixed by the client.
pub mod npc_mask {
    /// Animation.
    pub const ANIMATION: u16 = 0x10;
    /// Secondary hit splat.
    pub const HIT2: u16 = 0x8;
    /// Graphic (spot animation).
    pub const GRAPHICS: u16 = 0x80;
    /// Face another entity.
    pub const FACE_ENTITY: u16 = 0x20;
    /// Forced overhead text.
    pub const FORCED_CHAT: u16 = 0x1;
    /// Primary hit splat.
    pub const HIT: u16 = 0x40;
    /// Face a tile.
    pub const FACE_COORDINATE: u16 = 0x4;
}

/// Continuation bit OR-ed into a mask that needs two bytes.
pub const MASK_CONTINUATION: u16 = 0x40;

/// Masks at or above this value are written as two bytes.
pub const MASK_TWO_BYTE_THRESHOLD: u16 = 0x100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminators_fill_index_width() {
        assert_eq!(PLAYER_LIST_TERMINATOR, 2047);
        assert_eq!(NPC_LIST_TERMINATOR, 16383);
    }

    #[test]
    fn test_player_mask_bits_are_distinct() {
        let bits = [
            player_mask::GRAPHICS,
            player_mask::ANIMATION,
            player_mask::FORCED_CHAT,
            player_mask::CHAT,
            player_mask::APPEARANCE,
            player_mask::FACE_ENTITY,
            player_mask::FACE_COORDINATE,
            player_mask::HIT,
            player_mask::HIT2,
        ];
        let combined = bits.iter().fold(0u16, |acc, bit| {
            assert_eq!(acc & bit, 0, "bit {bit:#x} assigned twice");
            acc | bit
        });
        assert_eq!(combined & MASK_CONTINUATION, 0);
    }
}
