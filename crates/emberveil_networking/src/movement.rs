//! # Movement Sectors
//!
//! Each entity's movement for a tick is written as exactly one sector in the
//! bit region of the update packet.
//!
//! ```text
//! no change          0
//! stand + attrs      1 00
//! walk               1 01 ddd u
//! run                1 10 ddd ddd u
//! placement (own)    1 11 pp r u yyyyyyy xxxxxxx
//! removal (others)   1 11
//! ```
//!
//! `u` is the attributes-pending bit: an attribute block for this entity
//! follows in the byte region.

use emberveil_core::Entity;
use emberveil_shared::Direction;

use crate::buffer::PacketBuffer;
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::reader::PacketReader;

const TYPE_NO_MOVE: u32 = 0;
const TYPE_WALK: u32 = 1;
const TYPE_RUN: u32 = 2;
const TYPE_PLACEMENT: u32 = 3;

/// One entity's movement, ready to be written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sector {
    /// Did not move.
    NoMove,
    /// One step.
    Walk(Direction),
    /// Two steps.
    Run(Direction, Direction),
    /// Absolute placement inside the observer's loaded map. Own entity only.
    Placement {
        /// Local x (0..128).
        local_x: u8,
        /// Local y (0..128).
        local_y: u8,
        /// Height level (0..4).
        plane: u8,
        /// Client drops its interpolation queue.
        reset_queue: bool,
    },
    /// Drop the entity from the observer's local list. Others only.
    Removal,
}

/// Writes `sector`.
///
/// A removal never carries attributes; `attributes_pending` is ignored for it.
///
/// # Errors
///
/// Placement fields outside their bit widths, or any buffer error.
pub fn encode_sector(
    buf: &mut PacketBuffer,
    sector: Sector,
    attributes_pending: bool,
) -> EncodeResult<()> {
    match sector {
        Sector::NoMove if !attributes_pending => buf.write_bit(false),
        Sector::NoMove => {
            buf.write_bit(true)?;
            buf.write_bits(2, TYPE_NO_MOVE)
        }
        Sector::Walk(direction) => {
            buf.write_bit(true)?;
            buf.write_bits(2, TYPE_WALK)?;
            buf.write_bits(3, u32::from(direction.id()))?;
            buf.write_bit(attributes_pending)
        }
        Sector::Run(first, second) => {
            buf.write_bit(true)?;
            buf.write_bits(2, TYPE_RUN)?;
            buf.write_bits(3, u32::from(first.id()))?;
            buf.write_bits(3, u32::from(second.id()))?;
            buf.write_bit(attributes_pending)
        }
        Sector::Placement {
            local_x,
            local_y,
            plane,
            reset_queue,
        } => {
            check_width("placement plane", i64::from(plane), 2)?;
            check_width("placement local x", i64::from(local_x), 7)?;
            check_width("placement local y", i64::from(local_y), 7)?;
            buf.write_bit(true)?;
            buf.write_bits(2, TYPE_PLACEMENT)?;
            buf.write_bits(2, u32::from(plane))?;
            buf.write_bit(reset_queue)?;
            buf.write_bit(attributes_pending)?;
            buf.write_bits(7, u32::from(local_y))?;
            buf.write_bits(7, u32::from(local_x))
        }
        Sector::Removal => {
            buf.write_bit(true)?;
            buf.write_bits(2, TYPE_PLACEMENT)
        }
    }
}

/// Reads one sector. Type 3 is a placement for the observer's own entity and
/// a removal for anyone else.
///
/// # Errors
///
/// Any reader error.
pub fn decode_sector(reader: &mut PacketReader<'_>, is_own: bool) -> DecodeResult<(Sector, bool)> {
    if !reader.read_bit()? {
        return Ok((Sector::NoMove, false));
    }
    match reader.read_bits(2)? {
        TYPE_NO_MOVE => Ok((Sector::NoMove, true)),
        TYPE_WALK => {
            let direction = read_direction(reader)?;
            Ok((Sector::Walk(direction), reader.read_bit()?))
        }
        TYPE_RUN => {
            let first = read_direction(reader)?;
            let second = read_direction(reader)?;
            Ok((Sector::Run(first, second), reader.read_bit()?))
        }
        _ if is_own => {
            let plane = reader.read_bits(2)? as u8;
            let reset_queue = reader.read_bit()?;
            let pending = reader.read_bit()?;
            let local_y = reader.read_bits(7)? as u8;
            let local_x = reader.read_bits(7)? as u8;
            let sector = Sector::Placement {
                local_x,
                local_y,
                plane,
                reset_queue,
            };
            Ok((sector, pending))
        }
        _ => Ok((Sector::Removal, false)),
    }
}

fn read_direction(reader: &mut PacketReader<'_>) -> DecodeResult<Direction> {
    let id = reader.read_bits(3)? as u8;
    Direction::from_id(id).ok_or(DecodeError::MalformedSector("direction"))
}

/// Picks the sector for `entity` as seen by one observer.
///
/// For the observer's own entity a pending placement wins over steps. For
/// anyone else a placement means the entity must be removed and admitted
/// again, so it selects [`Sector::Removal`].
///
/// # Errors
///
/// Own placement outside the loaded map.
pub fn select_sector(entity: &Entity, is_own: bool) -> EncodeResult<Sector> {
    let movement = entity.movement();
    if movement.needs_placement {
        return if is_own {
            placement_sector(entity, movement.reset_queue)
        } else {
            Ok(Sector::Removal)
        };
    }
    Ok(match (movement.primary, movement.secondary) {
        (Some(first), Some(second)) => Sector::Run(first, second),
        (Some(direction), None) => Sector::Walk(direction),
        _ => Sector::NoMove,
    })
}

/// Placement of `entity` inside the map loaded around its region base.
///
/// # Errors
///
/// [`EncodeError::FieldOutOfRange`] when the entity is outside the 7-bit
/// local area.
pub fn placement_sector(entity: &Entity, reset_queue: bool) -> EncodeResult<Sector> {
    let position = entity.position();
    let base = entity.region_base();
    Ok(Sector::Placement {
        local_x: local_coordinate("placement local x", position.local_x(base))?,
        local_y: local_coordinate("placement local y", position.local_y(base))?,
        plane: position.plane,
        reset_queue,
    })
}

fn local_coordinate(field: &'static str, value: i32) -> EncodeResult<u8> {
    u8::try_from(value)
        .ok()
        .filter(|&v| v < 128)
        .ok_or(EncodeError::FieldOutOfRange {
            field,
            value: i64::from(value),
        })
}

fn check_width(field: &'static str, value: i64, bits: u32) -> EncodeResult<()> {
    if value >= 1 << bits {
        return Err(EncodeError::FieldOutOfRange { field, value });
    }
    Ok(())
}
