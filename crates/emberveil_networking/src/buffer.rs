//! # Packet Buffer
//!
//! Writer for the update packets: byte-granular writes with value transforms
//! and byte orders, a bit-granular region, and var-short framing.
//!
//! ## Design
//!
//! - Hard capacity fixed at construction; a write that would cross it fails
//!   with [`EncodeError::Overflow`] and leaves the buffer untouched
//! - Bit mode and byte mode never interleave: byte writes fail while bit
//!   access is open and bit writes fail outside it
//! - Bits are packed most-significant first and may span bytes
//!
//! ```text
//! [opcode][len:u16][bit region ........|pad][byte region ......]
//!                  ^ begin_var_short        ^ finish_bit_access
//! ```

use crate::error::{EncodeError, EncodeResult};

/// Obfuscation applied to the least-significant byte of a value.
///
/// Every transform is its own inverse, so readers apply the same one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Transform {
    /// As-is.
    #[default]
    Plain,
    /// Add 128.
    A,
    /// Negate.
    C,
    /// Subtract from 128.
    S,
}

impl Transform {
    /// All transforms.
    pub const ALL: [Self; 4] = [Self::Plain, Self::A, Self::C, Self::S];

    /// Applies the transform to one byte.
    #[inline]
    #[must_use]
    pub const fn apply(self, byte: u8) -> u8 {
        match self {
            Self::Plain => byte,
            Self::A => byte.wrapping_add(128),
            Self::C => 0u8.wrapping_sub(byte),
            Self::S => 128u8.wrapping_sub(byte),
        }
    }
}

/// Order in which the bytes of a multi-byte value are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Most significant byte first.
    #[default]
    Big,
    /// Least significant byte first.
    Little,
    /// 4-byte only: bytes 1, 0, 3, 2.
    Middle,
    /// 4-byte only: bytes 2, 3, 0, 1.
    InverseMiddle,
}

impl ByteOrder {
    /// All byte orders.
    pub const ALL: [Self; 4] = [Self::Big, Self::Little, Self::Middle, Self::InverseMiddle];

    /// Returns true when this order is defined for `width`-byte values.
    #[inline]
    #[must_use]
    pub const fn supports(self, width: usize) -> bool {
        match self {
            Self::Big | Self::Little => width >= 1 && width <= 8,
            Self::Middle | Self::InverseMiddle => width == 4,
        }
    }

    /// Significance (0 = least significant) of the `i`-th byte on the wire.
    #[inline]
    pub(crate) const fn significance(self, width: usize, i: usize) -> usize {
        match self {
            Self::Big => width - 1 - i,
            Self::Little => i,
            Self::Middle => [1, 0, 3, 2][i],
            Self::InverseMiddle => [2, 3, 0, 1][i],
        }
    }
}

// Terminator for strings written with `PacketBuffer::write_string`.
pub use emberveil_shared::constants::STRING_TERMINATOR;

/// Bounded packet writer.
#[derive(Clone, Debug)]
pub struct PacketBuffer {
    data: Vec<u8>,
    capacity: usize,
    /// Absolute bit cursor while bit access is open.
    bit_position: Option<usize>,
    /// First payload byte of the open var-short frame.
    frame_start: Option<usize>,
}

impl PacketBuffer {
    /// Creates an empty buffer that never grows past `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            bit_position: None,
            frame_start: None,
        }
    }

    /// Bytes written so far (a partially filled bit-mode byte counts).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing has been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Hard capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes left before the capacity is reached.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// Returns true while bit access is open.
    #[inline]
    #[must_use]
    pub const fn in_bit_mode(&self) -> bool {
        self.bit_position.is_some()
    }

    /// Written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer, returning the written bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Drops everything written, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.bit_position = None;
        self.frame_start = None;
    }

    fn ensure(&self, requested: usize) -> EncodeResult<()> {
        if self.bit_position.is_some() {
            return Err(EncodeError::InBitMode);
        }
        self.ensure_room(requested)
    }

    fn ensure_room(&self, requested: usize) -> EncodeResult<()> {
        if self.data.len() + requested > self.capacity {
            return Err(EncodeError::Overflow {
                requested,
                len: self.data.len(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    // =========================================================================
    // BYTE MODE
    // =========================================================================

    /// Writes the low `width` bytes of `value`.
    ///
    /// # Errors
    ///
    /// Overflow, bit mode, or an order not defined for `width`.
    pub fn write_sized(
        &mut self,
        width: usize,
        value: u64,
        transform: Transform,
        order: ByteOrder,
    ) -> EncodeResult<()> {
        if !order.supports(width) {
            return Err(EncodeError::UnsupportedByteOrder { order, width });
        }
        self.ensure(width)?;
        for i in 0..width {
            let significance = order.significance(width, i);
            let byte = (value >> (8 * significance)) as u8;
            self.data.push(if significance == 0 {
                transform.apply(byte)
            } else {
                byte
            });
        }
        Ok(())
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Overflow or bit mode.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> EncodeResult<()> {
        self.write_u8_with(value, Transform::Plain)
    }

    /// Writes one transformed byte.
    ///
    /// # Errors
    ///
    /// Overflow or bit mode.
    #[inline]
    pub fn write_u8_with(&mut self, value: u8, transform: Transform) -> EncodeResult<()> {
        self.write_sized(1, u64::from(value), transform, ByteOrder::Big)
    }

    /// Writes a big-endian short.
    ///
    /// # Errors
    ///
    /// Overflow or bit mode.
    #[inline]
    pub fn write_u16(&mut self, value: u16) -> EncodeResult<()> {
        self.write_u16_with(value, Transform::Plain, ByteOrder::Big)
    }

    /// Writes a short with a transform and byte order.
    ///
    /// # Errors
    ///
    /// Overflow, bit mode, or a middle byte order.
    #[inline]
    pub fn write_u16_with(
        &mut self,
        value: u16,
        transform: Transform,
        order: ByteOrder,
    ) -> EncodeResult<()> {
        self.write_sized(2, u64::from(value), transform, order)
    }

    /// Writes a big-endian int.
    ///
    /// # Errors
    ///
    /// Overflow or bit mode.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> EncodeResult<()> {
        self.write_u32_with(value, Transform::Plain, ByteOrder::Big)
    }

    /// Writes an int with a transform and byte order.
    ///
    /// # Errors
    ///
    /// Overflow or bit mode.
    #[inline]
    pub fn write_u32_with(
        &mut self,
        value: u32,
        transform: Transform,
        order: ByteOrder,
    ) -> EncodeResult<()> {
        self.write_sized(4, u64::from(value), transform, order)
    }

    /// Writes a big-endian long.
    ///
    /// # Errors
    ///
    /// Overflow or bit mode.
    #[inline]
    pub fn write_u64(&mut self, value: u64) -> EncodeResult<()> {
        self.write_sized(8, value, Transform::Plain, ByteOrder::Big)
    }

    /// Writes a long with a transform and byte order.
    ///
    /// # Errors
    ///
    /// Overflow, bit mode, or a middle byte order.
    #[inline]
    pub fn write_u64_with(
        &mut self,
        value: u64,
        transform: Transform,
        order: ByteOrder,
    ) -> EncodeResult<()> {
        self.write_sized(8, value, transform, order)
    }

    /// Copies raw bytes.
    ///
    /// # Errors
    ///
    /// Overflow or bit mode.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> EncodeResult<()> {
        self.ensure(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Copies raw bytes in reverse order.
    ///
    /// # Errors
    ///
    /// Overflow or bit mode.
    pub fn write_bytes_reversed(&mut self, bytes: &[u8]) -> EncodeResult<()> {
        self.ensure(bytes.len())?;
        self.data.extend(bytes.iter().rev());
        Ok(())
    }

    /// Writes a newline-terminated string.
    ///
    /// # Errors
    ///
    /// Overflow, bit mode, or a string that contains the terminator.
    pub fn write_string(&mut self, text: &str) -> EncodeResult<()> {
        if let Some(index) = text.bytes().position(|b| b == STRING_TERMINATOR) {
            return Err(EncodeError::FieldOutOfRange {
                field: "string terminator position",
                value: index as i64,
            });
        }
        self.ensure(text.len() + 1)?;
        self.data.extend_from_slice(text.as_bytes());
        self.data.push(STRING_TERMINATOR);
        Ok(())
    }

    // =========================================================================
    // FRAMING
    // =========================================================================

    /// Writes `opcode` and reserves the 2-byte length placeholder.
    ///
    /// # Errors
    ///
    /// Overflow, bit mode, or a frame already open.
    pub fn begin_var_short(&mut self, opcode: u8) -> EncodeResult<()> {
        if self.frame_start.is_some() {
            return Err(EncodeError::FrameAlreadyOpen);
        }
        self.ensure(3)?;
        self.data.extend_from_slice(&[opcode, 0, 0]);
        self.frame_start = Some(self.data.len());
        Ok(())
    }

    /// Patches the placeholder with the payload length and returns it.
    ///
    /// # Errors
    ///
    /// No open frame, bit mode, or a payload above 65535 bytes.
    pub fn end_var_short(&mut self) -> EncodeResult<u16> {
        if self.bit_position.is_some() {
            return Err(EncodeError::InBitMode);
        }
        let start = self.frame_start.ok_or(EncodeError::NoOpenFrame)?;
        let size = self.data.len() - start;
        let length = u16::try_from(size).map_err(|_| EncodeError::FrameTooLong(size))?;
        self.data[start - 2..start].copy_from_slice(&length.to_be_bytes());
        self.frame_start = None;
        Ok(length)
    }

    // =========================================================================
    // BIT MODE
    // =========================================================================

    /// Switches to bit addressing at the current byte boundary.
    ///
    /// # Errors
    ///
    /// [`EncodeError::InBitMode`] if already open.
    pub fn start_bit_access(&mut self) -> EncodeResult<()> {
        if self.bit_position.is_some() {
            return Err(EncodeError::InBitMode);
        }
        self.bit_position = Some(self.data.len() * 8);
        Ok(())
    }

    /// Packs the low `count` bits of `value`, most significant first.
    ///
    /// Higher bits of `value` are ignored, so negative deltas can be passed
    /// as their two's complement.
    ///
    /// # Errors
    ///
    /// Not in bit mode, `count` outside 1..=32, or overflow.
    pub fn write_bits(&mut self, count: u32, value: u32) -> EncodeResult<()> {
        let position = self.bit_position.ok_or(EncodeError::NotInBitMode)?;
        if !(1..=32).contains(&count) {
            return Err(EncodeError::BitCount(count));
        }
        let end = position + count as usize;
        let needed = end.div_ceil(8);
        if needed > self.capacity {
            return Err(EncodeError::Overflow {
                requested: needed - self.data.len(),
                len: self.data.len(),
                capacity: self.capacity,
            });
        }
        self.data.resize(needed.max(self.data.len()), 0);

        let mut cursor = position;
        let mut remaining = count;
        while remaining > 0 {
            let used = (cursor & 7) as u32;
            let take = (8 - used).min(remaining);
            let shift = remaining - take;
            let chunk = ((u64::from(value) >> shift) & ((1u64 << take) - 1)) as u8;
            self.data[cursor >> 3] |= chunk << (8 - used - take);
            cursor += take as usize;
            remaining -= take;
        }
        self.bit_position = Some(end);
        Ok(())
    }

    /// Writes one bit.
    ///
    /// # Errors
    ///
    /// Not in bit mode or overflow.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) -> EncodeResult<()> {
        self.write_bits(1, u32::from(bit))
    }

    /// Pads to the next byte boundary and returns to byte mode. Returns the
    /// number of padding bits.
    ///
    /// # Errors
    ///
    /// [`EncodeError::NotInBitMode`] if bit access is not open.
    pub fn finish_bit_access(&mut self) -> EncodeResult<u32> {
        let position = self.bit_position.take().ok_or(EncodeError::NotInBitMode)?;
        Ok(((8 - position % 8) % 8) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::PacketReader;
    use proptest::prelude::*;

    #[test]
    fn test_transforms_touch_low_byte_only() {
        let mut buf = PacketBuffer::new(16);
        buf.write_u16_with(0x1234, Transform::A, ByteOrder::Big).unwrap();
        buf.write_u16_with(0x1234, Transform::C, ByteOrder::Little).unwrap();
        buf.write_u8_with(0x10, Transform::S).unwrap();
        assert_eq!(buf.as_slice(), &[0x12, 0xB4, 0xCC, 0x12, 0x70]);
    }

    #[test]
    fn test_middle_orders() {
        let mut buf = PacketBuffer::new(16);
        buf.write_u32_with(0x0102_0304, Transform::Plain, ByteOrder::Middle)
            .unwrap();
        buf.write_u32_with(0x0102_0304, Transform::Plain, ByteOrder::InverseMiddle)
            .unwrap();
        assert_eq!(buf.as_slice(), &[3, 4, 1, 2, 2, 1, 4, 3]);
        assert_eq!(
            buf.write_u16_with(1, Transform::Plain, ByteOrder::Middle),
            Err(EncodeError::UnsupportedByteOrder {
                order: ByteOrder::Middle,
                width: 2
            })
        );
    }

    #[test]
    fn test_bits_span_bytes() {
        let mut buf = PacketBuffer::new(16);
        buf.start_bit_access().unwrap();
        buf.write_bit(true).unwrap();
        buf.write_bits(2, 3).unwrap();
        buf.write_bits(11, 2047).unwrap();
        assert_eq!(buf.finish_bit_access().unwrap(), 2);
        assert_eq!(buf.as_slice(), &[0xFF, 0xFC]);
    }

    #[test]
    fn test_negative_delta_is_masked() {
        let mut buf = PacketBuffer::new(4);
        buf.start_bit_access().unwrap();
        buf.write_bits(5, (-1i32) as u32).unwrap();
        buf.finish_bit_access().unwrap();
        assert_eq!(buf.as_slice(), &[0xF8]);
    }

    #[test]
    fn test_modes_do_not_mix() {
        let mut buf = PacketBuffer::new(16);
        assert_eq!(buf.write_bit(true), Err(EncodeError::NotInBitMode));
        buf.start_bit_access().unwrap();
        assert_eq!(buf.write_u8(1), Err(EncodeError::InBitMode));
        assert_eq!(buf.write_bits(0, 0), Err(EncodeError::BitCount(0)));
        assert_eq!(buf.write_bits(33, 0), Err(EncodeError::BitCount(33)));
    }

    #[test]
    fn test_var_short_framing() {
        let mut buf = PacketBuffer::new(64);
        buf.begin_var_short(81).unwrap();
        buf.write_bytes(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(buf.end_var_short().unwrap(), 5);
        assert_eq!(buf.as_slice(), &[81, 0, 5, 1, 2, 3, 4, 5]);
        assert_eq!(buf.end_var_short(), Err(EncodeError::NoOpenFrame));
    }

    #[test]
    fn test_overflow_leaves_buffer_untouched() {
        let mut buf = PacketBuffer::new(3);
        buf.write_u16(0xABCD).unwrap();
        let before = buf.as_slice().to_vec();
        assert!(matches!(buf.write_u16(1), Err(EncodeError::Overflow { .. })));
        assert!(matches!(buf.write_string("ab"), Err(EncodeError::Overflow { .. })));
        assert_eq!(buf.as_slice(), before.as_slice());

        buf.write_u8(0).unwrap();
        buf.clear();
        buf.start_bit_access().unwrap();
        buf.write_bits(24, 0xFFFFFF).unwrap();
        assert!(matches!(buf.write_bit(true), Err(EncodeError::Overflow { .. })));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_string_rejects_terminator() {
        let mut buf = PacketBuffer::new(16);
        assert!(buf.write_string("a\nb").is_err());
        buf.write_string("hi").unwrap();
        assert_eq!(buf.as_slice(), b"hi\n");
    }

    proptest! {
        #[test]
        fn prop_value_round_trip(
            value in any::<u64>(),
            transform in prop::sample::select(Transform::ALL.to_vec()),
            order in prop::sample::select(ByteOrder::ALL.to_vec()),
            width in prop::sample::select(vec![1usize, 2, 4, 8]),
        ) {
            prop_assume!(order.supports(width));
            let mask = if width == 8 { u64::MAX } else { (1u64 << (8 * width)) - 1 };
            let mut buf = PacketBuffer::new(8);
            buf.write_sized(width, value, transform, order).unwrap();
            prop_assert_eq!(buf.len(), width);

            let mut reader = PacketReader::new(buf.as_slice());
            prop_assert_eq!(reader.read_sized(width, transform, order).unwrap(), value & mask);
        }

        #[test]
        fn prop_bits_align_and_round_trip(fields in prop::collection::vec((1u32..=32, any::<u32>()), 1..40)) {
            let mut buf = PacketBuffer::new(512);
            buf.start_bit_access().unwrap();
            for &(count, value) in &fields {
                buf.write_bits(count, value).unwrap();
            }
            let total: u32 = fields.iter().map(|&(count, _)| count).sum();
            let padding = buf.finish_bit_access().unwrap();
            prop_assert_eq!((total + padding) % 8, 0);
            prop_assert_eq!(buf.len() as u32 * 8, total + padding);

            let mut reader = PacketReader::new(buf.as_slice());
            reader.start_bit_access().unwrap();
            for &(count, value) in &fields {
                let mask = if count == 32 { u32::MAX } else { (1u32 << count) - 1 };
                prop_assert_eq!(reader.read_bits(count).unwrap(), value & mask);
            }
        }
    }
}
