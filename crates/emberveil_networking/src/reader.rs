//! # Packet Reader
//!
//! Inverse of [`crate::PacketBuffer`]. The server never reads update packets;
//! the reader exists for tests, replay tooling and the simulation binary.

use crate::buffer::{ByteOrder, Transform, STRING_TERMINATOR};
use crate::error::{DecodeError, DecodeResult};

/// Cursor over a written packet.
#[derive(Clone, Debug)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
    bit_position: Option<usize>,
}

impl<'a> PacketReader<'a> {
    /// Starts reading at the first byte.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            bit_position: None,
        }
    }

    /// Current byte offset.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take(&mut self, requested: usize) -> DecodeResult<&'a [u8]> {
        if self.bit_position.is_some() {
            return Err(DecodeError::InBitMode);
        }
        if requested > self.remaining() {
            return Err(DecodeError::Underflow {
                requested,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.position..self.position + requested];
        self.position += requested;
        Ok(slice)
    }

    /// Reads a `width`-byte value written with `transform` and `order`.
    ///
    /// # Errors
    ///
    /// Underflow, bit mode, or an order not defined for `width`.
    pub fn read_sized(
        &mut self,
        width: usize,
        transform: Transform,
        order: ByteOrder,
    ) -> DecodeResult<u64> {
        if !order.supports(width) {
            return Err(DecodeError::UnsupportedByteOrder { order, width });
        }
        let bytes = self.take(width)?;
        let mut value = 0u64;
        for (i, &byte) in bytes.iter().enumerate() {
            let significance = order.significance(width, i);
            let byte = if significance == 0 {
                transform.apply(byte)
            } else {
                byte
            };
            value |= u64::from(byte) << (8 * significance);
        }
        Ok(value)
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Underflow or bit mode.
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        self.read_u8_with(Transform::Plain)
    }

    /// Reads one transformed byte.
    ///
    /// # Errors
    ///
    /// Underflow or bit mode.
    pub fn read_u8_with(&mut self, transform: Transform) -> DecodeResult<u8> {
        Ok(self.read_sized(1, transform, ByteOrder::Big)? as u8)
    }

    /// Reads a big-endian short.
    ///
    /// # Errors
    ///
    /// Underflow or bit mode.
    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        self.read_u16_with(Transform::Plain, ByteOrder::Big)
    }

    /// Reads a short with a transform and byte order.
    ///
    /// # Errors
    ///
    /// Underflow, bit mode, or a middle byte order.
    pub fn read_u16_with(&mut self, transform: Transform, order: ByteOrder) -> DecodeResult<u16> {
        Ok(self.read_sized(2, transform, order)? as u16)
    }

    /// Reads an int with a transform and byte order.
    ///
    /// # Errors
    ///
    /// Underflow or bit mode.
    pub fn read_u32_with(&mut self, transform: Transform, order: ByteOrder) -> DecodeResult<u32> {
        Ok(self.read_sized(4, transform, order)? as u32)
    }

    /// Reads a big-endian long.
    ///
    /// # Errors
    ///
    /// Underflow or bit mode.
    pub fn read_u64(&mut self) -> DecodeResult<u64> {
        self.read_sized(8, Transform::Plain, ByteOrder::Big)
    }

    /// Borrows the next `count` bytes.
    ///
    /// # Errors
    ///
    /// Underflow or bit mode.
    pub fn read_bytes(&mut self, count: usize) -> DecodeResult<&'a [u8]> {
        self.take(count)
    }

    /// Reads `count` bytes written with `write_bytes_reversed`.
    ///
    /// # Errors
    ///
    /// Underflow or bit mode.
    pub fn read_bytes_reversed(&mut self, count: usize) -> DecodeResult<Vec<u8>> {
        Ok(self.take(count)?.iter().rev().copied().collect())
    }

    /// Reads a newline-terminated string.
    ///
    /// # Errors
    ///
    /// Underflow when the terminator is missing, or bit mode.
    pub fn read_string(&mut self) -> DecodeResult<String> {
        if self.bit_position.is_some() {
            return Err(DecodeError::InBitMode);
        }
        let rest = &self.data[self.position..];
        let end = rest
            .iter()
            .position(|&b| b == STRING_TERMINATOR)
            .ok_or(DecodeError::Underflow {
                requested: rest.len() + 1,
                remaining: rest.len(),
            })?;
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.position += end + 1;
        Ok(text)
    }

    /// Reads the opcode and the 2-byte length written by var-short framing.
    ///
    /// # Errors
    ///
    /// Underflow, or a different opcode than `expected`.
    pub fn read_var_short_header(&mut self, expected: u8) -> DecodeResult<u16> {
        let found = self.read_u8()?;
        if found != expected {
            return Err(DecodeError::UnexpectedOpcode { expected, found });
        }
        self.read_u16()
    }

    /// Switches to bit addressing at the current byte.
    ///
    /// # Errors
    ///
    /// [`DecodeError::InBitMode`] if already open.
    pub fn start_bit_access(&mut self) -> DecodeResult<()> {
        if self.bit_position.is_some() {
            return Err(DecodeError::InBitMode);
        }
        self.bit_position = Some(self.position * 8);
        Ok(())
    }

    /// Reads `count` bits, most significant first.
    ///
    /// # Errors
    ///
    /// Not in bit mode, `count` outside 1..=32, or underflow.
    pub fn read_bits(&mut self, count: u32) -> DecodeResult<u32> {
        let mut cursor = self.bit_position.ok_or(DecodeError::NotInBitMode)?;
        if !(1..=32).contains(&count) {
            return Err(DecodeError::BitCount(count));
        }
        let end = cursor + count as usize;
        if end > self.data.len() * 8 {
            return Err(DecodeError::Underflow {
                requested: end.div_ceil(8) - cursor / 8,
                remaining: self.data.len() - cursor / 8,
            });
        }

        let mut value = 0u64;
        while cursor < end {
            let used = cursor & 7;
            let take = (8 - used).min(end - cursor);
            let byte = u64::from(self.data[cursor >> 3]);
            let chunk = (byte >> (8 - used - take)) & ((1u64 << take) - 1);
            value = (value << take) | chunk;
            cursor += take;
        }
        self.bit_position = Some(end);
        Ok(value as u32)
    }

    /// Reads one bit.
    ///
    /// # Errors
    ///
    /// Not in bit mode or underflow.
    pub fn read_bit(&mut self) -> DecodeResult<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Skips the padding and returns to byte mode.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NotInBitMode`] if bit access is not open.
    pub fn finish_bit_access(&mut self) -> DecodeResult<()> {
        let cursor = self.bit_position.take().ok_or(DecodeError::NotInBitMode)?;
        self.position = cursor.div_ceil(8);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PacketBuffer;

    #[test]
    fn test_reads_mixed_packet() {
        let mut buf = PacketBuffer::new(64);
        buf.begin_var_short(81).unwrap();
        buf.start_bit_access().unwrap();
        buf.write_bits(8, 3).unwrap();
        buf.write_bit(true).unwrap();
        buf.finish_bit_access().unwrap();
        buf.write_u16_with(0x0102, Transform::A, ByteOrder::Little).unwrap();
        buf.write_string("hello").unwrap();
        buf.write_bytes_reversed(&[1, 2, 3]).unwrap();
        buf.end_var_short().unwrap();

        let mut reader = PacketReader::new(buf.as_slice());
        assert_eq!(reader.read_var_short_header(81).unwrap() as usize, buf.len() - 3);
        reader.start_bit_access().unwrap();
        assert_eq!(reader.read_bits(8).unwrap(), 3);
        assert!(reader.read_bit().unwrap());
        reader.finish_bit_access().unwrap();
        assert_eq!(
            reader.read_u16_with(Transform::A, ByteOrder::Little).unwrap(),
            0x0102
        );
        assert_eq!(reader.read_string().unwrap(), "hello");
        assert_eq!(reader.read_bytes_reversed(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_underflow_and_modes() {
        let mut reader = PacketReader::new(&[1]);
        assert!(matches!(reader.read_u16(), Err(DecodeError::Underflow { .. })));
        assert_eq!(reader.read_bit(), Err(DecodeError::NotInBitMode));
        reader.start_bit_access().unwrap();
        assert_eq!(reader.read_u8(), Err(DecodeError::InBitMode));
        assert!(matches!(reader.read_bits(9), Err(DecodeError::Underflow { .. })));
    }

    #[test]
    fn test_wrong_opcode() {
        let mut reader = PacketReader::new(&[65, 0, 0]);
        assert_eq!(
            reader.read_var_short_header(81),
            Err(DecodeError::UnexpectedOpcode {
                expected: 81,
                found: 65
            })
        );
    }
}
