//! # Networking Error Types
//!
//! Encoding, decoding, configuration and per-observer sync failures.

use emberveil_core::{ConnectionId, WorldError};
use thiserror::Error;

use crate::buffer::ByteOrder;

/// Errors raised while writing a packet.
///
/// Every write checks before it mutates, so a buffer that returned one of
/// these still holds exactly the bytes it had before the call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The write would exceed the buffer's hard capacity.
    #[error("buffer overflow: {requested} more bytes with {len}/{capacity} used")]
    Overflow {
        /// Bytes the write needed.
        requested: usize,
        /// Bytes already written.
        len: usize,
        /// Hard capacity.
        capacity: usize,
    },

    /// A byte-mode write while bit access is open.
    #[error("byte write while bit access is open")]
    InBitMode,

    /// A bit-mode write without open bit access.
    #[error("bit write without bit access")]
    NotInBitMode,

    /// Middle orders only exist for 4-byte values.
    #[error("{order:?} byte order is not defined for {width}-byte values")]
    UnsupportedByteOrder {
        /// Requested order.
        order: ByteOrder,
        /// Value width in bytes.
        width: usize,
    },

    /// `write_bits` takes 1..=32 bits.
    #[error("bit count {0} outside 1..=32")]
    BitCount(u32),

    /// `end_var_short` without a matching `begin_var_short`.
    #[error("no var-short frame is open")]
    NoOpenFrame,

    /// `begin_var_short` while a frame is already open.
    #[error("a var-short frame is already open")]
    FrameAlreadyOpen,

    /// The payload does not fit the 16-bit length field.
    #[error("var-short payload of {0} bytes exceeds 65535")]
    FrameTooLong(usize),

    /// A dirty flag is raised but its payload is missing.
    #[error("{0} flag raised without a payload")]
    MissingPayload(&'static str),

    /// A value does not fit the field it is written to.
    #[error("{field} value {value} does not fit its wire field")]
    FieldOutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: i64,
    },
}

/// Errors raised while reading a packet back.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes (or bits) left.
    #[error("buffer underflow: {requested} bytes requested, {remaining} remaining")]
    Underflow {
        /// Bytes the read needed.
        requested: usize,
        /// Bytes left.
        remaining: usize,
    },

    /// A byte-mode read while bit access is open.
    #[error("byte read while bit access is open")]
    InBitMode,

    /// A bit-mode read without open bit access.
    #[error("bit read without bit access")]
    NotInBitMode,

    /// Middle orders only exist for 4-byte values.
    #[error("{order:?} byte order is not defined for {width}-byte values")]
    UnsupportedByteOrder {
        /// Requested order.
        order: ByteOrder,
        /// Value width in bytes.
        width: usize,
    },

    /// `read_bits` takes 1..=32 bits.
    #[error("bit count {0} outside 1..=32")]
    BitCount(u32),

    /// The opcode byte did not match.
    #[error("expected opcode {expected}, found {found}")]
    UnexpectedOpcode {
        /// Opcode the caller expected.
        expected: u8,
        /// Opcode in the packet.
        found: u8,
    },

    /// A movement sector that cannot be produced by the encoder.
    #[error("malformed movement sector: {0}")]
    MalformedSector(&'static str),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for [`crate::SyncConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field is outside the range the protocol can carry.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Failure of one observer's update cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The packet could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The world model rejected an operation.
    #[error(transparent)]
    World(#[from] WorldError),

    /// The connection table has no such session.
    #[error("unknown connection {0:?}")]
    UnknownConnection(ConnectionId),
}

/// Result type for packet writes.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Result type for packet reads.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for update cycles and world commands.
pub type SyncResult<T> = Result<T, SyncError>;
