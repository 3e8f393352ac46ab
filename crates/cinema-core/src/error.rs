//! Error types for the packet codec and the protocol layer.

use thiserror::Error;

/// Result type for codec operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors raised by [`PacketBuf`](crate::wire::PacketBuf) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    /// A read window extends past the received datagram length.
    #[error("read of {len} bytes at offset {offset} exceeds datagram length {available}")]
    OutOfBounds {
        /// Start of the requested window.
        offset: usize,
        /// Length of the requested window.
        len: usize,
        /// Received datagram length.
        available: usize,
    },

    /// An append does not fit into the fixed datagram buffer.
    #[error("write of {len} bytes overflows the packet buffer ({remaining} bytes free)")]
    Overflow {
        /// Length of the rejected write.
        len: usize,
        /// Capacity left before the write.
        remaining: usize,
    },
}

/// Reasons a received datagram is not a well-formed request.
///
/// Every variant leads to the same outcome: the datagram is dropped
/// without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The datagram carries no opcode byte.
    #[error("empty datagram")]
    Empty,

    /// The opcode byte is not a known request opcode.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    /// The datagram length does not exactly match the opcode's format.
    #[error("opcode {opcode} requires exactly {expected} bytes, got {actual}")]
    WrongLength {
        /// The request opcode.
        opcode: u8,
        /// Required datagram length for that opcode.
        expected: usize,
        /// Received datagram length.
        actual: usize,
    },

    /// A field read failed its bounds check.
    #[error(transparent)]
    Malformed(#[from] WireError),
}
