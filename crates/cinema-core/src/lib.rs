//! 🏗 Wire-level building blocks of the cinema ticket server.
//!
//! Shared by the server and the test harness: the reusable packet
//! byte codec, the protocol opcodes and formats, and the value types
//! that appear on the wire.
#![warn(missing_docs)]

mod error;
pub mod protocol;
pub mod wire;

pub use error::{DecodeError, WireError, WireResult};
pub use protocol::{Cookie, Request, TicketCode, COOKIE_LEN, TICKET_CODE_LEN};
pub use wire::{PacketBuf, MAX_DATAGRAM};
