//! Request parsing and response encoding for the reservation protocol.
//!
//! Every request and reply is a single datagram. Multi-byte integers
//! are big-endian; strings are raw contiguous bytes without a
//! terminator. Requests have exact lengths per opcode; anything that
//! deviates is rejected during parsing and never reaches a handler.

use std::fmt;

use crate::error::{DecodeError, WireResult};
use crate::wire::{PacketBuf, MAX_DATAGRAM};

/// Request and response opcodes, each the first byte of its datagram.
pub mod opcode {
    /// Request: list all events and their remaining tickets.
    pub const GET_EVENTS: u8 = 1;
    /// Response to [`GET_EVENTS`].
    pub const EVENTS: u8 = 2;
    /// Request: reserve tickets for an event.
    pub const GET_RESERVATION: u8 = 3;
    /// Response to [`GET_RESERVATION`].
    pub const RESERVATION: u8 = 4;
    /// Request: redeem a reservation for ticket codes.
    pub const GET_TICKETS: u8 = 5;
    /// Response to [`GET_TICKETS`].
    pub const TICKETS: u8 = 6;
    /// Response: semantic rejection, echoing the offending id.
    pub const BAD_REQUEST: u8 = 255;
}

/// Cookie length on the wire.
pub const COOKIE_LEN: usize = 48;
/// Ticket-code length on the wire.
pub const TICKET_CODE_LEN: usize = 7;

/// Exact length of a GET_EVENTS request.
pub const GET_EVENTS_LEN: usize = 1;
/// Exact length of a GET_RESERVATION request: opcode, event id, count.
pub const GET_RESERVATION_LEN: usize = 1 + 4 + 2;
/// Exact length of a GET_TICKETS request: opcode, reservation id, cookie.
pub const GET_TICKETS_LEN: usize = 1 + 4 + COOKIE_LEN;

/// Fixed prefix of a TICKETS response: opcode, reservation id, count.
const TICKETS_HEADER_LEN: usize = 1 + 4 + 2;

/// Most tickets a single reservation may hold: the largest count whose
/// TICKETS response still fits in one datagram.
pub const MAX_TICKETS_PER_RESERVATION: u16 =
    ((MAX_DATAGRAM - TICKETS_HEADER_LEN) / TICKET_CODE_LEN) as u16;

/// A reservation's bearer secret: 48 opaque bytes, printable ASCII
/// (33–126) by construction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cookie([u8; COOKIE_LEN]);

impl Cookie {
    /// Wraps raw cookie bytes.
    #[must_use]
    pub fn new(bytes: [u8; COOKIE_LEN]) -> Self {
        Self(bytes)
    }

    /// The wire representation.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; COOKIE_LEN] {
        &self.0
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cookie({})", String::from_utf8_lossy(&self.0))
    }
}

/// A 7-character ticket identifier over `[0-9A-Z]`, unique within a
/// process run.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TicketCode([u8; TICKET_CODE_LEN]);

impl TicketCode {
    /// Wraps raw ticket-code bytes.
    #[must_use]
    pub fn new(bytes: [u8; TICKET_CODE_LEN]) -> Self {
        Self(bytes)
    }

    /// The wire representation.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; TICKET_CODE_LEN] {
        &self.0
    }
}

impl fmt::Debug for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TicketCode({})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The alphabet is ASCII alphanumeric, so this never fails.
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// A validated request with all fields copied out of the receive
/// buffer, so the buffer can be overwritten with the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// List events in catalog order.
    GetEvents,
    /// Reserve `ticket_count` tickets for `event_id`.
    GetReservation {
        /// Catalog ordinal of the event.
        event_id: u32,
        /// Requested number of tickets.
        ticket_count: u16,
    },
    /// Redeem reservation `reservation_id` with its cookie.
    GetTickets {
        /// Id returned by a prior reservation.
        reservation_id: u32,
        /// The bearer secret issued with the reservation.
        cookie: Cookie,
    },
}

impl Request {
    /// Parses a received datagram.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for an empty datagram, an unknown
    /// opcode, or a length that is not exactly the opcode's format
    /// length. The caller drops such datagrams without replying.
    pub fn parse(buf: &PacketBuf) -> Result<Self, DecodeError> {
        let opcode = buf.read_u8(0).map_err(|_| DecodeError::Empty)?;
        match opcode {
            opcode::GET_EVENTS => {
                expect_len(buf, opcode, GET_EVENTS_LEN)?;
                Ok(Self::GetEvents)
            }
            opcode::GET_RESERVATION => {
                expect_len(buf, opcode, GET_RESERVATION_LEN)?;
                Ok(Self::GetReservation {
                    event_id: buf.read_u32(1)?,
                    ticket_count: buf.read_u16(5)?,
                })
            }
            opcode::GET_TICKETS => {
                expect_len(buf, opcode, GET_TICKETS_LEN)?;
                Ok(Self::GetTickets {
                    reservation_id: buf.read_u32(1)?,
                    cookie: Cookie::new(buf.read_array(5)?),
                })
            }
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }
}

fn expect_len(buf: &PacketBuf, opcode: u8, expected: usize) -> Result<(), DecodeError> {
    if buf.len() != expected {
        return Err(DecodeError::WrongLength {
            opcode,
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// One event as packed into an EVENTS response.
#[derive(Debug, Clone, Copy)]
pub struct EventRecord<'a> {
    /// Catalog ordinal.
    pub event_id: u32,
    /// Tickets still available.
    pub remaining: u16,
    /// Raw description bytes, at most 255.
    pub description: &'a [u8],
}

/// Encodes an EVENTS response, packing records in iteration order.
///
/// Records that would push the response past the datagram ceiling are
/// left out, together with everything after them; at minimum the
/// opcode byte is encoded. Returns the number of records packed.
///
/// # Errors
///
/// Returns [`crate::WireError`] only if `out` cannot hold the opcode
/// byte, which cannot happen on a cleared buffer.
pub fn encode_events<'a, I>(out: &mut PacketBuf, events: I) -> WireResult<usize>
where
    I: IntoIterator<Item = EventRecord<'a>>,
{
    out.write_u8(opcode::EVENTS)?;
    let mut packed = 0;
    for event in events {
        debug_assert!(event.description.len() <= u8::MAX as usize);
        let record_len = 4 + 2 + 1 + event.description.len();
        if record_len > out.remaining() {
            break;
        }
        out.write_u32(event.event_id)?;
        out.write_u16(event.remaining)?;
        out.write_u8(event.description.len() as u8)?;
        out.write_bytes(event.description)?;
        packed += 1;
    }
    Ok(packed)
}

/// Encodes a RESERVATION response.
///
/// # Errors
///
/// Returns [`crate::WireError`] if the fixed 67-byte layout does not
/// fit, which cannot happen on a cleared buffer.
pub fn encode_reservation(
    out: &mut PacketBuf,
    reservation_id: u32,
    event_id: u32,
    ticket_count: u16,
    cookie: &Cookie,
    expires_at: u64,
) -> WireResult<()> {
    out.write_u8(opcode::RESERVATION)?;
    out.write_u32(reservation_id)?;
    out.write_u32(event_id)?;
    out.write_u16(ticket_count)?;
    out.write_bytes(cookie.as_bytes())?;
    out.write_u64(expires_at)
}

/// Encodes a TICKETS response carrying `codes` in issue order.
///
/// # Errors
///
/// Returns [`crate::WireError`] if the codes exceed the datagram
/// ceiling; reservations are capped at
/// [`MAX_TICKETS_PER_RESERVATION`], so this cannot happen for codes
/// issued by the engine.
pub fn encode_tickets(out: &mut PacketBuf, reservation_id: u32, codes: &[TicketCode]) -> WireResult<()> {
    out.write_u8(opcode::TICKETS)?;
    out.write_u32(reservation_id)?;
    out.write_u16(codes.len() as u16)?;
    for code in codes {
        out.write_bytes(code.as_bytes())?;
    }
    Ok(())
}

/// Encodes a BAD_REQUEST response echoing the offending id.
///
/// # Errors
///
/// Returns [`crate::WireError`] if the 5-byte layout does not fit,
/// which cannot happen on a cleared buffer.
pub fn encode_bad_request(out: &mut PacketBuf, rejected_id: u32) -> WireResult<()> {
    out.write_u8(opcode::BAD_REQUEST)?;
    out.write_u32(rejected_id)
}
