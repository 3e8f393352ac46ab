//! Integration-test harness for the cinema ticket server.
//!
//! Spins up the real serving loop on an ephemeral localhost port and
//! talks to it over actual UDP datagrams, decoding replies with the
//! same codec the server encodes them with.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use cinema_core::protocol::opcode;
use cinema_core::{PacketBuf, COOKIE_LEN, TICKET_CODE_LEN};
use cinema_engine::{Catalog, Engine, ReservationStore};
use eyre::{bail, eyre, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// How long a client waits before concluding the server stayed silent.
const SILENCE_WINDOW: Duration = Duration::from_millis(300);
/// How long a client waits for a reply it expects.
const REPLY_WINDOW: Duration = Duration::from_secs(5);

/// Builds and starts an in-process test server.
pub struct TestServerBuilder {
    entries: Vec<(Vec<u8>, u16)>,
    timeout: u64,
    rng_seed: u64,
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestServerBuilder {
    /// A server with an empty catalog and the default 5-second
    /// reservation timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            timeout: 5,
            rng_seed: 0xC1EA,
        }
    }

    /// Appends an event to the catalog.
    #[must_use]
    pub fn with_event(mut self, description: &str, tickets: u16) -> Self {
        self.entries.push((description.as_bytes().to_vec(), tickets));
        self
    }

    /// The standard three-event catalog most scenarios use.
    #[must_use]
    pub fn with_example_catalog(self) -> Self {
        self.with_event("fajny koncert", 123)
            .with_event("film o kotach", 32)
            .with_event("ZOO", 0)
    }

    /// Sets the reservation timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    /// Binds an ephemeral localhost port and runs the serving loop on
    /// a background thread.
    ///
    /// # Errors
    ///
    /// Returns a report if the catalog is invalid or the bind fails.
    pub fn start(self) -> Result<TestServer> {
        let catalog = Catalog::from_entries(self.entries)?;
        let store = ReservationStore::with_rng(StdRng::seed_from_u64(self.rng_seed));
        let engine = Engine::with_store(catalog, store, self.timeout);

        let mut server = cinema_server::Server::bind((Ipv4Addr::LOCALHOST, 0), engine)?;
        let addr = server.local_addr()?;
        // The loop blocks in recv for the rest of the test process;
        // the thread goes away with it.
        std::thread::spawn(move || {
            let _ = server.run();
        });
        Ok(TestServer { addr })
    }
}

/// A running test server.
pub struct TestServer {
    addr: SocketAddr,
}

impl TestServer {
    /// The server's UDP address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Opens a fresh client socket talking to this server.
    ///
    /// # Errors
    ///
    /// Returns a report if the client socket cannot be bound.
    pub async fn client(&self) -> Result<Client> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        socket.connect(self.addr).await?;
        Ok(Client { socket })
    }
}

/// One event record from an EVENTS reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEntry {
    /// Catalog ordinal.
    pub event_id: u32,
    /// Tickets still available.
    pub remaining: u16,
    /// Raw description bytes.
    pub description: Vec<u8>,
}

/// A RESERVATION reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationReply {
    /// Issued reservation id.
    pub reservation_id: u32,
    /// The reserved event.
    pub event_id: u32,
    /// Number of tickets promised.
    pub ticket_count: u16,
    /// Bearer secret for redemption.
    pub cookie: [u8; COOKIE_LEN],
    /// Expiration instant, seconds since the Unix epoch.
    pub expires_at: u64,
}

/// A TICKETS reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketsReply {
    /// The redeemed reservation.
    pub reservation_id: u32,
    /// Issued ticket codes, in issue order.
    pub codes: Vec<String>,
}

/// Any decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// EVENTS listing.
    Events(Vec<EventEntry>),
    /// Successful reservation.
    Reservation(ReservationReply),
    /// Successful redemption.
    Tickets(TicketsReply),
    /// Semantic rejection echoing the offending id.
    BadRequest(u32),
}

impl Reply {
    /// Unwraps an EVENTS reply.
    ///
    /// # Errors
    ///
    /// Returns a report naming the actual reply kind.
    pub fn into_events(self) -> Result<Vec<EventEntry>> {
        match self {
            Self::Events(events) => Ok(events),
            other => Err(eyre!("expected EVENTS, got {other:?}")),
        }
    }

    /// Unwraps a RESERVATION reply.
    ///
    /// # Errors
    ///
    /// Returns a report naming the actual reply kind.
    pub fn into_reservation(self) -> Result<ReservationReply> {
        match self {
            Self::Reservation(reservation) => Ok(reservation),
            other => Err(eyre!("expected RESERVATION, got {other:?}")),
        }
    }

    /// Unwraps a TICKETS reply.
    ///
    /// # Errors
    ///
    /// Returns a report naming the actual reply kind.
    pub fn into_tickets(self) -> Result<TicketsReply> {
        match self {
            Self::Tickets(tickets) => Ok(tickets),
            other => Err(eyre!("expected TICKETS, got {other:?}")),
        }
    }

    /// Unwraps a BAD_REQUEST reply.
    ///
    /// # Errors
    ///
    /// Returns a report naming the actual reply kind.
    pub fn into_bad_request(self) -> Result<u32> {
        match self {
            Self::BadRequest(id) => Ok(id),
            other => Err(eyre!("expected BAD_REQUEST, got {other:?}")),
        }
    }
}

/// A UDP protocol client for one server.
pub struct Client {
    socket: UdpSocket,
}

impl Client {
    /// Sends raw datagram bytes without waiting for anything.
    ///
    /// # Errors
    ///
    /// Returns a report on socket failure.
    pub async fn send_raw(&self, payload: &[u8]) -> Result<()> {
        self.socket.send(payload).await?;
        Ok(())
    }

    /// Receives and decodes the next reply.
    ///
    /// # Errors
    ///
    /// Returns a report if nothing arrives within the reply window or
    /// the datagram does not decode as any reply kind.
    pub async fn recv_reply(&self) -> Result<Reply> {
        let bytes = self.recv_raw(REPLY_WINDOW).await?.ok_or_else(|| {
            eyre!("expected a reply datagram, got none within {REPLY_WINDOW:?}")
        })?;
        decode_reply(&bytes)
    }

    /// Receives the next datagram verbatim, or [`None`] on timeout.
    ///
    /// # Errors
    ///
    /// Returns a report on socket failure.
    pub async fn recv_raw(&self, window: Duration) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; cinema_core::MAX_DATAGRAM];
        match timeout(window, self.socket.recv(&mut buf)).await {
            Ok(received) => {
                let len = received?;
                buf.truncate(len);
                Ok(Some(buf))
            }
            Err(_) => Ok(None),
        }
    }

    /// Asserts the server sends nothing within the silence window.
    ///
    /// # Errors
    ///
    /// Returns a report if a datagram arrives after all.
    pub async fn expect_silence(&self) -> Result<()> {
        if let Some(bytes) = self.recv_raw(SILENCE_WINDOW).await? {
            bail!("expected the server to stay silent, got {bytes:02X?}");
        }
        Ok(())
    }

    /// Sends `payload` and decodes the reply.
    ///
    /// # Errors
    ///
    /// Returns a report on socket failure, silence, or an undecodable
    /// reply.
    pub async fn request(&self, payload: &[u8]) -> Result<Reply> {
        self.send_raw(payload).await?;
        self.recv_reply().await
    }

    /// Lists all events.
    ///
    /// # Errors
    ///
    /// Returns a report if the reply is missing or not EVENTS.
    pub async fn get_events(&self) -> Result<Vec<EventEntry>> {
        self.request(&[opcode::GET_EVENTS]).await?.into_events()
    }

    /// Requests a reservation; the reply may be RESERVATION or
    /// BAD_REQUEST.
    ///
    /// # Errors
    ///
    /// Returns a report on silence or an undecodable reply.
    pub async fn get_reservation(&self, event_id: u32, ticket_count: u16) -> Result<Reply> {
        let mut payload = vec![opcode::GET_RESERVATION];
        payload.extend_from_slice(&event_id.to_be_bytes());
        payload.extend_from_slice(&ticket_count.to_be_bytes());
        self.request(&payload).await
    }

    /// Requests redemption; the reply may be TICKETS or BAD_REQUEST.
    ///
    /// # Errors
    ///
    /// Returns a report on silence or an undecodable reply.
    pub async fn get_tickets(&self, reservation_id: u32, cookie: &[u8; COOKIE_LEN]) -> Result<Reply> {
        let mut payload = vec![opcode::GET_TICKETS];
        payload.extend_from_slice(&reservation_id.to_be_bytes());
        payload.extend_from_slice(cookie);
        self.request(&payload).await
    }
}

/// Decodes a reply datagram through the shared codec.
///
/// # Errors
///
/// Returns a report for an unknown reply opcode or a layout that does
/// not match its opcode.
pub fn decode_reply(bytes: &[u8]) -> Result<Reply> {
    let mut buf = PacketBuf::new();
    buf.load(bytes)?;
    let reply = match buf.read_u8(0)? {
        opcode::EVENTS => {
            let mut events = Vec::new();
            let mut offset = 1;
            while offset < buf.len() {
                let event_id = buf.read_u32(offset)?;
                let remaining = buf.read_u16(offset + 4)?;
                let desc_len = usize::from(buf.read_u8(offset + 6)?);
                let description = buf.read_bytes(offset + 7, desc_len)?.to_vec();
                events.push(EventEntry {
                    event_id,
                    remaining,
                    description,
                });
                offset += 7 + desc_len;
            }
            Reply::Events(events)
        }
        opcode::RESERVATION => {
            let reply = ReservationReply {
                reservation_id: buf.read_u32(1)?,
                event_id: buf.read_u32(5)?,
                ticket_count: buf.read_u16(9)?,
                cookie: buf.read_array(11)?,
                expires_at: buf.read_u64(11 + COOKIE_LEN)?,
            };
            if buf.len() != 19 + COOKIE_LEN {
                bail!("RESERVATION reply has length {}", buf.len());
            }
            Reply::Reservation(reply)
        }
        opcode::TICKETS => {
            let reservation_id = buf.read_u32(1)?;
            let count = buf.read_u16(5)?;
            let mut codes = Vec::with_capacity(usize::from(count));
            let mut offset = 7;
            for _ in 0..count {
                let code = buf.read_bytes(offset, TICKET_CODE_LEN)?;
                codes.push(String::from_utf8_lossy(code).into_owned());
                offset += TICKET_CODE_LEN;
            }
            if offset != buf.len() {
                bail!("TICKETS reply has {} trailing bytes", buf.len() - offset);
            }
            Reply::Tickets(TicketsReply {
                reservation_id,
                codes,
            })
        }
        opcode::BAD_REQUEST => {
            if buf.len() != 5 {
                bail!("BAD_REQUEST reply has length {}", buf.len());
            }
            Reply::BadRequest(buf.read_u32(1)?)
        }
        other => bail!("unknown reply opcode {other}"),
    };
    Ok(reply)
}
