//! 🎬 The reservation engine of the cinema ticket server.
//!
//! Owns all server state (catalog, reservation store, redemption
//! ledger, ticket-code sequence) and turns one parsed request into
//! exactly one encoded reply. Transport and parsing live elsewhere:
//! the server loop receives, prunes, parses, calls [`Engine::handle`]
//! and sends whatever was encoded.
#![warn(missing_docs)]

pub mod catalog;
pub mod codes;
pub mod ledger;
pub mod mint;
pub mod store;

use cinema_core::protocol::{self, EventRecord, MAX_TICKETS_PER_RESERVATION};
use cinema_core::{Cookie, PacketBuf, Request, WireResult};
use tracing::debug;

pub use catalog::{Catalog, CatalogError};
pub use codes::TicketCodeGen;
pub use ledger::RedemptionLedger;
pub use store::{Reservation, ReservationStore};

/// The reservation engine: all state behind the wire protocol.
pub struct Engine {
    catalog: Catalog,
    store: ReservationStore,
    ledger: RedemptionLedger,
    codes: TicketCodeGen,
    /// Reservation lifetime in seconds.
    timeout: u64,
}

impl Engine {
    /// Creates an engine over a loaded catalog with the given
    /// reservation timeout in seconds.
    #[must_use]
    pub fn new(catalog: Catalog, timeout: u64) -> Self {
        Self::with_store(catalog, ReservationStore::new(), timeout)
    }

    /// Like [`Engine::new`] with a caller-provided store; tests inject
    /// a store with a seeded rng.
    #[must_use]
    pub fn with_store(catalog: Catalog, store: ReservationStore, timeout: u64) -> Self {
        Self {
            catalog,
            store,
            ledger: RedemptionLedger::new(),
            codes: TicketCodeGen::new(),
            timeout,
        }
    }

    /// Destroys reservations that expired strictly before `now`,
    /// refunding their tickets.
    pub fn prune(&mut self, now: u64) {
        self.store.prune(&mut self.catalog, now);
    }

    /// Handles one request, writing exactly one reply into `out`.
    ///
    /// # Errors
    ///
    /// Returns a [`cinema_core::WireError`] if the reply cannot be
    /// encoded; every reply fits the datagram buffer by construction,
    /// so the caller treats this as an internal fault and drops the
    /// datagram.
    pub fn handle(&mut self, request: Request, now: u64, out: &mut PacketBuf) -> WireResult<()> {
        out.clear();
        match request {
            Request::GetEvents => self.handle_get_events(out),
            Request::GetReservation {
                event_id,
                ticket_count,
            } => self.handle_get_reservation(event_id, ticket_count, now, out),
            Request::GetTickets {
                reservation_id,
                cookie,
            } => self.handle_get_tickets(reservation_id, cookie, out),
        }
    }

    fn handle_get_events(&self, out: &mut PacketBuf) -> WireResult<()> {
        let records = self.catalog.iter().map(|(event_id, event)| EventRecord {
            event_id,
            remaining: event.remaining(),
            description: event.description(),
        });
        let packed = protocol::encode_events(out, records)?;
        if packed < self.catalog.len() {
            debug!(
                packed,
                total = self.catalog.len(),
                "events response truncated at the datagram ceiling"
            );
        }
        Ok(())
    }

    fn handle_get_reservation(
        &mut self,
        event_id: u32,
        ticket_count: u16,
        now: u64,
        out: &mut PacketBuf,
    ) -> WireResult<()> {
        let cap = self
            .catalog
            .get(event_id)
            .map(|event| event.remaining().min(MAX_TICKETS_PER_RESERVATION));
        match cap {
            Some(cap) if (1..=cap).contains(&ticket_count) => {
                let (reservation_id, reservation) =
                    self.store
                        .create(&mut self.catalog, event_id, ticket_count, now, self.timeout);
                protocol::encode_reservation(
                    out,
                    reservation_id,
                    event_id,
                    ticket_count,
                    &reservation.cookie,
                    reservation.expires_at,
                )
            }
            _ => {
                debug!(event_id, ticket_count, "rejecting reservation request");
                protocol::encode_bad_request(out, event_id)
            }
        }
    }

    fn handle_get_tickets(
        &mut self,
        reservation_id: u32,
        cookie: Cookie,
        out: &mut PacketBuf,
    ) -> WireResult<()> {
        let granted = match self.store.lookup(reservation_id) {
            Some(reservation) if reservation.cookie == cookie => Some(reservation.ticket_count),
            _ => None,
        };
        let Some(ticket_count) = granted else {
            debug!(reservation_id, "rejecting redemption request");
            return protocol::encode_bad_request(out, reservation_id);
        };

        if !self.ledger.is_redeemed(reservation_id) {
            self.ledger.issue(reservation_id, ticket_count, &mut self.codes);
            self.store.disable_expiry(reservation_id);
        }
        let codes = self.ledger.codes(reservation_id).unwrap_or(&[]);
        protocol::encode_tickets(out, reservation_id, codes)
    }
}
