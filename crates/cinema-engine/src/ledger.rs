//! The redemption ledger: which reservations have been redeemed and
//! with which ticket codes.

use std::collections::HashMap;

use cinema_core::TicketCode;

use crate::codes::TicketCodeGen;

/// Append-only record of redeemed reservations.
///
/// A reservation appears here after its first successful redemption
/// and keeps its exact code sequence forever, which is what makes
/// repeated redemptions byte-identical.
#[derive(Debug, Default)]
pub struct RedemptionLedger {
    issued: HashMap<u32, Vec<TicketCode>>,
}

impl RedemptionLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the reservation has been redeemed before.
    #[must_use]
    pub fn is_redeemed(&self, reservation_id: u32) -> bool {
        self.issued.contains_key(&reservation_id)
    }

    /// Draws `count` fresh codes from the generator and records them
    /// for `reservation_id`.
    pub fn issue(&mut self, reservation_id: u32, count: u16, codes: &mut TicketCodeGen) {
        let issued = (0..count).map(|_| codes.next_code()).collect();
        self.issued.insert(reservation_id, issued);
    }

    /// The codes issued to `reservation_id`, in issue order.
    #[must_use]
    pub fn codes(&self, reservation_id: u32) -> Option<&[TicketCode]> {
        self.issued.get(&reservation_id).map(Vec::as_slice)
    }
}
