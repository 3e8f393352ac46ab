//! The reservation store: live reservations, their cookies, and the
//! expiration-ordered index that drives pruning.

use std::collections::{BTreeMap, HashSet};

use cinema_core::Cookie;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::trace;

use crate::catalog::Catalog;
use crate::mint;

/// A live reservation.
#[derive(Debug, Clone, Copy)]
pub struct Reservation {
    /// The reserved event.
    pub event_id: u32,
    /// Number of tickets promised.
    pub ticket_count: u16,
    /// Bearer secret required for redemption.
    pub cookie: Cookie,
    /// Expiration instant, seconds since the Unix epoch.
    pub expires_at: u64,
}

/// Holds every live reservation and keeps the catalog's remaining
/// counters in step with them.
///
/// A reservation is live from `create` until it is pruned; redeeming
/// it removes it from the expiration index only, so it stays live (and
/// its cookie reserved) for the rest of the process.
pub struct ReservationStore {
    reservations: BTreeMap<u32, Reservation>,
    /// Reservation ids keyed by their expiration instant.
    expiry: BTreeMap<u64, HashSet<u32>>,
    cookies: HashSet<Cookie>,
    rng: StdRng,
}

impl Default for ReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationStore {
    /// Creates an empty store with an OS-entropy-seeded cookie rng.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates an empty store with the given rng. Tests use a seeded
    /// rng for reproducible cookies.
    #[must_use]
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            reservations: BTreeMap::new(),
            expiry: BTreeMap::new(),
            cookies: HashSet::new(),
            rng,
        }
    }

    /// Number of live reservations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    /// Whether no reservation is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    /// Creates a reservation for `ticket_count` tickets of `event_id`,
    /// expiring `timeout` seconds after `now`.
    ///
    /// The caller has already validated the event and the count
    /// against the catalog; the tickets are taken from the event here
    /// so the conservation invariant holds on return.
    pub fn create(
        &mut self,
        catalog: &mut Catalog,
        event_id: u32,
        ticket_count: u16,
        now: u64,
        timeout: u64,
    ) -> (u32, Reservation) {
        let reservation_id = mint::next_reservation_id(&self.reservations);
        let cookie = mint::next_cookie(&mut self.rng, &self.cookies);
        let reservation = Reservation {
            event_id,
            ticket_count,
            cookie,
            expires_at: now + timeout,
        };

        catalog.take(event_id, ticket_count);
        self.cookies.insert(cookie);
        self.expiry
            .entry(reservation.expires_at)
            .or_default()
            .insert(reservation_id);
        self.reservations.insert(reservation_id, reservation);

        (reservation_id, reservation)
    }

    /// Looks up a live reservation.
    #[must_use]
    pub fn lookup(&self, reservation_id: u32) -> Option<&Reservation> {
        self.reservations.get(&reservation_id)
    }

    /// Takes a reservation off the expiration index, making it
    /// permanent. Idempotent; unknown ids are ignored.
    pub fn disable_expiry(&mut self, reservation_id: u32) {
        let Some(reservation) = self.reservations.get(&reservation_id) else {
            return;
        };
        if let Some(ids) = self.expiry.get_mut(&reservation.expires_at) {
            ids.remove(&reservation_id);
            if ids.is_empty() {
                self.expiry.remove(&reservation.expires_at);
            }
        }
    }

    /// Destroys every reservation with `expires_at` strictly below
    /// `now`, refunding its tickets to its event and releasing its
    /// cookie.
    pub fn prune(&mut self, catalog: &mut Catalog, now: u64) {
        let mut pruned = 0usize;
        while let Some(entry) = self.expiry.first_entry() {
            if *entry.key() >= now {
                break;
            }
            for reservation_id in entry.remove() {
                let Some(reservation) = self.reservations.remove(&reservation_id) else {
                    continue;
                };
                catalog.refund(reservation.event_id, reservation.ticket_count);
                self.cookies.remove(&reservation.cookie);
                pruned += 1;
            }
        }
        if pruned > 0 {
            trace!(pruned, live = self.reservations.len(), "expired reservations");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> ReservationStore {
        ReservationStore::with_rng(StdRng::seed_from_u64(42))
    }

    fn catalog() -> Catalog {
        Catalog::from_entries([(b"koncert".to_vec(), 100), (b"film".to_vec(), 10)]).unwrap()
    }

    /// The conservation invariant: live reservations plus remaining
    /// tickets always equal the initial inventory.
    fn assert_conserved(store: &ReservationStore, catalog: &Catalog) {
        for (event_id, event) in catalog.iter() {
            let reserved: u32 = store
                .reservations
                .values()
                .filter(|r| r.event_id == event_id)
                .map(|r| u32::from(r.ticket_count))
                .sum();
            assert_eq!(reserved + u32::from(event.remaining()), u32::from(event.initial()));
        }
    }

    #[test]
    fn create_issues_ids_cookies_and_takes_tickets() {
        let mut store = seeded();
        let mut catalog = catalog();

        let (id, reservation) = store.create(&mut catalog, 0, 5, 1000, 5);
        assert_eq!(id, mint::MIN_RESERVATION_ID);
        assert_eq!(reservation.event_id, 0);
        assert_eq!(reservation.ticket_count, 5);
        assert_eq!(reservation.expires_at, 1005);
        assert_eq!(catalog.get(0).unwrap().remaining(), 95);
        assert_conserved(&store, &catalog);

        let (id2, reservation2) = store.create(&mut catalog, 1, 10, 1000, 5);
        assert_eq!(id2, mint::MIN_RESERVATION_ID + 1);
        assert_ne!(reservation2.cookie, reservation.cookie);
        assert_eq!(catalog.get(1).unwrap().remaining(), 0);
        assert_conserved(&store, &catalog);

        assert_eq!(store.lookup(id).unwrap().ticket_count, 5);
        assert!(store.lookup(999_999).is_none());
    }

    #[test]
    fn prune_removes_strictly_older_reservations() {
        let mut store = seeded();
        let mut catalog = catalog();

        let (early, _) = store.create(&mut catalog, 0, 3, 1000, 5); // expires 1005
        let (later, _) = store.create(&mut catalog, 0, 4, 1002, 5); // expires 1007
        assert_eq!(catalog.get(0).unwrap().remaining(), 93);

        // At the expiration instant itself the reservation survives.
        store.prune(&mut catalog, 1005);
        assert!(store.lookup(early).is_some());

        store.prune(&mut catalog, 1006);
        assert!(store.lookup(early).is_none());
        assert!(store.lookup(later).is_some());
        assert_eq!(catalog.get(0).unwrap().remaining(), 96);
        assert_conserved(&store, &catalog);

        store.prune(&mut catalog, 2000);
        assert!(store.is_empty());
        assert_eq!(catalog.get(0).unwrap().remaining(), 100);
        assert_conserved(&store, &catalog);
    }

    #[test]
    fn prune_releases_cookies_and_ids_for_reuse() {
        let mut store = seeded();
        let mut catalog = catalog();

        let (id, reservation) = store.create(&mut catalog, 0, 1, 1000, 5);
        store.prune(&mut catalog, 1010);
        assert!(store.is_empty());
        assert!(store.cookies.is_empty());
        assert!(store.expiry.is_empty());

        // With no live reservations the id sequence restarts.
        let (id2, reservation2) = store.create(&mut catalog, 0, 1, 1010, 5);
        assert_eq!(id2, id);
        assert_ne!(reservation2.cookie, reservation.cookie);
    }

    #[test]
    fn disable_expiry_makes_a_reservation_permanent() {
        let mut store = seeded();
        let mut catalog = catalog();

        let (id, _) = store.create(&mut catalog, 0, 2, 1000, 5);
        store.disable_expiry(id);
        store.disable_expiry(id); // idempotent
        store.disable_expiry(999); // unknown ids ignored

        store.prune(&mut catalog, 10_000);
        assert!(store.lookup(id).is_some());
        assert!(store.expiry.is_empty());
        assert_eq!(catalog.get(0).unwrap().remaining(), 98);
        assert_conserved(&store, &catalog);
    }

    #[test]
    fn reservations_sharing_an_instant_expire_together() {
        let mut store = seeded();
        let mut catalog = catalog();

        let (a, _) = store.create(&mut catalog, 0, 1, 1000, 5);
        let (b, _) = store.create(&mut catalog, 0, 1, 1000, 5);
        let (c, _) = store.create(&mut catalog, 1, 1, 1000, 5);
        assert_eq!(store.len(), 3);

        store.prune(&mut catalog, 1006);
        assert!(store.lookup(a).is_none());
        assert!(store.lookup(b).is_none());
        assert!(store.lookup(c).is_none());
        assert_conserved(&store, &catalog);
    }
}
