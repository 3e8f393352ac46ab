//! Reservation-id and cookie minting.

use std::collections::{BTreeMap, HashSet};

use cinema_core::{Cookie, COOKIE_LEN};
use rand::rngs::StdRng;
use rand::Rng;

/// Smallest reservation id ever issued; ids below this range can never
/// collide with event ids in client logs.
pub const MIN_RESERVATION_ID: u32 = 1_000_000;

/// Cookie bytes are drawn uniformly from this printable-ASCII range.
const COOKIE_BYTE_RANGE: std::ops::RangeInclusive<u8> = 33..=126;

/// Picks the next reservation id given the live reservations.
///
/// The first id is [`MIN_RESERVATION_ID`]; afterwards ids are strictly
/// increasing (max live id plus one) until the id space has been
/// touched up to `u32::MAX`, at which point the smallest gap above a
/// live id is reused.
pub fn next_reservation_id<V>(live: &BTreeMap<u32, V>) -> u32 {
    let Some((&max, _)) = live.last_key_value() else {
        return MIN_RESERVATION_ID;
    };
    if max < u32::MAX {
        return max + 1;
    }
    for &id in live.keys() {
        if id < u32::MAX && !live.contains_key(&(id + 1)) {
            return id + 1;
        }
    }
    // Every id from the smallest live one up to u32::MAX is taken;
    // with 4 billion live reservations this point is never reached.
    MIN_RESERVATION_ID
}

/// Draws a fresh 48-byte printable-ASCII cookie not currently attached
/// to any live reservation.
pub fn next_cookie(rng: &mut StdRng, live: &HashSet<Cookie>) -> Cookie {
    loop {
        let mut bytes = [0u8; COOKIE_LEN];
        for byte in &mut bytes {
            *byte = rng.gen_range(COOKIE_BYTE_RANGE);
        }
        let cookie = Cookie::new(bytes);
        if !live.contains(&cookie) {
            return cookie;
        }
    }
}
