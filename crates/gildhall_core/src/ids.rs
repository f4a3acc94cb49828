//! # Id and Clock Helpers
//!
//! Listing ids must be unique across concurrent creators and must not be
//! guessable from sequence (a predictable id would let clients enumerate
//! other sellers' listings). Ids combine a millisecond timestamp prefix
//! with a 64-bit suffix drawn from OS entropy, so a collision needs two
//! creations in the same millisecond to also draw the same 64-bit value.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::RngCore;

/// Milliseconds since the unix epoch.
///
/// A clock set before 1970 reads as 0 rather than failing; timestamps
/// here order events for humans, they are not a correctness input.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Generates a fresh listing id: `L-{millis:012x}-{random:016x}`.
#[must_use]
pub fn new_listing_id() -> String {
    format!("L-{:012x}-{:016x}", now_millis(), OsRng.next_u64())
}
