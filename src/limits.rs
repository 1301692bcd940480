use crate::model::{HOUR_MS, Ms};

/// Rules accepted from one venue availability feed; the rest are dropped.
pub const MAX_RULES_PER_VENUE: usize = 512;

/// Booked intervals accepted from one weekly booking feed.
pub const MAX_INTERVALS_PER_FEED: usize = 10_000;

/// Initial slots accepted in one normalization pass.
pub const MAX_INITIAL_SLOTS: usize = 1_000;

/// Widest interval the engine will walk cell by cell (booked or initial).
pub const MAX_INTERVAL_SPAN_MS: Ms = 366 * 24 * HOUR_MS;

/// Concurrent booking sessions held by one registry.
pub const MAX_SESSIONS: usize = 100_000;
