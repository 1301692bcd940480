use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::{EngineError, SharedEngine};
use crate::model::*;
use crate::observability::{FEED_ENTRIES_SKIPPED_TOTAL, FEED_ERRORS_TOTAL, FEED_FETCH_DURATION_SECONDS};

/// Where a venue's availability rules and bookings come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn weekly_availability(&self, venue: VenueId) -> Result<Vec<AvailabilityRule>, EngineError>;

    /// Bookings overlapping `window`.
    async fn booked_intervals(
        &self,
        venue: VenueId,
        window: Span,
    ) -> Result<Vec<BookedInterval>, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Nothing was outstanding.
    NotNeeded,
    Applied,
    /// The engine moved on (navigation, reload) while the fetch was in flight.
    Stale,
    /// Fetch failed; the feed stays pending and the week stays closed.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub availability: FeedOutcome,
    pub bookings: FeedOutcome,
}

/// Answer the engine's outstanding feed requests from `source`.
///
/// Both fetches run concurrently and the engine lock is not held while they
/// are in flight, so the user can keep navigating; results are then applied
/// by ticket and dropped if superseded.
pub async fn refresh(engine: &SharedEngine, source: &dyn FeedSource) -> RefreshOutcome {
    let pending = engine.lock().await.pending_requests();

    let availability = async {
        match pending.availability {
            Some(req) => Some((req, timed("availability", source.weekly_availability(req.venue)).await)),
            None => None,
        }
    };
    let bookings = async {
        match pending.bookings {
            Some(req) => Some((
                req,
                timed("bookings", source.booked_intervals(req.venue, req.window)).await,
            )),
            None => None,
        }
    };
    let (availability, bookings) = futures::join!(availability, bookings);

    let mut engine = engine.lock().await;
    let availability = match availability {
        None => FeedOutcome::NotNeeded,
        Some((_, Err(_))) => FeedOutcome::Failed,
        Some((req, Ok(rules))) => applied(engine.apply_availability(req.ticket, &rules)),
    };
    let bookings = match bookings {
        None => FeedOutcome::NotNeeded,
        Some((_, Err(_))) => FeedOutcome::Failed,
        Some((req, Ok(intervals))) => applied(engine.apply_bookings(req.ticket, &intervals)),
    };
    debug!(?availability, ?bookings, "feeds refreshed");
    RefreshOutcome { availability, bookings }
}

fn applied(accepted: bool) -> FeedOutcome {
    if accepted { FeedOutcome::Applied } else { FeedOutcome::Stale }
}

async fn timed<T>(
    feed: &'static str,
    fetch: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    let started = Instant::now();
    let result = fetch.await;
    metrics::histogram!(FEED_FETCH_DURATION_SECONDS, "feed" => feed)
        .record(started.elapsed().as_secs_f64());
    if let Err(e) = &result {
        warn!(feed, error = %e, "feed fetch failed");
        metrics::counter!(FEED_ERRORS_TOTAL, "feed" => feed).increment(1);
    }
    result
}

// ── Decoding ─────────────────────────────────────────────────────

/// Decode a JSON array entry by entry. Entries that do not decode are
/// skipped; anything other than an array yields nothing.
pub fn decode_entries<T: DeserializeOwned>(feed: &'static str, payload: &str) -> Vec<T> {
    let entries = match serde_json::from_str::<Value>(payload) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!(feed, "feed payload is not an array, treating as empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(feed, error = %e, "feed payload is not valid JSON, treating as empty");
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(feed, error = %e, "skipping undecodable feed entry");
                metrics::counter!(FEED_ENTRIES_SKIPPED_TOTAL, "feed" => feed).increment(1);
                None
            }
        })
        .collect()
}

pub fn decode_rules(payload: &str) -> Vec<AvailabilityRule> {
    decode_entries("availability", payload)
}

pub fn decode_intervals(payload: &str) -> Vec<BookedInterval> {
    decode_entries("bookings", payload)
}

pub fn decode_slots(payload: &str) -> Vec<InitialSlot> {
    decode_entries("initial", payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;
    use ulid::Ulid;

    #[test]
    fn decode_rules_accepts_camel_case() {
        let rules = decode_rules(
            r#"[{"dayOfWeek":"MONDAY","startTime":"09:00","endTime":"17:00"},
                {"day_of_week":"TUESDAY","start_time":"10:00:00","end_time":"12:00:00"}]"#,
        );
        assert_eq!(
            rules,
            vec![
                AvailabilityRule::new("MONDAY", "09:00", "17:00"),
                AvailabilityRule::new("TUESDAY", "10:00:00", "12:00:00"),
            ]
        );
    }

    #[test]
    fn decode_skips_bad_entries() {
        let intervals = decode_intervals(
            r#"[{"start":"2026-03-02T10:00:00Z","end":"2026-03-02T11:00:00Z"},
                {"start":10,"end":11},
                {"start":"2026-03-02T12:00:00Z"},
                "nope"]"#,
        );
        assert_eq!(
            intervals,
            vec![BookedInterval::new("2026-03-02T10:00:00Z", "2026-03-02T11:00:00Z")]
        );
    }

    #[test]
    fn decode_non_array_is_empty() {
        assert!(decode_slots(r#"{"start":"2026-03-02T10:00:00Z"}"#).is_empty());
        assert!(decode_rules("not json").is_empty());
        assert!(decode_intervals("[]").is_empty());
    }

    struct CountingSource {
        calls: AtomicUsize,
        fail_bookings: bool,
    }

    #[async_trait]
    impl FeedSource for CountingSource {
        async fn weekly_availability(&self, _venue: VenueId) -> Result<Vec<AvailabilityRule>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![AvailabilityRule::new("MONDAY", "00:00", "24:00")])
        }

        async fn booked_intervals(
            &self,
            _venue: VenueId,
            _window: Span,
        ) -> Result<Vec<BookedInterval>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_bookings {
                return Err(EngineError::FeedUnavailable {
                    feed: "bookings",
                    reason: "upstream timeout".into(),
                });
            }
            Ok(Vec::new())
        }
    }

    fn shared(venue: Option<VenueId>) -> SharedEngine {
        Arc::new(Mutex::new(Engine::new(venue, EngineConfig::default())))
    }

    #[tokio::test]
    async fn refresh_applies_both_feeds() {
        let engine = shared(Some(Ulid::new()));
        let source = CountingSource { calls: AtomicUsize::new(0), fail_bookings: false };
        let outcome = refresh(&engine, &source).await;
        assert_eq!(outcome.availability, FeedOutcome::Applied);
        assert_eq!(outcome.bookings, FeedOutcome::Applied);
        assert!(!engine.lock().await.is_loading());

        let again = refresh(&engine, &source).await;
        assert_eq!(again, RefreshOutcome { availability: FeedOutcome::NotNeeded, bookings: FeedOutcome::NotNeeded });
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_the_week_closed() {
        let engine = shared(Some(Ulid::new()));
        let source = CountingSource { calls: AtomicUsize::new(0), fail_bookings: true };
        let outcome = refresh(&engine, &source).await;
        assert_eq!(outcome.availability, FeedOutcome::Applied);
        assert_eq!(outcome.bookings, FeedOutcome::Failed);
        let engine = engine.lock().await;
        assert!(engine.is_loading());
        assert!(engine.pending_requests().bookings.is_some());
    }

    #[tokio::test]
    async fn free_form_needs_no_feeds() {
        let engine = shared(None);
        let source = CountingSource { calls: AtomicUsize::new(0), fail_bookings: false };
        let outcome = refresh(&engine, &source).await;
        assert_eq!(outcome.availability, FeedOutcome::NotNeeded);
        assert_eq!(outcome.bookings, FeedOutcome::NotNeeded);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
