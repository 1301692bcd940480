use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engine::{Clock, Engine, EngineError, SharedEngine, now_ms};
use crate::limits::MAX_SESSIONS;
use crate::model::{SessionId, VenueId};
use crate::observability::{SESSION_VENUE_RESETS_TOTAL, SESSIONS_ACTIVE};

struct Session {
    venue: Option<VenueId>,
    engine: SharedEngine,
}

/// Per-client booking sessions. Each session owns one engine; switching the
/// session to another venue throws the old engine, and its selection, away.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
    /// Slots reserved against `max_sessions`, taken before a new entry is
    /// inserted so concurrent opens cannot overshoot the cap.
    reserved: AtomicUsize,
    max_sessions: usize,
    config: EngineConfig,
    clock: Clock,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(now_ms))
    }

    pub fn with_clock(config: EngineConfig, clock: Clock) -> Self {
        Self {
            sessions: DashMap::new(),
            reserved: AtomicUsize::new(0),
            max_sessions: MAX_SESSIONS,
            config,
            clock,
        }
    }

    /// Lower the session cap (never above `MAX_SESSIONS`).
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max.min(MAX_SESSIONS);
        self
    }

    /// Engine for `session` showing `venue` (`None` for free-form), created
    /// on first use or when the venue differs from the one it was opened with.
    pub fn open(&self, session: SessionId, venue: Option<VenueId>) -> Result<SharedEngine, EngineError> {
        let engine = match self.sessions.entry(session) {
            Entry::Occupied(mut slot) => {
                if slot.get().venue == venue {
                    return Ok(slot.get().engine.clone());
                }
                let engine = self.new_engine(venue);
                let old = slot.insert(Session { venue, engine: engine.clone() });
                info!(%session, from = ?old.venue, to = ?venue, "venue changed, session reset");
                metrics::counter!(SESSION_VENUE_RESETS_TOTAL).increment(1);
                engine
            }
            Entry::Vacant(slot) => {
                let max = self.max_sessions;
                if self
                    .reserved
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
                    .is_err()
                {
                    warn!(%session, max, "session limit reached");
                    return Err(EngineError::LimitExceeded("too many sessions"));
                }
                let engine = self.new_engine(venue);
                slot.insert(Session { venue, engine: engine.clone() });
                engine
            }
        };
        metrics::gauge!(SESSIONS_ACTIVE).set(self.reserved.load(Ordering::SeqCst) as f64);
        Ok(engine)
    }

    fn new_engine(&self, venue: Option<VenueId>) -> SharedEngine {
        Arc::new(Mutex::new(Engine::with_clock(venue, self.config, self.clock.clone())))
    }

    pub fn get(&self, session: &SessionId) -> Result<SharedEngine, EngineError> {
        self.sessions
            .get(session)
            .map(|s| s.engine.clone())
            .ok_or(EngineError::SessionNotFound(*session))
    }

    /// Drop the session and its selection.
    pub fn close(&self, session: &SessionId) -> Result<(), EngineError> {
        self.sessions
            .remove(session)
            .ok_or(EngineError::SessionNotFound(*session))?;
        let active = self.reserved.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!(SESSIONS_ACTIVE).set(active as f64);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
