mod availability;
mod conflict;
mod error;
mod gesture;
mod merge;
mod normalize;
mod store;
mod view;

pub use availability::{availability, day_bounds, open_cells, resolve_rules, window_hours};
pub use conflict::{conflicts, resolve_intervals, taken_cells};
pub use error::EngineError;
pub use gesture::DragState;
pub use merge::{merge_cells, merge_overlapping};
pub use normalize::normalize;
pub use store::SelectionStore;
pub use view::{GridView, Openness};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability::{self, status_label};
use crate::timekey::{TimeKey, Week};

/// Source of "now". Injected so tests can move time.
pub type Clock = Arc<dyn Fn() -> Ms + Send + Sync>;

pub type SharedEngine = Arc<Mutex<Engine>>;

pub fn now_ms() -> Ms {
    Utc::now().timestamp_millis()
}

/// Load state of one feed. `Pending` holds the ticket of the newest request;
/// results carrying any other ticket are stale.
#[derive(Debug)]
enum Feed<T> {
    Pending(Ulid),
    Ready(T),
}

impl<T> Feed<T> {
    fn ready(&self) -> Option<&T> {
        match self {
            Feed::Ready(v) => Some(v),
            Feed::Pending(_) => None,
        }
    }

    fn awaiting(&self) -> Option<Ulid> {
        match self {
            Feed::Pending(ticket) => Some(*ticket),
            Feed::Ready(_) => None,
        }
    }
}

/// Fetch the venue's weekly rules and hand them back with this ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityRequest {
    pub ticket: Ulid,
    pub venue: VenueId,
}

/// Fetch the bookings overlapping `window` (the displayed week) and hand
/// them back with this ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingsRequest {
    pub ticket: Ulid,
    pub venue: VenueId,
    pub week: Week,
    pub window: Span,
}

/// Requests the engine is still waiting on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingFeeds {
    pub availability: Option<AvailabilityRequest>,
    pub bookings: Option<BookingsRequest>,
}

impl PendingFeeds {
    pub fn is_empty(&self) -> bool {
        self.availability.is_none() && self.bookings.is_none()
    }
}

#[derive(Debug, Default)]
struct InitialSlots {
    /// Last list that went through the normalizer.
    applied: Option<Vec<InitialSlot>>,
    /// List waiting for the displayed week's feeds.
    pending: Option<Vec<InitialSlot>>,
}

/// Selection engine for one venue (or free-form, without one).
///
/// All mutation goes through `&mut self` on a single event thread; feeds
/// arrive through [`Engine::apply_availability`] / [`Engine::apply_bookings`].
/// Every change to the selection is broadcast as a [`SelectionEvent`]
/// carrying the merged ranges of every week touched so far.
pub struct Engine {
    venue: Option<VenueId>,
    config: EngineConfig,
    clock: Clock,
    week: Week,
    rules: Feed<Vec<RuleWindow>>,
    /// Cells the rules open in `week`; empty until rules are in.
    open: HashSet<TimeKey>,
    booked: Feed<HashSet<TimeKey>>,
    store: SelectionStore,
    drag: DragState,
    initial: InitialSlots,
    emitted: Vec<SelectedRange>,
    notify: NotifyHub,
}

impl Engine {
    pub fn new(venue: Option<VenueId>, config: EngineConfig) -> Self {
        Self::with_clock(venue, config, Arc::new(now_ms))
    }

    pub fn with_clock(venue: Option<VenueId>, config: EngineConfig, clock: Clock) -> Self {
        let week = Week::containing(today(clock(), &config), config.week_start);
        let (rules, booked) = match venue {
            Some(_) => (Feed::Pending(Ulid::new()), Feed::Pending(Ulid::new())),
            None => (Feed::Ready(Vec::new()), Feed::Ready(HashSet::new())),
        };
        Self {
            venue,
            config,
            clock,
            week,
            rules,
            open: HashSet::new(),
            booked,
            store: SelectionStore::new(),
            drag: DragState::Idle,
            initial: InitialSlots::default(),
            emitted: Vec::new(),
            notify: NotifyHub::new(),
        }
    }

    pub fn venue(&self) -> Option<VenueId> {
        self.venue
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn week(&self) -> Week {
        self.week
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.store
    }

    pub fn drag(&self) -> DragState {
        self.drag
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.notify.subscribe()
    }

    /// True while either feed for the displayed week is outstanding.
    pub fn is_loading(&self) -> bool {
        self.view().is_none()
    }

    // ── Feeds ────────────────────────────────────────────────────

    pub fn pending_requests(&self) -> PendingFeeds {
        let Some(venue) = self.venue else {
            return PendingFeeds::default();
        };
        PendingFeeds {
            availability: self
                .rules
                .awaiting()
                .map(|ticket| AvailabilityRequest { ticket, venue }),
            bookings: self.booked.awaiting().map(|ticket| self.bookings_request(ticket, venue)),
        }
    }

    fn bookings_request(&self, ticket: Ulid, venue: VenueId) -> BookingsRequest {
        let window = self
            .week
            .window(&self.config.timezone)
            .unwrap_or(Span { start: Ms::MIN, end: Ms::MAX });
        BookingsRequest { ticket, venue, week: self.week, window }
    }

    /// Invalidate the venue's rules and issue a fresh request. The grid is
    /// unselectable until it is answered.
    pub fn reload_availability(&mut self) -> Option<AvailabilityRequest> {
        let venue = self.venue?;
        let ticket = Ulid::new();
        self.rules = Feed::Pending(ticket);
        self.open.clear();
        Some(AvailabilityRequest { ticket, venue })
    }

    /// Invalidate the displayed week's bookings and issue a fresh request.
    pub fn reload_bookings(&mut self) -> Option<BookingsRequest> {
        let venue = self.venue?;
        let ticket = Ulid::new();
        self.booked = Feed::Pending(ticket);
        Some(self.bookings_request(ticket, venue))
    }

    /// Accept the venue's weekly rules. Returns false (and changes nothing)
    /// when `ticket` is not the outstanding availability request.
    pub fn apply_availability(&mut self, ticket: Ulid, rules: &[AvailabilityRule]) -> bool {
        if self.rules.awaiting() != Some(ticket) {
            discard_stale("availability", ticket);
            return false;
        }
        let windows = resolve_rules(rules);
        debug!(venue = ?self.venue, rules = windows.len(), "availability loaded");
        self.rules = Feed::Ready(windows);
        self.recompute_open();
        self.on_feed_loaded();
        true
    }

    /// Accept the displayed week's bookings. Returns false (and changes
    /// nothing) when `ticket` is not the outstanding bookings request, e.g.
    /// because the user navigated away before it resolved.
    pub fn apply_bookings(&mut self, ticket: Ulid, intervals: &[BookedInterval]) -> bool {
        if self.booked.awaiting() != Some(ticket) {
            discard_stale("bookings", ticket);
            return false;
        }
        let taken = conflicts(intervals, &self.week, &self.config.timezone);
        debug!(venue = ?self.venue, week = %self.week.start, taken = taken.len(), "bookings loaded");
        self.booked = Feed::Ready(taken);
        self.on_feed_loaded();
        true
    }

    fn recompute_open(&mut self) {
        match &self.rules {
            Feed::Ready(windows) => {
                self.open = open_cells(windows, &self.week, &self.config.timezone);
            }
            Feed::Pending(_) => self.open.clear(),
        }
    }

    fn on_feed_loaded(&mut self) {
        if self.is_loading() {
            return;
        }
        if self.config.revalidate_on_load {
            self.revalidate_week();
        }
        self.try_normalize();
        self.emit("feed");
    }

    /// Drop selected cells of the displayed week that the fresh feeds now
    /// show as booked or unavailable. Past cells stay.
    fn revalidate_week(&mut self) {
        let evict: Vec<TimeKey> = match self.view() {
            Some(view) => self
                .store
                .in_week(&self.week)
                .filter(|k| matches!(view.status(k), CellStatus::Booked | CellStatus::Unavailable))
                .copied()
                .collect(),
            None => return,
        };
        if evict.is_empty() {
            return;
        }
        warn!(week = %self.week.start, cells = evict.len(), "evicting selected cells no longer bookable");
        metrics::counter!(observability::CELLS_EVICTED_TOTAL).increment(evict.len() as u64);
        self.store.remove_range(&evict);
    }

    // ── Navigation ───────────────────────────────────────────────

    /// Show `week`. Any drag in progress is abandoned and, for a venue, the
    /// week's bookings become pending; the returned request must be answered
    /// before its cells can be selected.
    pub fn navigate(&mut self, week: Week) -> Option<BookingsRequest> {
        if week == self.week {
            return None;
        }
        if self.drag.cancel() {
            debug!("drag cancelled by navigation");
        }
        self.week = week;
        self.recompute_open();
        self.reload_bookings()
    }

    pub fn next_week(&mut self) -> Option<BookingsRequest> {
        self.navigate(self.week.next())
    }

    pub fn previous_week(&mut self) -> Option<BookingsRequest> {
        self.navigate(self.week.previous())
    }

    // ── Eligibility ──────────────────────────────────────────────

    /// Eligibility of the displayed week, or `None` while loading.
    pub fn view(&self) -> Option<GridView<'_>> {
        let booked = self.booked.ready()?;
        let openness = match self.venue {
            None => Openness::FreeForm,
            Some(_) => Openness::Venue {
                windows: self.rules.ready()?,
                open: &self.open,
            },
        };
        Some(GridView {
            week: self.week,
            tz: self.config.timezone,
            now: (self.clock)(),
            openness,
            booked,
        })
    }

    pub fn cell_state(&self, key: &TimeKey) -> CellState {
        let status = if !self.week.contains(key.date) {
            CellStatus::OutOfView
        } else {
            self.view().map_or(CellStatus::Loading, |v| v.status(key))
        };
        CellState {
            status,
            selected: self.store.is_selected(key),
        }
    }

    pub fn is_eligible(&self, key: &TimeKey) -> bool {
        self.view().is_some_and(|v| v.is_eligible(key))
    }

    fn note_rejected(&self, key: &TimeKey) {
        let status = self.cell_state(key).status;
        debug!(%key, ?status, "cell rejected");
        metrics::counter!(observability::CELLS_REJECTED_TOTAL, "reason" => status_label(status))
            .increment(1);
    }

    // ── Initial selection ────────────────────────────────────────

    /// Seed the selection from an externally supplied list. Cells are only
    /// ever added. The list is held until the displayed week's feeds are in;
    /// handing over the same list again does nothing.
    pub fn set_initial_slots(&mut self, slots: Vec<InitialSlot>) -> bool {
        let current = self.initial.pending.as_ref().or(self.initial.applied.as_ref());
        if current == Some(&slots) {
            return false;
        }
        self.initial.pending = Some(slots);
        self.try_normalize()
    }

    fn try_normalize(&mut self) -> bool {
        let Some(slots) = self.initial.pending.as_ref() else {
            return false;
        };
        let keys = match self.view() {
            Some(view) => normalize(slots, &view),
            None => {
                debug!("initial slots deferred until feeds arrive");
                return false;
            }
        };
        self.initial.applied = self.initial.pending.take();
        let changed = self.store.add_range(&keys);
        if changed {
            info!(cells = keys.len(), "initial selection seeded");
            self.emit("initial");
        }
        changed
    }

    // ── Interaction ──────────────────────────────────────────────

    pub fn pointer_down(&mut self, key: TimeKey) -> bool {
        let eligible = self.is_eligible(&key);
        if !eligible {
            self.note_rejected(&key);
        }
        self.drag.pointer_down(key, eligible)
    }

    pub fn pointer_enter(&mut self, key: TimeKey) -> bool {
        if !self.drag.is_dragging() {
            return false;
        }
        let eligible = self.is_eligible(&key);
        self.drag.pointer_enter(key, eligible)
    }

    /// Commit the drag. The covered cells are re-checked against the current
    /// feeds, so data that arrived mid-drag is honoured, then toggled as one
    /// all-or-nothing range.
    pub fn pointer_up(&mut self) -> bool {
        let Some((anchor, current)) = self.drag.release() else {
            return false;
        };
        let covered = anchor.same_day_range(&current);
        let keys: Vec<TimeKey> = match self.view() {
            Some(view) => covered.iter().filter(|k| view.is_eligible(k)).copied().collect(),
            None => Vec::new(),
        };
        if keys.len() < covered.len() {
            debug!(skipped = covered.len() - keys.len(), "ineligible cells left out of drag");
            metrics::counter!(observability::CELLS_REJECTED_TOTAL, "reason" => "release")
                .increment((covered.len() - keys.len()) as u64);
        }
        let changed = self.store.toggle_range(&keys);
        if changed {
            self.emit("drag");
        }
        changed
    }

    /// Pointer left the grid without a release: drop the drag uncommitted.
    pub fn pointer_leave(&mut self) -> bool {
        self.drag.cancel()
    }

    /// Cells currently under the drag, for highlighting.
    pub fn drag_preview(&self) -> Vec<TimeKey> {
        self.drag.covered()
    }

    /// Toggle every eligible cell of `date` as one range.
    pub fn toggle_day(&mut self, date: NaiveDate) -> bool {
        let keys = self.view().map(|v| v.eligible_on(date)).unwrap_or_default();
        let changed = self.store.toggle_range(&keys);
        if changed {
            self.emit("day");
        }
        changed
    }

    /// Deselect every cell inside `range`, in any week.
    pub fn remove_range(&mut self, range: Span) -> bool {
        let tz = self.config.timezone;
        let removed = self
            .store
            .remove_where(|k| k.span(&tz).is_some_and(|cell| range.contains_span(&cell)));
        if removed.is_empty() {
            return false;
        }
        self.emit("remove");
        true
    }

    // ── Output ───────────────────────────────────────────────────

    /// The whole selection, every week, as maximal ranges.
    pub fn ranges(&self) -> Vec<SelectedRange> {
        merge_cells(self.store.iter(), &self.config.timezone)
    }

    fn emit(&mut self, cause: &'static str) {
        let ranges = self.ranges();
        if ranges == self.emitted {
            return;
        }
        self.emitted = ranges.clone();
        debug!(cause, ranges = ranges.len(), "selection changed");
        metrics::counter!(observability::SELECTION_CHANGES_TOTAL, "cause" => cause).increment(1);
        self.notify.send(SelectionEvent { ranges });
    }
}

fn discard_stale(feed: &'static str, ticket: Ulid) {
    debug!(feed, %ticket, "discarding superseded feed result");
    metrics::counter!(observability::FEED_STALE_TOTAL, "feed" => feed).increment(1);
}

fn today(now: Ms, config: &EngineConfig) -> NaiveDate {
    TimeKey::containing(now, &config.timezone)
        .map(|k| k.date)
        .unwrap_or_else(|| DateTime::<Utc>::default().date_naive())
}
