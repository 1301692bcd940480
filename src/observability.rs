use crate::model::CellStatus;

// ── Selection ───────────────────────────────────────────────────

/// Counter: selection change notifications emitted. Labels: cause.
pub const SELECTION_CHANGES_TOTAL: &str = "slotgrid_selection_changes_total";

/// Counter: cells refused at pointer-down, drag or release. Labels: reason.
pub const CELLS_REJECTED_TOTAL: &str = "slotgrid_cells_rejected_total";

/// Counter: selected cells evicted by revalidation on booking arrival.
pub const CELLS_EVICTED_TOTAL: &str = "slotgrid_cells_evicted_total";

// ── Feeds ───────────────────────────────────────────────────────

/// Counter: feed entries skipped as unparsable or out of limits. Labels: feed.
pub const FEED_ENTRIES_SKIPPED_TOTAL: &str = "slotgrid_feed_entries_skipped_total";

/// Counter: feed results discarded because a newer request superseded them. Labels: feed.
pub const FEED_STALE_TOTAL: &str = "slotgrid_feed_stale_total";

/// Counter: feed fetches that failed. Labels: feed.
pub const FEED_ERRORS_TOTAL: &str = "slotgrid_feed_errors_total";

/// Histogram: feed fetch latency in seconds. Labels: feed.
pub const FEED_FETCH_DURATION_SECONDS: &str = "slotgrid_feed_fetch_duration_seconds";

// ── Sessions ────────────────────────────────────────────────────

/// Gauge: sessions currently held by the registry.
pub const SESSIONS_ACTIVE: &str = "slotgrid_sessions_active";

/// Counter: sessions reset because the venue changed.
pub const SESSION_VENUE_RESETS_TOTAL: &str = "slotgrid_session_venue_resets_total";

/// Stable label for a cell status, for the `reason` label of rejections.
pub fn status_label(status: CellStatus) -> &'static str {
    match status {
        CellStatus::Loading => "loading",
        CellStatus::OutOfView => "out_of_view",
        CellStatus::Past => "past",
        CellStatus::Booked => "booked",
        CellStatus::Unavailable => "unavailable",
        CellStatus::Open => "open",
    }
}
