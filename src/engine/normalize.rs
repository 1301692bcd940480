use chrono::{Days, NaiveDate, TimeZone};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::limits::{MAX_INITIAL_SLOTS, MAX_INTERVAL_SPAN_MS};
use crate::model::*;
use crate::timekey::{TimeKey, local_midnight};

use super::view::GridView;

/// Turn externally supplied slots into cells to add to the selection.
///
/// Each slot is split by local date. Dates in the displayed week are clipped
/// to the venue's opening bounds for that date (dropped entirely when the
/// venue never opens), and only cells the view deems eligible survive.
/// Dates outside the displayed week cannot be checked against feeds that are
/// not loaded; their cells are kept unless already past.
///
/// The result only ever adds to a selection, so running it twice over the
/// same store is a no-op the second time.
pub fn normalize(slots: &[InitialSlot], view: &GridView<'_>) -> Vec<TimeKey> {
    if slots.len() > MAX_INITIAL_SLOTS {
        warn!("{} initial slots supplied, keeping the first {MAX_INITIAL_SLOTS}", slots.len());
    }
    let mut keys = Vec::new();
    for slot in slots.iter().take(MAX_INITIAL_SLOTS) {
        let span = match slot.parse(&view.tz) {
            Some(span) if span.duration_ms() <= MAX_INTERVAL_SPAN_MS => span,
            _ => {
                warn!(?slot, "skipping malformed initial slot");
                metrics::counter!(crate::observability::FEED_ENTRIES_SKIPPED_TOTAL, "feed" => "initial")
                    .increment(1);
                continue;
            }
        };
        let before = keys.len();
        for date in dates_touched(&span, &view.tz) {
            collect_day(&span, date, view, &mut keys);
        }
        debug!(?slot, kept = keys.len() - before, "normalized initial slot");
    }
    keys.sort();
    keys.dedup();
    keys
}

/// Local dates the span overlaps, in order.
fn dates_touched(span: &Span, tz: &Tz) -> Vec<NaiveDate> {
    let (Some(first), Some(last)) = (
        TimeKey::containing(span.start, tz),
        TimeKey::containing(span.end - 1, tz),
    ) else {
        return Vec::new();
    };
    first
        .date
        .iter_days()
        .take_while(|d| *d <= last.date)
        .collect()
}

fn collect_day(span: &Span, date: NaiveDate, view: &GridView<'_>, out: &mut Vec<TimeKey>) {
    let tz = &view.tz;
    let (Some(day_start), Some(day_end)) = (
        local_midnight(date, tz),
        date.checked_add_days(Days::new(1)).and_then(|next| local_midnight(next, tz)),
    ) else {
        return;
    };
    let mut lo = span.start.max(day_start);
    let mut hi = span.end.min(day_end);

    let visible = view.shows(date);
    if visible {
        let Some((open_min, close_min)) = view.day_bounds(date) else {
            return;
        };
        if let Some(open_at) = instant_at(date, open_min, tz) {
            lo = lo.max(open_at);
        }
        hi = hi.min(instant_at(date, close_min, tz).unwrap_or(day_end));
    }
    if lo >= hi {
        return;
    }

    let Some(mut cursor) = TimeKey::containing(lo, tz) else {
        return;
    };
    while cursor.date == date {
        match cursor.span(tz) {
            // The head hour is floored; a partial tail hour is dropped.
            Some(cell) if cell.end > hi => break,
            Some(cell) => {
                let keep = if visible {
                    view.is_eligible(&cursor)
                } else {
                    cell.start >= view.now
                };
                if keep {
                    out.push(cursor);
                }
            }
            // Hour skipped by a DST transition.
            None => {}
        }
        match cursor.next() {
            Some(next) => cursor = next,
            None => break,
        }
    }
}

/// Instant of `minutes` past local midnight on `date`; 1440 is the next midnight.
fn instant_at(date: NaiveDate, minutes: u16, tz: &Tz) -> Option<Ms> {
    if minutes >= 24 * 60 {
        return local_midnight(date.checked_add_days(Days::new(1))?, tz);
    }
    let naive = date.and_hms_opt(u32::from(minutes / 60), u32::from(minutes % 60), 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}
