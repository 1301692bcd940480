use std::collections::HashSet;

use chrono_tz::Tz;
use tracing::warn;

use crate::limits::{MAX_INTERVALS_PER_FEED, MAX_INTERVAL_SPAN_MS};
use crate::model::*;
use crate::timekey::{TimeKey, Week};

use super::merge::merge_overlapping;

/// Parse a booking feed into sorted, disjoint spans. Unparsable, inverted
/// and absurdly wide intervals are skipped and logged.
pub fn resolve_intervals(intervals: &[BookedInterval], tz: &Tz) -> Vec<Span> {
    if intervals.len() > MAX_INTERVALS_PER_FEED {
        warn!(
            "booking feed has {} intervals, keeping the first {MAX_INTERVALS_PER_FEED}",
            intervals.len()
        );
        metrics::counter!(crate::observability::FEED_ENTRIES_SKIPPED_TOTAL, "feed" => "bookings")
            .increment((intervals.len() - MAX_INTERVALS_PER_FEED) as u64);
    }
    let mut spans: Vec<Span> = intervals
        .iter()
        .take(MAX_INTERVALS_PER_FEED)
        .filter_map(|interval| match interval.parse(tz) {
            Some(span) if span.duration_ms() <= MAX_INTERVAL_SPAN_MS => Some(span),
            _ => {
                warn!(?interval, "skipping malformed booked interval");
                metrics::counter!(crate::observability::FEED_ENTRIES_SKIPPED_TOTAL, "feed" => "bookings")
                    .increment(1);
                None
            }
        })
        .collect();
    spans.sort_by_key(|s| s.start);
    merge_overlapping(&spans)
}

/// Cells of `week` touched by any booking, even partially: a booking from
/// 14:30 to 15:30 takes both the 14:00 and the 15:00 cell.
pub fn taken_cells(booked: &[Span], week: &Week, tz: &Tz) -> HashSet<TimeKey> {
    week.cells()
        .filter(|key| key.span(tz).is_some_and(|cell| overlaps_any(booked, &cell)))
        .collect()
}

/// Parse and expand in one step.
pub fn conflicts(intervals: &[BookedInterval], week: &Week, tz: &Tz) -> HashSet<TimeKey> {
    taken_cells(&resolve_intervals(intervals, tz), week, tz)
}

/// `sorted` must be sorted and disjoint, as returned by [`resolve_intervals`].
fn overlaps_any(sorted: &[Span], span: &Span) -> bool {
    // First interval that ends after span.start is the only candidate.
    let idx = sorted.partition_point(|s| s.end <= span.start);
    sorted.get(idx).is_some_and(|s| s.overlaps(span))
}
