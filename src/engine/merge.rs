use chrono_tz::Tz;

use crate::model::*;
use crate::timekey::TimeKey;

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// Collapse selected cells into maximal contiguous ranges, sorted by start.
///
/// Cells are placed on the absolute timeline before merging, so 23:00 and
/// the following 00:00 join into one range and DST transitions are honoured.
/// Keys with no instant in `tz` are ignored.
pub fn merge_cells<'a>(keys: impl IntoIterator<Item = &'a TimeKey>, tz: &Tz) -> Vec<SelectedRange> {
    let mut spans: Vec<Span> = keys.into_iter().filter_map(|k| k.span(tz)).collect();
    spans.sort_unstable_by_key(|s| s.start);
    merge_overlapping(&spans)
}
