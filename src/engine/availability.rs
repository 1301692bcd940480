use std::collections::HashSet;

use chrono::Weekday;
use chrono_tz::Tz;
use tracing::warn;

use crate::limits::MAX_RULES_PER_VENUE;
use crate::model::*;
use crate::timekey::{TimeKey, Week};

// ── Availability Algorithm ────────────────────────────────────────

/// Parse a venue's weekly rules, skipping (and logging) anything malformed.
pub fn resolve_rules(rules: &[AvailabilityRule]) -> Vec<RuleWindow> {
    if rules.len() > MAX_RULES_PER_VENUE {
        warn!(
            "availability feed has {} rules, keeping the first {MAX_RULES_PER_VENUE}",
            rules.len()
        );
        metrics::counter!(crate::observability::FEED_ENTRIES_SKIPPED_TOTAL, "feed" => "availability")
            .increment((rules.len() - MAX_RULES_PER_VENUE) as u64);
    }
    rules
        .iter()
        .take(MAX_RULES_PER_VENUE)
        .filter_map(|rule| {
            let parsed = rule.parse();
            if parsed.is_none() {
                warn!(?rule, "skipping malformed availability rule");
                metrics::counter!(crate::observability::FEED_ENTRIES_SKIPPED_TOTAL, "feed" => "availability")
                    .increment(1);
            }
            parsed
        })
        .collect()
}

/// Hours of the day a single window opens. The start is floored to the hour;
/// a trailing partial hour is dropped, so 09:00-17:30 yields 9..=16.
pub fn window_hours(window: &RuleWindow) -> std::ops::Range<u8> {
    let first = (window.start / 60) as u8;
    let end = (window.end / 60) as u8;
    first..end.max(first)
}

/// Cells open for booking in `week`: every whole hour of every rule whose
/// day of week matches a date of the week. Wall-clock hours that do not
/// exist in `tz` are never open.
pub fn open_cells(rules: &[RuleWindow], week: &Week, tz: &Tz) -> HashSet<TimeKey> {
    let mut open = HashSet::new();
    for date in week.dates() {
        let weekday = chrono::Datelike::weekday(&date);
        for rule in rules.iter().filter(|r| r.day == weekday) {
            for hour in window_hours(rule) {
                let key = TimeKey { date, hour };
                if key.span(tz).is_some() {
                    open.insert(key);
                }
            }
        }
    }
    open
}

/// Parse and expand in one step.
pub fn availability(rules: &[AvailabilityRule], week: &Week, tz: &Tz) -> HashSet<TimeKey> {
    open_cells(&resolve_rules(rules), week, tz)
}

/// Outer bounds `(earliest start, latest end)` in minutes over every rule
/// for `day`, or `None` if the venue never opens that day.
pub fn day_bounds(rules: &[RuleWindow], day: Weekday) -> Option<(u16, u16)> {
    rules
        .iter()
        .filter(|r| r.day == day)
        .fold(None, |acc, r| match acc {
            None => Some((r.start, r.end)),
            Some((s, e)) => Some((s.min(r.start), e.max(r.end))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn week() -> Week {
        // Monday 2026-03-02 .. Sunday 2026-03-08
        Week::containing(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(), Weekday::Mon)
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn hours_on(open: &HashSet<TimeKey>, date: NaiveDate) -> Vec<u8> {
        let mut hours: Vec<u8> = open.iter().filter(|k| k.date == date).map(|k| k.hour).collect();
        hours.sort();
        hours
    }

    #[test]
    fn whole_hour_window_yields_one_cell_per_hour() {
        let open = availability(&[AvailabilityRule::new("MONDAY", "09:00", "17:00")], &week(), &Tz::UTC);
        assert_eq!(hours_on(&open, monday()), (9..17).collect::<Vec<u8>>());
        assert_eq!(open.len(), 8);
    }

    #[test]
    fn partial_tail_is_truncated() {
        let open = availability(&[AvailabilityRule::new("MONDAY", "09:00", "17:30")], &week(), &Tz::UTC);
        assert_eq!(hours_on(&open, monday()), (9..17).collect::<Vec<u8>>());
    }

    #[test]
    fn partial_head_is_floored() {
        let open = availability(&[AvailabilityRule::new("MONDAY", "09:30", "12:00")], &week(), &Tz::UTC);
        assert_eq!(hours_on(&open, monday()), vec![9, 10, 11]);
    }

    #[test]
    fn sub_hour_window_yields_nothing() {
        let open = availability(&[AvailabilityRule::new("MONDAY", "09:10", "09:50")], &week(), &Tz::UTC);
        assert!(open.is_empty());
    }

    #[test]
    fn end_of_day_window() {
        let open = availability(&[AvailabilityRule::new("SUNDAY", "22:00", "24:00")], &week(), &Tz::UTC);
        let sunday = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        assert_eq!(hours_on(&open, sunday), vec![22, 23]);
    }

    #[test]
    fn days_without_rules_contribute_nothing() {
        let open = availability(&[AvailabilityRule::new("MONDAY", "09:00", "10:00")], &week(), &Tz::UTC);
        for date in week().dates().skip(1) {
            assert!(hours_on(&open, date).is_empty());
        }
    }

    #[test]
    fn multiple_rules_same_day_union() {
        let open = availability(
            &[
                AvailabilityRule::new("MONDAY", "08:00", "10:00"),
                AvailabilityRule::new("MONDAY", "14:00", "16:00"),
                AvailabilityRule::new("MONDAY", "09:00", "11:00"),
            ],
            &week(),
            &Tz::UTC,
        );
        assert_eq!(hours_on(&open, monday()), vec![8, 9, 10, 14, 15]);
    }

    #[test]
    fn malformed_rules_are_skipped() {
        let rules = [
            AvailabilityRule::new("MONDAY", "9am", "17:00"),
            AvailabilityRule::new("BLURSDAY", "09:00", "17:00"),
            AvailabilityRule::new("TUESDAY", "10:00", "12:00"),
        ];
        let parsed = resolve_rules(&rules);
        assert_eq!(parsed.len(), 1);
        let open = open_cells(&parsed, &week(), &Tz::UTC);
        assert_eq!(open.len(), 2);
    }

    #[test]
    fn dst_gap_hour_is_never_open() {
        // 2026-03-29 is a Sunday; Zurich jumps from 02:00 to 03:00.
        let week = Week::containing(NaiveDate::from_ymd_opt(2026, 3, 29).unwrap(), Weekday::Mon);
        let open = availability(&[AvailabilityRule::new("SUNDAY", "00:00", "06:00")], &week, &Tz::Europe__Zurich);
        let sunday = NaiveDate::from_ymd_opt(2026, 3, 29).unwrap();
        assert_eq!(hours_on(&open, sunday), vec![0, 1, 3, 4, 5]);
    }

    #[test]
    fn day_bounds_spans_all_rules_of_the_day() {
        let rules = resolve_rules(&[
            AvailabilityRule::new("MONDAY", "14:00", "16:00"),
            AvailabilityRule::new("MONDAY", "08:30", "10:00"),
            AvailabilityRule::new("TUESDAY", "06:00", "22:00"),
        ]);
        assert_eq!(day_bounds(&rules, Weekday::Mon), Some((510, 960)));
        assert_eq!(day_bounds(&rules, Weekday::Wed), None);
    }
}
