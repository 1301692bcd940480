use chrono::{DateTime, NaiveDateTime, TimeZone, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only instant type.
pub type Ms = i64;

pub const HOUR_MS: Ms = 3_600_000;

/// Identifies the venue whose availability and bookings drive the grid.
pub type VenueId = Ulid;

/// Identifies one client's booking session in the registry.
pub type SessionId = Ulid;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A maximal contiguous run of selected cells, as reported to the caller.
pub type SelectedRange = Span;

/// Recurring weekly open window for a venue, as delivered by the venue
/// availability service. Fields stay textual so a malformed entry can be
/// skipped by the resolver instead of poisoning the whole feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRule {
    #[serde(alias = "dayOfWeek")]
    pub day_of_week: String,
    #[serde(alias = "startTime")]
    pub start_time: String,
    #[serde(alias = "endTime")]
    pub end_time: String,
}

impl AvailabilityRule {
    pub fn new(day_of_week: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            day_of_week: day_of_week.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }

    /// Parse into a weekday and a `[start, end)` minute-of-day window.
    /// `None` for anything unparsable or an empty window.
    pub fn parse(&self) -> Option<RuleWindow> {
        let day = self.day_of_week.trim().parse::<Weekday>().ok()?;
        let start = parse_clock(&self.start_time)?;
        let end = parse_clock(&self.end_time)?;
        if start >= end {
            return None;
        }
        Some(RuleWindow { day, start, end })
    }
}

/// Parsed form of an [`AvailabilityRule`]: minutes since local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleWindow {
    pub day: Weekday,
    pub start: u16,
    pub end: u16,
}

/// An already-confirmed reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInterval {
    pub start: String,
    pub end: String,
}

impl BookedInterval {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    pub fn parse(&self, tz: &Tz) -> Option<Span> {
        parse_span(&self.start, &self.end, tz)
    }
}

/// A previously saved selection handed back to the engine (e.g. a draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialSlot {
    pub start: String,
    pub end: String,
}

impl InitialSlot {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    pub fn parse(&self, tz: &Tz) -> Option<Span> {
        parse_span(&self.start, &self.end, tz)
    }
}

/// Payload of every selection change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEvent {
    pub ranges: Vec<SelectedRange>,
}

/// Why a cell can or cannot be picked, for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellStatus {
    /// Feeds for the displayed week have not arrived yet.
    Loading,
    /// Not part of the displayed week; nothing is known about it.
    OutOfView,
    Past,
    Booked,
    Unavailable,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellState {
    pub status: CellStatus,
    pub selected: bool,
}

// ── Parsing ──────────────────────────────────────────────────────

/// `HH:MM` or `HH:MM:SS` to minutes since midnight. `24:00` is end of day.
pub fn parse_clock(s: &str) -> Option<u16> {
    let mut parts = s.trim().split(':');
    let hour: u16 = parts.next()?.trim().parse().ok()?;
    let minute: u16 = parts.next()?.trim().parse().ok()?;
    let second: u16 = match parts.next() {
        Some(sec) => sec.trim().parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || minute > 59 || second > 59 {
        return None;
    }
    match hour {
        0..=23 => Some(hour * 60 + minute),
        24 if minute == 0 && second == 0 => Some(24 * 60),
        _ => None,
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// RFC 3339, or a naive local timestamp interpreted in `tz`.
pub fn parse_timestamp(s: &str, tz: &Tz) -> Option<Ms> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    NAIVE_FORMATS.iter().find_map(|fmt| {
        let naive = NaiveDateTime::parse_from_str(s, fmt).ok()?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp_millis())
    })
}

fn parse_span(start: &str, end: &str, tz: &Tz) -> Option<Span> {
    let start = parse_timestamp(start, tz)?;
    let end = parse_timestamp(end, tz)?;
    (start < end).then(|| Span::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration_ms(), 100);
        assert!(s.contains_span(&Span::new(100, 200)));
        assert!(!s.contains_span(&Span::new(50, 150)));
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn clock_parsing() {
        assert_eq!(parse_clock("09:00"), Some(540));
        assert_eq!(parse_clock("17:30"), Some(1050));
        assert_eq!(parse_clock("08:15:00"), Some(495));
        assert_eq!(parse_clock("24:00"), Some(1440));
        assert_eq!(parse_clock("24:30"), None);
        assert_eq!(parse_clock("9"), None);
        assert_eq!(parse_clock("ab:cd"), None);
        assert_eq!(parse_clock("10:61"), None);
        assert_eq!(parse_clock("10:00:00:00"), None);
    }

    #[test]
    fn rule_parsing_accepts_day_spellings() {
        let r = AvailabilityRule::new("MONDAY", "09:00", "17:00").parse().unwrap();
        assert_eq!(r.day, Weekday::Mon);
        assert_eq!((r.start, r.end), (540, 1020));
        assert_eq!(
            AvailabilityRule::new("tue", "09:00", "10:00").parse().unwrap().day,
            Weekday::Tue
        );
    }

    #[test]
    fn rule_parsing_rejects_garbage() {
        assert!(AvailabilityRule::new("FUNDAY", "09:00", "17:00").parse().is_none());
        assert!(AvailabilityRule::new("MONDAY", "nine", "17:00").parse().is_none());
        assert!(AvailabilityRule::new("MONDAY", "17:00", "09:00").parse().is_none());
    }

    #[test]
    fn rule_deserializes_camel_case() {
        let r: AvailabilityRule = serde_json::from_str(
            r#"{"dayOfWeek":"FRIDAY","startTime":"10:00","endTime":"12:00"}"#,
        )
        .unwrap();
        assert_eq!(r, AvailabilityRule::new("FRIDAY", "10:00", "12:00"));
    }

    #[test]
    fn timestamp_parsing() {
        let utc = Tz::UTC;
        assert_eq!(parse_timestamp("1970-01-01T01:00:00Z", &utc), Some(HOUR_MS));
        assert_eq!(parse_timestamp("1970-01-01T02:00:00+01:00", &utc), Some(HOUR_MS));
        assert_eq!(parse_timestamp("1970-01-01T01:00", &utc), Some(HOUR_MS));
        assert_eq!(parse_timestamp("1970-01-01 01:00:00", &utc), Some(HOUR_MS));
        assert_eq!(parse_timestamp("not a time", &utc), None);

        let zurich = Tz::Europe__Zurich;
        assert_eq!(parse_timestamp("1970-01-01T02:00", &zurich), Some(HOUR_MS));
    }

    #[test]
    fn interval_parsing_rejects_inverted() {
        let utc = Tz::UTC;
        assert!(BookedInterval::new("1970-01-01T02:00:00Z", "1970-01-01T01:00:00Z").parse(&utc).is_none());
        assert!(BookedInterval::new("1970-01-01T01:00:00Z", "1970-01-01T01:00:00Z").parse(&utc).is_none());
        assert_eq!(
            InitialSlot::new("1970-01-01T01:00:00Z", "1970-01-01T03:00:00Z").parse(&utc),
            Some(Span::new(HOUR_MS, 3 * HOUR_MS))
        );
    }
}
