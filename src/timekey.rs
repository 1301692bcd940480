//! Cell addressing: a [`TimeKey`] names one wall-clock hour on one calendar
//! date in the venue's time zone, and a [`Week`] names the seven dates the
//! grid currently shows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{HOUR_MS, Ms, Span};

pub const HOURS_PER_DAY: u8 = 24;

/// One bookable `(date, hour)` cell. Ordered by date, then hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeKey {
    pub date: NaiveDate,
    pub hour: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeKeyError(String);

impl fmt::Display for ParseTimeKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time key: {:?}", self.0)
    }
}

impl std::error::Error for ParseTimeKeyError {}

impl TimeKey {
    /// `None` when `hour` is not a valid hour of day.
    pub fn new(date: NaiveDate, hour: u8) -> Option<Self> {
        (hour < HOURS_PER_DAY).then_some(Self { date, hour })
    }

    /// The cell containing instant `at`, read on the wall clock of `tz`.
    pub fn containing(at: Ms, tz: &Tz) -> Option<Self> {
        let local = DateTime::<Utc>::from_timestamp_millis(at)?.with_timezone(tz);
        Some(Self {
            date: local.date_naive(),
            hour: local.hour() as u8,
        })
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    /// Absolute instant at which the cell starts. `None` if the wall-clock
    /// hour does not exist in `tz` (spring-forward gap).
    pub fn start_ms(&self, tz: &Tz) -> Option<Ms> {
        let naive = self.date.and_hms_opt(u32::from(self.hour), 0, 0)?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp_millis())
    }

    /// The cell's span on the absolute timeline: from its start to the start
    /// of the next wall-clock cell that exists. A repeated fall-back hour
    /// therefore covers both occurrences.
    pub fn span(&self, tz: &Tz) -> Option<Span> {
        let start = self.start_ms(tz)?;
        let end = std::iter::successors(self.next(), TimeKey::next)
            .take(usize::from(HOURS_PER_DAY))
            .find_map(|k| k.start_ms(tz))
            .filter(|end| *end > start)
            .unwrap_or(start + HOUR_MS);
        Some(Span::new(start, end))
    }

    /// Next wall-clock cell, rolling over midnight.
    pub fn next(&self) -> Option<Self> {
        if self.hour + 1 < HOURS_PER_DAY {
            Some(Self { date: self.date, hour: self.hour + 1 })
        } else {
            Some(Self { date: self.date.succ_opt()?, hour: 0 })
        }
    }

    /// All cells of `date`, in hour order.
    pub fn day(date: NaiveDate) -> impl Iterator<Item = TimeKey> {
        (0..HOURS_PER_DAY).map(move |hour| TimeKey { date, hour })
    }

    /// Cells between `self` and `other` on the same date, inclusive, in hour
    /// order regardless of which end is given first. Empty across dates.
    pub fn same_day_range(&self, other: &TimeKey) -> Vec<TimeKey> {
        if self.date != other.date {
            return Vec::new();
        }
        let (lo, hi) = if self.hour <= other.hour {
            (self.hour, other.hour)
        } else {
            (other.hour, self.hour)
        };
        (lo..=hi).map(|hour| TimeKey { date: self.date, hour }).collect()
    }
}

/// Canonical form: `YYYY-MM-DDTHH`.
impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{:02}", self.date.format("%Y-%m-%d"), self.hour)
    }
}

impl FromStr for TimeKey {
    type Err = ParseTimeKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeKeyError(s.to_string());
        let (date, hour) = s.split_once('T').ok_or_else(err)?;
        if hour.len() != 2 || !hour.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| err())?;
        let hour: u8 = hour.parse().map_err(|_| err())?;
        TimeKey::new(date, hour).ok_or_else(err)
    }
}

impl Serialize for TimeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Week ─────────────────────────────────────────────────────────

/// Seven consecutive dates starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Week {
    pub start: NaiveDate,
}

impl Week {
    /// The week containing `date`, beginning on `week_start`.
    pub fn containing(date: NaiveDate, week_start: Weekday) -> Self {
        let back = (7 + date.weekday().num_days_from_monday()
            - week_start.num_days_from_monday())
            % 7;
        let start = date.checked_sub_days(Days::new(u64::from(back))).unwrap_or(date);
        Self { start }
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(7)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start
            && self
                .start
                .checked_add_days(Days::new(7))
                .is_none_or(|end| date < end)
    }

    pub fn next(&self) -> Self {
        Self {
            start: self.start.checked_add_days(Days::new(7)).unwrap_or(self.start),
        }
    }

    pub fn previous(&self) -> Self {
        Self {
            start: self.start.checked_sub_days(Days::new(7)).unwrap_or(self.start),
        }
    }

    /// Every cell of the week, date by date, hour by hour.
    pub fn cells(&self) -> impl Iterator<Item = TimeKey> + '_ {
        self.dates().flat_map(TimeKey::day)
    }

    /// Absolute window covering the week's local days, used to query the
    /// booking feed. `None` only for dates at the edge of chrono's range.
    pub fn window(&self, tz: &Tz) -> Option<Span> {
        let start = local_midnight(self.start, tz)?;
        let end = local_midnight(self.start.checked_add_days(Days::new(7))?, tz)?;
        Some(Span::new(start, end))
    }
}

/// First existing instant of `date` on the wall clock of `tz`.
pub fn local_midnight(date: NaiveDate, tz: &Tz) -> Option<Ms> {
    // Some zones skip midnight itself on DST days; take the first hour that exists.
    (0..HOURS_PER_DAY).find_map(|hour| TimeKey { date, hour }.start_ms(tz))
}
