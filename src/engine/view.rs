use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;

use crate::model::*;
use crate::timekey::{TimeKey, Week};

use super::availability::day_bounds;

/// Where open cells come from.
#[derive(Debug, Clone, Copy)]
pub enum Openness<'a> {
    /// No venue: every existing, non-past cell is open.
    FreeForm,
    /// Venue rules, already expanded for the displayed week.
    Venue {
        windows: &'a [RuleWindow],
        open: &'a HashSet<TimeKey>,
    },
}

/// Eligibility of cells in the displayed week, built only once both feeds
/// for that week are in. Everything outside the week is [`CellStatus::OutOfView`].
#[derive(Debug, Clone, Copy)]
pub struct GridView<'a> {
    pub week: Week,
    pub tz: Tz,
    pub now: Ms,
    pub openness: Openness<'a>,
    pub booked: &'a HashSet<TimeKey>,
}

impl GridView<'_> {
    pub fn shows(&self, date: NaiveDate) -> bool {
        self.week.contains(date)
    }

    pub fn status(&self, key: &TimeKey) -> CellStatus {
        if !self.shows(key.date) {
            return CellStatus::OutOfView;
        }
        let Some(start) = key.start_ms(&self.tz) else {
            return CellStatus::Unavailable;
        };
        if start < self.now {
            return CellStatus::Past;
        }
        if self.booked.contains(key) {
            return CellStatus::Booked;
        }
        match self.openness {
            Openness::Venue { open, .. } if !open.contains(key) => CellStatus::Unavailable,
            _ => CellStatus::Open,
        }
    }

    pub fn is_eligible(&self, key: &TimeKey) -> bool {
        self.status(key) == CellStatus::Open
    }

    /// Eligible cells of one date, in hour order.
    pub fn eligible_on(&self, date: NaiveDate) -> Vec<TimeKey> {
        TimeKey::day(date).filter(|k| self.is_eligible(k)).collect()
    }

    /// The venue's opening bounds on `date` in minutes, `Some((0, 1440))` in
    /// free-form mode, `None` when the venue never opens that weekday.
    pub fn day_bounds(&self, date: NaiveDate) -> Option<(u16, u16)> {
        match self.openness {
            Openness::FreeForm => Some((0, 24 * 60)),
            Openness::Venue { windows, .. } => day_bounds(windows, date.weekday()),
        }
    }
}
