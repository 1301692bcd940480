use std::collections::HashSet;

use crate::timekey::{TimeKey, Week};

/// The user's cross-week selection. A plain set of cells: eligibility is the
/// caller's job, so the store never consults feeds or the clock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionStore {
    keys: HashSet<TimeKey>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_selected(&self, key: &TimeKey) -> bool {
        self.keys.contains(key)
    }

    /// All-or-nothing toggle: if every key is already selected, remove them
    /// all; otherwise add them all. An empty list changes nothing.
    /// Returns whether the store changed.
    pub fn toggle_range(&mut self, keys: &[TimeKey]) -> bool {
        if keys.is_empty() {
            return false;
        }
        if keys.iter().all(|k| self.keys.contains(k)) {
            self.remove_range(keys)
        } else {
            self.add_range(keys)
        }
    }

    /// Returns whether any key was new.
    pub fn add_range(&mut self, keys: &[TimeKey]) -> bool {
        let mut changed = false;
        for key in keys {
            changed |= self.keys.insert(*key);
        }
        changed
    }

    /// Unconditional removal. Returns whether any key was present.
    pub fn remove_range(&mut self, keys: &[TimeKey]) -> bool {
        let mut changed = false;
        for key in keys {
            changed |= self.keys.remove(key);
        }
        changed
    }

    /// Remove every key matching `pred`, returning the removed keys.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&TimeKey) -> bool) -> Vec<TimeKey> {
        let removed: Vec<TimeKey> = self.keys.iter().filter(|k| pred(*k)).copied().collect();
        for key in &removed {
            self.keys.remove(key);
        }
        removed
    }

    /// Selected cells falling in `week`.
    pub fn in_week<'a>(&'a self, week: &'a Week) -> impl Iterator<Item = &'a TimeKey> + 'a {
        self.keys.iter().filter(move |k| week.contains(k.date))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeKey> {
        self.keys.iter()
    }

    /// Read-only copy of the current selection.
    pub fn snapshot(&self) -> HashSet<TimeKey> {
        self.keys.clone()
    }
}
