use crate::timekey::TimeKey;

/// Pointer-drag state over the grid. A drag is pinned to the anchor's date:
/// cells on other dates never become `current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { anchor: TimeKey, current: TimeKey },
}

impl DragState {
    pub fn is_dragging(&self) -> bool {
        matches!(self, DragState::Dragging { .. })
    }

    /// Start a drag on an eligible cell. Ignored when the cell is ineligible
    /// or a drag is already under way. Returns whether a drag started.
    pub fn pointer_down(&mut self, key: TimeKey, eligible: bool) -> bool {
        match self {
            DragState::Idle if eligible => {
                *self = DragState::Dragging { anchor: key, current: key };
                true
            }
            _ => false,
        }
    }

    /// Move the drag head. Only eligible cells on the anchor's date are
    /// accepted; anything else leaves `current` where it was.
    pub fn pointer_enter(&mut self, key: TimeKey, eligible: bool) -> bool {
        match self {
            DragState::Dragging { anchor, current }
                if eligible && key.date == anchor.date && key != *current =>
            {
                *current = key;
                true
            }
            _ => false,
        }
    }

    /// End the drag, handing back `(anchor, current)` for the caller to
    /// commit. `None` when idle.
    pub fn release(&mut self) -> Option<(TimeKey, TimeKey)> {
        match std::mem::take(self) {
            DragState::Dragging { anchor, current } => Some((anchor, current)),
            DragState::Idle => None,
        }
    }

    /// Abandon the drag without committing. Returns whether one was active.
    pub fn cancel(&mut self) -> bool {
        std::mem::take(self).is_dragging()
    }

    /// Cells the drag currently covers, for highlighting.
    pub fn covered(&self) -> Vec<TimeKey> {
        match self {
            DragState::Dragging { anchor, current } => anchor.same_day_range(current),
            DragState::Idle => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn key(day: u32, hour: u8) -> TimeKey {
        TimeKey::new(NaiveDate::from_ymd_opt(2026, 3, day).unwrap(), hour).unwrap()
    }

    #[test]
    fn down_on_ineligible_stays_idle() {
        let mut drag = DragState::Idle;
        assert!(!drag.pointer_down(key(2, 10), false));
        assert_eq!(drag, DragState::Idle);
    }

    #[test]
    fn down_enter_release() {
        let mut drag = DragState::Idle;
        assert!(drag.pointer_down(key(2, 10), true));
        assert!(drag.pointer_enter(key(2, 12), true));
        assert_eq!(drag.covered(), vec![key(2, 10), key(2, 11), key(2, 12)]);
        assert_eq!(drag.release(), Some((key(2, 10), key(2, 12))));
        assert_eq!(drag, DragState::Idle);
    }

    #[test]
    fn enter_other_day_is_ignored() {
        let mut drag = DragState::Idle;
        drag.pointer_down(key(2, 10), true);
        drag.pointer_enter(key(2, 11), true);
        assert!(!drag.pointer_enter(key(3, 14), true));
        assert_eq!(drag.release(), Some((key(2, 10), key(2, 11))));
    }

    #[test]
    fn enter_ineligible_keeps_current() {
        let mut drag = DragState::Idle;
        drag.pointer_down(key(2, 10), true);
        assert!(!drag.pointer_enter(key(2, 11), false));
        assert_eq!(drag, DragState::Dragging { anchor: key(2, 10), current: key(2, 10) });
    }

    #[test]
    fn drag_upwards_covers_in_hour_order() {
        let mut drag = DragState::Idle;
        drag.pointer_down(key(2, 15), true);
        drag.pointer_enter(key(2, 13), true);
        assert_eq!(drag.covered(), vec![key(2, 13), key(2, 14), key(2, 15)]);
    }

    #[test]
    fn second_down_does_not_move_anchor() {
        let mut drag = DragState::Idle;
        drag.pointer_down(key(2, 10), true);
        assert!(!drag.pointer_down(key(2, 16), true));
        assert_eq!(drag.release(), Some((key(2, 10), key(2, 10))));
    }

    #[test]
    fn cancel_drops_the_gesture() {
        let mut drag = DragState::Idle;
        drag.pointer_down(key(2, 10), true);
        assert!(drag.cancel());
        assert_eq!(drag.release(), None);
        assert!(!drag.cancel());
    }

    #[test]
    fn release_when_idle_is_none() {
        let mut drag = DragState::Idle;
        assert_eq!(drag.release(), None);
    }
}
