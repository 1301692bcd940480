use tokio::sync::broadcast;

use crate::model::SelectionEvent;

const CHANNEL_CAPACITY: usize = 64;

/// Broadcast hub for selection changes of one engine.
pub struct NotifyHub {
    sender: broadcast::Sender<SelectionEvent>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to selection changes. A lagging receiver only misses
    /// intermediate states; each event carries the full selection.
    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, event: SelectionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
