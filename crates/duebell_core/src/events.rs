use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::{Arc, Mutex};

/// Signal that the task list changed and any view should be redrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChanged;

/// Fan-out of [`DataChanged`] signals to every subscriber.
///
/// Each subscriber owns a one-slot channel, so a burst of changes collapses
/// into a single pending redraw and publishing never blocks.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    senders: Arc<Mutex<Vec<Sender<DataChanged>>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<DataChanged> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }

    pub fn publish(&self) {
        let mut senders = self
            .senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        senders.retain(|tx| !matches!(tx.try_send(DataChanged), Err(TrySendError::Disconnected(_))));
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
