//! The reconciliation event queue.
//!
//! Multiple producers (the local-watch and remote-listen roles, plus the
//! startup merge) feed one consumer (the apply role). FIFO per producer;
//! cross-producer order is arrival order at the lock.

use driftsync_types::FileData;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

/// A reconciliation event. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msg {
    /// Relative path under the sync directory.
    pub filename: String,
    /// Which side the event originated on.
    pub remote: bool,
    /// The event's asserted post-state.
    pub file_data: FileData,
}

#[derive(Default)]
struct State {
    queue: VecDeque<Msg>,
    done: bool,
}

/// FIFO of [`Msg`] with shutdown signalling.
///
/// Once [`close`](MsgQueue::close) raises the done flag, the consumer
/// observes shutdown on its next wake and pending messages are
/// abandoned; shutdown must not trigger further applies.
#[derive(Default)]
pub struct MsgQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl MsgQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and wakes the consumer.
    pub fn push(&self, msg: Msg) {
        self.state
            .lock()
            .expect("queue lock poisoned")
            .queue
            .push_back(msg);
        self.notify.notify_one();
    }

    /// Removes and returns the head message, waiting while the queue is
    /// empty. Returns `None` once the queue is closed.
    pub async fn pop_blocking(&self) -> Option<Msg> {
        loop {
            {
                let mut state = self.state.lock().expect("queue lock poisoned");
                if state.done {
                    return None;
                }
                if let Some(msg) = state.queue.pop_front() {
                    return Some(msg);
                }
            }
            // notify_one stores a permit, so a push between the check
            // above and this await completes immediately.
            self.notify.notified().await;
        }
    }

    /// Raises the done flag and wakes the consumer.
    pub fn close(&self) {
        self.state.lock().expect("queue lock poisoned").done = true;
        self.notify.notify_one();
    }

    /// Number of pending messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().expect("queue lock poisoned").queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
