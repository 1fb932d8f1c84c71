//! Per-artifact inbound message queue
//!
//! FIFO, unbounded, no deduplication. The producer side never blocks, so the
//! dispatch bridge can enqueue from any task. Consumers poll or wait with a
//! timeout; an empty mailbox is `None`, never an error.

use std::collections::VecDeque;
use std::pin::pin;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use artifact_core::Message;

/// Inbound messages awaiting [`receive`](Mailbox::receive)
#[derive(Debug, Default)]
pub struct Mailbox {
    queue: Mutex<VecDeque<Message>>,
    notify: Notify,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and wake one waiting receiver
    pub fn enqueue(&self, message: Message) {
        self.queue.lock().push_back(message);
        self.notify.notify_one();
    }

    /// Take the oldest message without waiting
    pub fn try_receive(&self) -> Option<Message> {
        self.queue.lock().pop_front()
    }

    /// Take the oldest message
    ///
    /// With `None` this does not wait. With `Some(timeout)` it waits up to
    /// `timeout` for a message to arrive. A wait that expires deregisters
    /// itself and returns `None`.
    pub async fn receive(&self, timeout: Option<Duration>) -> Option<Message> {
        let Some(timeout) = timeout else {
            return self.try_receive();
        };
        // A timeout too large to represent waits without a deadline
        let deadline = Instant::now().checked_add(timeout);

        loop {
            // Register interest before checking, so an enqueue in between
            // is not missed
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            if let Some(message) = self.try_receive() {
                return Some(message);
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return self.try_receive();
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Number of undelivered messages
    pub fn size(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
