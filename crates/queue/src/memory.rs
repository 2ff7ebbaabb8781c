//! In-memory task queue for tests/dev.

use std::collections::VecDeque;
use std::sync::{Mutex, mpsc};

use crate::task::TaskMessage;
use crate::{Subscription, TaskQueue};

#[derive(Debug, thiserror::Error)]
pub enum InMemoryQueueError {
    /// Publish failed due to internal lock poisoning.
    #[error("task queue lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
struct QueueInner {
    subscribers: Vec<mpsc::Sender<TaskMessage>>,
    next: usize,
    /// Messages published before any worker subscribed.
    backlog: VecDeque<TaskMessage>,
}

/// In-memory work queue.
///
/// - No IO / no async
/// - Each message goes to one subscriber (round-robin over live workers)
/// - Backlogged while no subscriber is attached
/// - At-least-once acceptable (consumers must be idempotent)
#[derive(Debug, Default)]
pub struct InMemoryTaskQueue {
    inner: Mutex<QueueInner>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueInner {
    fn dispatch(&mut self, message: TaskMessage) {
        let mut message = Some(message);

        // Round-robin, dropping dead subscribers along the way.
        while !self.subscribers.is_empty() {
            let idx = self.next % self.subscribers.len();
            match self.subscribers[idx].send(message.take().expect("message consumed twice")) {
                Ok(()) => {
                    self.next = idx + 1;
                    return;
                }
                Err(mpsc::SendError(returned)) => {
                    message = Some(returned);
                    self.subscribers.remove(idx);
                }
            }
        }

        self.backlog
            .push_back(message.expect("message consumed twice"));
    }
}

impl TaskQueue for InMemoryTaskQueue {
    type Error = InMemoryQueueError;

    fn publish(&self, message: TaskMessage) -> Result<(), Self::Error> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| InMemoryQueueError::Poisoned)?;
        inner.dispatch(message);
        Ok(())
    }

    fn subscribe(&self) -> Subscription<TaskMessage> {
        let (tx, rx) = mpsc::channel();

        if let Ok(mut inner) = self.inner.lock() {
            // Drain anything that arrived before the first worker.
            while let Some(msg) = inner.backlog.pop_front() {
                if tx.send(msg).is_err() {
                    break;
                }
            }
            inner.subscribers.push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchrun_core::RunId;
    use serde_json::json;
    use std::time::Duration;

    fn msg(key: &str) -> TaskMessage {
        TaskMessage::new(RunId::new(), key, json!({}))
    }

    #[test]
    fn each_message_reaches_exactly_one_subscriber() {
        let queue = InMemoryTaskQueue::new();
        let a = queue.subscribe();
        let b = queue.subscribe();

        queue.publish(msg("one")).unwrap();
        queue.publish(msg("two")).unwrap();

        let got_a = a.recv_timeout(Duration::from_millis(100)).unwrap();
        let got_b = b.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_ne!(got_a.input_key, got_b.input_key);

        assert!(a.try_recv().is_err());
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn backlog_drains_to_first_subscriber() {
        let queue = InMemoryTaskQueue::new();
        queue.publish(msg("early")).unwrap();

        let sub = queue.subscribe();
        let got = sub.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(got.input_key, "early");
    }

    #[test]
    fn publish_error_formats_like_every_other_error() {
        assert_eq!(
            InMemoryQueueError::Poisoned.to_string(),
            "task queue lock poisoned"
        );
    }

    #[test]
    fn dead_subscribers_are_skipped() {
        let queue = InMemoryTaskQueue::new();
        let dead = queue.subscribe();
        drop(dead);
        let live = queue.subscribe();

        queue.publish(msg("survivor")).unwrap();
        let got = live.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(got.input_key, "survivor");
    }
}
