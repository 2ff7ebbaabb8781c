//! Task queue abstraction (mechanics only).
//!
//! The queue decouples submission (synchronous, inside an API request) from
//! execution (asynchronous, on a pool of workers). It is a **work queue**,
//! not pub/sub: each published message is consumed by exactly one
//! subscriber, but delivery is **at-least-once** — a message may be
//! redelivered after a worker crash, so consumers must be idempotent. The
//! execution engine's terminal-state guard is what makes redelivery safe.

pub mod memory;
pub mod task;

pub use memory::InMemoryTaskQueue;
pub use task::TaskMessage;

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription handing tasks to one worker thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// At-least-once task channel between the submission service and workers.
///
/// `publish()` failures surface to the submitter, which must not leave an
/// orphaned pending record behind (the submission service marks the record
/// failed instead).
pub trait TaskQueue: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: TaskMessage) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<TaskMessage>;
}

impl<Q> TaskQueue for Arc<Q>
where
    Q: TaskQueue + ?Sized,
{
    type Error = Q::Error;

    fn publish(&self, message: TaskMessage) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<TaskMessage> {
        (**self).subscribe()
    }
}
