//! Orchestration engine: submission on one side, worker execution on the
//! other, with the task queue in between.

pub mod execute;
pub mod retry;
pub mod submit;
pub mod worker;

pub use execute::{ExecutionEngine, TaskOutcome};
pub use retry::RetryPolicy;
pub use submit::{SubmissionService, SubmitError, SubmitRequest};
pub use worker::{WorkerConfig, WorkerPool, WorkerPoolHandle, WorkerStats};
