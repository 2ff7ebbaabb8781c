//! Worker-side task execution.
//!
//! `handle_task` is the whole lifecycle of one delivered task: claim the
//! record, fetch the input, run the processor, store the result, write the
//! terminal state. Every failure is converted into a terminal record update;
//! nothing propagates out to kill the worker thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use serde_json::{Value as JsonValue, json};
use tracing::{debug, error, info, warn};

use benchrun_queue::TaskMessage;
use benchrun_runs::run::AnalysisRun;
use benchrun_runs::store::RunStore;
use benchrun_storage::keys::{RESULTS_JSON, result_key};
use benchrun_storage::{ObjectStore, StorageConfig};
use benchrun_tools::{ToolInput, ToolRegistry};

use crate::retry::RetryPolicy;

/// What happened to one delivered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The run completed and the result document was stored.
    Completed,
    /// The run ended `Failed` after exhausting its options.
    Failed,
    /// The record was already terminal; the task was ignored. This is the
    /// normal shape of an at-least-once redelivery.
    Duplicate,
    /// The task could not be mapped to a run record and was discarded.
    Dropped,
}

/// One failed attempt, and whether retrying could change anything.
#[derive(Debug)]
struct AttemptFailure {
    stage: &'static str,
    message: String,
    retryable: bool,
}

impl AttemptFailure {
    fn terminal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            retryable: false,
        }
    }
}

/// Executes delivered tasks against the run store, object store, and tool
/// registry.
pub struct ExecutionEngine<S, O> {
    runs: S,
    objects: O,
    registry: Arc<ToolRegistry>,
    storage: StorageConfig,
    policy: RetryPolicy,
}

impl<S, O> ExecutionEngine<S, O>
where
    S: RunStore,
    O: ObjectStore,
{
    pub fn new(
        runs: S,
        objects: O,
        registry: Arc<ToolRegistry>,
        storage: StorageConfig,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            runs,
            objects,
            registry,
            storage,
            policy,
        }
    }

    /// Execute one delivered task end to end. Never panics, never returns
    /// an error: every path ends in a `TaskOutcome` and (when a record
    /// exists) a persisted terminal state.
    pub fn handle_task(&self, message: &TaskMessage) -> TaskOutcome {
        let mut run = match self.runs.get(message.run_id) {
            Ok(Some(run)) => run,
            Ok(None) => {
                warn!(run_id = %message.run_id, "task references no run record; dropping");
                return TaskOutcome::Dropped;
            }
            Err(e) => {
                error!(run_id = %message.run_id, error = %e, "run store unavailable; dropping task");
                return TaskOutcome::Dropped;
            }
        };

        // The only redelivery guard. Everything downstream may assume it
        // holds the sole live execution of this run.
        if run.status.is_terminal() {
            info!(
                run_id = %run.id,
                status = run.status.as_str(),
                "run already terminal; ignoring redelivered task"
            );
            return TaskOutcome::Duplicate;
        }

        if run.begin_running().is_err() {
            // Lost a race with another terminal write between the guard and
            // here; treat it like the guard firing.
            return TaskOutcome::Duplicate;
        }
        run.append_log("worker claimed task");
        if let Err(e) = self.runs.update(&run) {
            warn!(run_id = %run.id, error = %e, "could not persist running state; continuing");
        }

        let outcome = self.attempt_with_retry(&mut run);
        self.finalize(run, outcome)
    }

    fn attempt_with_retry(&self, run: &mut AnalysisRun) -> Result<JsonValue, AttemptFailure> {
        let mut retries = 0u32;
        loop {
            // Panic boundary: a panicking processor (or storage backend)
            // must still reach `finalize`, not unwind out of the worker.
            let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.attempt(run)));
            let attempt = attempt.unwrap_or_else(|payload| {
                let message = panic_message(payload);
                error!(run_id = %run.id, message = %message, "task panicked");
                Err(AttemptFailure::terminal(
                    "panic",
                    format!("task panicked: {message}"),
                ))
            });
            match attempt {
                Ok(artifacts) => return Ok(artifacts),
                Err(failure) if failure.retryable && retries < self.policy.max_retries => {
                    retries += 1;
                    warn!(
                        run_id = %run.id,
                        stage = failure.stage,
                        retries,
                        "attempt failed; retrying after delay"
                    );
                    run.append_log(&format!(
                        "attempt failed at {}: {}; retry {} of {} in {:?}",
                        failure.stage, failure.message, retries, self.policy.max_retries, self.policy.delay
                    ));
                    thread::sleep(self.policy.delay);
                }
                Err(failure) => return Err(failure),
            }
        }
    }

    /// One full download -> process -> upload pass.
    fn attempt(&self, run: &mut AnalysisRun) -> Result<JsonValue, AttemptFailure> {
        // The record is authoritative for both input key and tool id; the
        // message is only the wakeup signal.
        let bytes = self
            .objects
            .download(&self.storage.datasets_bucket, &run.primary_input_key)
            .map_err(|e| AttemptFailure {
                stage: "download",
                message: e.to_string(),
                retryable: e.is_transient(),
            })?;
        debug!(run_id = %run.id, size = bytes.len(), "input downloaded");
        run.append_log(&format!("downloaded input ({} bytes)", bytes.len()));

        let tool = self.registry.get(&run.tool_id).ok_or_else(|| {
            AttemptFailure::terminal("dispatch", format!("unknown tool '{}'", run.tool_id))
        })?;

        let filename = run
            .primary_input_key
            .rsplit('/')
            .next()
            .unwrap_or(run.primary_input_key.as_str())
            .to_string();
        let input = ToolInput::new(bytes, filename);
        let output = tool
            .processor
            .run(&input, &run.parameters)
            .map_err(|e| AttemptFailure {
                stage: "process",
                message: e.to_string(),
                retryable: e.is_retryable(),
            })?;
        run.append_log("processor finished");

        let body = serde_json::to_vec(&output.result).map_err(|e| {
            AttemptFailure::terminal("encode", format!("result not serializable: {e}"))
        })?;
        let key = result_key(run.id, RESULTS_JSON);
        let location = self
            .objects
            .upload(&self.storage.results_bucket, &key, &body)
            .map_err(|e| AttemptFailure {
                stage: "upload",
                message: e.to_string(),
                retryable: e.is_transient(),
            })?;
        run.append_log(&format!("result stored at {location}"));

        Ok(json!({
            "results_json_location": location,
            "summary_stats": output.summary_stats,
        }))
    }

    /// The single terminal write for every execution path.
    fn finalize(&self, mut run: AnalysisRun, outcome: Result<JsonValue, AttemptFailure>) -> TaskOutcome {
        let task_outcome = match outcome {
            Ok(artifacts) => {
                run.append_log("run completed");
                match run.complete(artifacts) {
                    Ok(()) => {
                        info!(run_id = %run.id, "run completed");
                        TaskOutcome::Completed
                    }
                    Err(e) => {
                        error!(run_id = %run.id, error = %e, "completed work but record rejected the transition");
                        TaskOutcome::Duplicate
                    }
                }
            }
            Err(failure) => {
                run.append_log(&format!("run failed at {}: {}", failure.stage, failure.message));
                let diagnostics = json!({
                    "error_details": failure.message,
                    "stage": failure.stage,
                });
                match run.fail(failure.message.clone(), Some(diagnostics)) {
                    Ok(()) => {
                        warn!(run_id = %run.id, stage = failure.stage, error = %failure.message, "run failed");
                        TaskOutcome::Failed
                    }
                    Err(e) => {
                        error!(run_id = %run.id, error = %e, "failed work but record rejected the transition");
                        TaskOutcome::Duplicate
                    }
                }
            }
        };

        if let Err(e) = self.runs.update(&run) {
            error!(run_id = %run.id, error = %e, "could not persist terminal state");
        }
        task_outcome
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
