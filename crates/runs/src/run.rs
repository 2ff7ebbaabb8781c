//! The analysis run record and its status/result update protocol.
//!
//! A run's `status`, timestamps, and output fields change only through the
//! methods on [`AnalysisRun`]. Transitions are monotonic along
//! `Pending -> Running -> {Completed, Failed, Cancelled}`; nothing re-enters
//! `Pending` or `Running` from a terminal state, `started_at` and
//! `completed_at` are each written at most once, and `output_artifacts` is
//! populated only when the record turns terminal (the result document on
//! `Completed`, a diagnostic document on `Failed`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use benchrun_core::{DomainError, DomainResult, ProjectId, RunId, UserId};

/// Lifecycle state of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Queued, waiting for a worker to pick the task up.
    Pending,
    /// A worker is executing the run.
    Running,
    /// Finished successfully; `output_artifacts` holds the result document.
    Completed,
    /// Finished unsuccessfully; `error_message` explains why.
    Failed,
    /// Withdrawn before a worker started it.
    Cancelled,
}

impl RunStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown run status: {other}"
            ))),
        }
    }
}

/// One submitted analysis job and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub id: RunId,
    /// User-facing label; cosmetic, mutable.
    pub name: Option<String>,
    pub description: Option<String>,

    /// Which registered tool executes this run. Immutable after creation.
    pub tool_id: String,
    pub tool_version: Option<String>,
    /// Opaque parameter document passed verbatim to the processor.
    pub parameters: JsonValue,

    pub status: RunStatus,

    /// Object-store key of the input artifact (datasets bucket). Immutable.
    pub primary_input_key: String,
    /// Result document once `Completed`, diagnostic document once `Failed`,
    /// `None` until terminal.
    pub output_artifacts: Option<JsonValue>,

    pub error_message: Option<String>,
    /// Append-only execution log.
    pub run_log: String,

    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub project_id: ProjectId,
    pub created_by: UserId,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRun {
    /// Create a run in `Pending` with `queued_at = now`.
    pub fn new(
        tool_id: impl Into<String>,
        tool_version: Option<String>,
        parameters: JsonValue,
        primary_input_key: impl Into<String>,
        project_id: ProjectId,
        created_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            name: None,
            description: None,
            tool_id: tool_id.into(),
            tool_version,
            parameters,
            status: RunStatus::Pending,
            primary_input_key: primary_input_key.into(),
            output_artifacts: None,
            error_message: None,
            run_log: String::new(),
            queued_at: now,
            started_at: None,
            completed_at: None,
            project_id,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `Pending -> Running`. Sets `started_at` the first time only; calling
    /// again while `Running` is a no-op (redelivered task that raced the
    /// first status write).
    pub fn begin_running(&mut self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "run {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = RunStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.touch();
        Ok(())
    }

    /// `Running -> Completed`. Records the result document and sets
    /// `completed_at` exactly once.
    pub fn complete(&mut self, artifacts: JsonValue) -> DomainResult<()> {
        if self.status != RunStatus::Running {
            return Err(DomainError::conflict(format!(
                "run {} cannot complete from {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = RunStatus::Completed;
        self.output_artifacts = Some(artifacts);
        self.error_message = None;
        self.set_completed_at();
        self.touch();
        Ok(())
    }

    /// Any non-terminal state -> `Failed`. `diagnostics` (error details for
    /// operators) lands in `output_artifacts` so a failed run is never an
    /// empty shell.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        diagnostics: Option<JsonValue>,
    ) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "run {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = RunStatus::Failed;
        self.error_message = Some(message.into());
        if diagnostics.is_some() {
            self.output_artifacts = diagnostics;
        }
        self.set_completed_at();
        self.touch();
        Ok(())
    }

    /// `Pending -> Cancelled`. Runs a worker has already claimed cannot be
    /// pre-empted.
    pub fn cancel(&mut self) -> DomainResult<()> {
        if self.status != RunStatus::Pending {
            return Err(DomainError::conflict(format!(
                "run {} cannot be cancelled from {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = RunStatus::Cancelled;
        self.set_completed_at();
        self.touch();
        Ok(())
    }

    /// Append a line to the run log.
    pub fn append_log(&mut self, line: &str) {
        if !self.run_log.is_empty() {
            self.run_log.push('\n');
        }
        self.run_log.push_str(line);
        self.touch();
    }

    /// Update the user-modifiable cosmetic fields.
    pub fn update_cosmetic(&mut self, name: Option<String>, description: Option<String>) {
        if let Some(name) = name {
            self.name = Some(name);
        }
        if let Some(description) = description {
            self.description = Some(description);
        }
        self.touch();
    }

    fn set_completed_at(&mut self) {
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_run() -> AnalysisRun {
        AnalysisRun::new(
            "heatmap",
            Some("1.0.0".to_string()),
            json!({"top_n_genes": 50}),
            "projects/p/datasets/d/expr.csv",
            ProjectId::new(),
            UserId::new(),
        )
    }

    #[test]
    fn happy_path_lifecycle() {
        let mut run = sample_run();
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.started_at.is_none());
        assert!(run.output_artifacts.is_none());

        run.begin_running().unwrap();
        assert_eq!(run.status, RunStatus::Running);
        let started = run.started_at.unwrap();
        assert!(run.output_artifacts.is_none());

        run.complete(json!({"summary_stats": {"genes_plotted": 50}}))
            .unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.output_artifacts.is_some());
        assert!(run.completed_at.unwrap() >= started);
    }

    #[test]
    fn begin_running_is_idempotent_and_keeps_started_at() {
        let mut run = sample_run();
        run.begin_running().unwrap();
        let first = run.started_at;
        run.begin_running().unwrap();
        assert_eq!(run.started_at, first);
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let mut run = sample_run();
        run.begin_running().unwrap();
        run.complete(json!({})).unwrap();
        let completed_at = run.completed_at;

        assert!(run.begin_running().is_err());
        assert!(run.complete(json!({})).is_err());
        assert!(run.fail("late failure", None).is_err());
        assert!(run.cancel().is_err());
        assert_eq!(run.completed_at, completed_at);
    }

    #[test]
    fn fail_records_message_and_diagnostics() {
        let mut run = sample_run();
        run.begin_running().unwrap();
        run.fail(
            "processor blew up",
            Some(json!({"error_details": "processor blew up"})),
        )
        .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("processor blew up"));
        assert!(run.output_artifacts.is_some());
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn fail_from_pending_is_allowed() {
        // Submission marks a run Failed directly when the queue is down.
        let mut run = sample_run();
        run.fail("failed to enqueue task", None).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.started_at.is_none());
    }

    #[test]
    fn cancel_only_from_pending() {
        let mut run = sample_run();
        run.cancel().unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);

        let mut run = sample_run();
        run.begin_running().unwrap();
        assert!(run.cancel().is_err());
    }

    #[test]
    fn complete_requires_running() {
        let mut run = sample_run();
        assert!(run.complete(json!({})).is_err());
    }

    #[test]
    fn run_log_appends() {
        let mut run = sample_run();
        run.append_log("downloaded input");
        run.append_log("processor finished");
        assert_eq!(run.run_log, "downloaded input\nprocessor finished");
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        BeginRunning,
        Complete,
        Fail,
        Cancel,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::BeginRunning),
            Just(Op::Complete),
            Just(Op::Fail),
            Just(Op::Cancel),
        ]
    }

    proptest! {
        /// Any sequence of transition attempts keeps the record on the
        /// directed graph `Pending -> Running -> terminal` with each
        /// timestamp written at most once.
        #[test]
        fn transitions_are_monotonic(ops in proptest::collection::vec(op_strategy(), 1..32)) {
            let mut run = sample_run();
            let mut seen_started: Option<DateTime<Utc>> = None;
            let mut seen_completed: Option<DateTime<Utc>> = None;
            let mut was_terminal = false;
            let mut terminal_status = None;

            for op in ops {
                let _ = match op {
                    Op::BeginRunning => run.begin_running(),
                    Op::Complete => run.complete(json!({})),
                    Op::Fail => run.fail("boom", None),
                    Op::Cancel => run.cancel(),
                };

                if let Some(prev) = seen_started {
                    prop_assert_eq!(run.started_at, Some(prev));
                }
                if let Some(prev) = seen_completed {
                    prop_assert_eq!(run.completed_at, Some(prev));
                }
                seen_started = run.started_at;
                seen_completed = run.completed_at;

                if was_terminal {
                    prop_assert_eq!(Some(run.status), terminal_status);
                }
                if run.status.is_terminal() {
                    was_terminal = true;
                    terminal_status = Some(run.status);
                }

                if let (Some(s), Some(c)) = (run.started_at, run.completed_at) {
                    prop_assert!(s <= c);
                }
            }
        }
    }
}
