//! Synchronous submission: validate, create the record, enqueue the task.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use benchrun_core::{DatasetId, ProjectId, UserId};
use benchrun_queue::{TaskMessage, TaskQueue};
use benchrun_runs::catalog::{CatalogError, CatalogStore};
use benchrun_runs::run::AnalysisRun;
use benchrun_runs::store::{RunStore, RunStoreError};
use benchrun_tools::ToolRegistry;

/// What a caller provides to start an analysis.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub tool_id: String,
    pub project_id: ProjectId,
    pub dataset_id: DatasetId,
    pub name: Option<String>,
    pub parameters: JsonValue,
    pub created_by: UserId,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),
    #[error("dataset {0} not found")]
    DatasetNotFound(DatasetId),
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] RunStoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The record was created but the task could not be enqueued; the record
    /// has already been marked failed.
    #[error("failed to enqueue task for run: {reason}")]
    Publish { reason: String },
}

/// Accepts submissions and hands them to the queue.
///
/// Submission is the only place a run record is created. If the enqueue
/// fails the record is marked `Failed` before the error is returned, so no
/// run ever sits in `Pending` with no task behind it.
pub struct SubmissionService<S, C, Q> {
    runs: S,
    catalog: C,
    queue: Q,
    registry: Arc<ToolRegistry>,
}

impl<S, C, Q> SubmissionService<S, C, Q>
where
    S: RunStore,
    C: CatalogStore,
    Q: TaskQueue,
{
    pub fn new(runs: S, catalog: C, queue: Q, registry: Arc<ToolRegistry>) -> Self {
        Self {
            runs,
            catalog,
            queue,
            registry,
        }
    }

    pub fn submit(&self, request: SubmitRequest) -> Result<AnalysisRun, SubmitError> {
        let tool = self
            .registry
            .get(&request.tool_id)
            .ok_or_else(|| SubmitError::UnknownTool(request.tool_id.clone()))?;

        let dataset = self
            .catalog
            .get_dataset(request.dataset_id)?
            .ok_or(SubmitError::DatasetNotFound(request.dataset_id))?;
        let project = self
            .catalog
            .get_project(request.project_id)?
            .ok_or(SubmitError::ProjectNotFound(request.project_id))?;
        if dataset.project_id != project.id {
            return Err(SubmitError::Validation(format!(
                "dataset {} does not belong to project {}",
                dataset.id, project.id
            )));
        }

        let mut run = AnalysisRun::new(
            tool.tool_id.clone(),
            Some(tool.version.clone()),
            request.parameters.clone(),
            dataset.object_key.clone(),
            project.id,
            request.created_by,
        );
        if let Some(name) = request.name {
            run = run.named(name);
        }
        self.runs.create(run.clone())?;

        let message = TaskMessage::new(run.id, dataset.object_key, request.parameters);
        if let Err(e) = self.queue.publish(message) {
            let reason = format!("{e:?}");
            warn!(run_id = %run.id, reason = %reason, "task enqueue failed; failing run");
            run.append_log("failed to enqueue task");
            if run
                .fail(format!("failed to enqueue task: {reason}"), None)
                .is_ok()
            {
                if let Err(update_err) = self.runs.update(&run) {
                    error!(
                        run_id = %run.id,
                        error = %update_err,
                        "could not persist failed state after enqueue failure"
                    );
                }
            }
            return Err(SubmitError::Publish { reason });
        }

        info!(run_id = %run.id, tool_id = %run.tool_id, "run submitted");
        Ok(run)
    }
}
