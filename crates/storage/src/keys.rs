//! Object key layout conventions.
//!
//! Not enforced by any schema; kept in one place so every producer agrees.
//! Input datasets live under a project/dataset-scoped prefix, results under
//! a run-scoped prefix.

use benchrun_core::{DatasetId, ProjectId, RunId};

/// Key for an uploaded dataset's bytes.
pub fn dataset_key(project_id: ProjectId, dataset_id: DatasetId, file_name: &str) -> String {
    format!("projects/{project_id}/datasets/{dataset_id}/{file_name}")
}

/// Key for a result artifact of a run.
pub fn result_key(run_id: RunId, artifact_name: &str) -> String {
    format!("analysis_runs/{run_id}/results/{artifact_name}")
}

/// Name of the primary result document every run uploads.
pub const RESULTS_JSON: &str = "results.json";
