use std::sync::Arc;

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::json;
use uuid::Uuid;

use benchrun_core::{DatasetId, ProjectId, RunId};
use benchrun_engine::SubmitRequest;
use benchrun_runs::run::{AnalysisRun, RunStatus};
use benchrun_runs::store::RunStore;
use benchrun_storage::keys::{RESULTS_JSON, result_key};
use benchrun_storage::ObjectStore;

use crate::app::dto::{ResultsUrlResponse, SubmitRunRequest, UpdateRunRequest};
use crate::app::errors::{json_error, storage_error_to_response, store_error_to_response, submit_error_to_response};
use crate::app::routes::principal;
use crate::app::services::AppServices;

const LIST_LIMIT: usize = 100;

pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tool_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SubmitRunRequest>,
) -> axum::response::Response {
    let request = SubmitRequest {
        tool_id,
        project_id: ProjectId::from(body.project_id),
        dataset_id: DatasetId::from(body.primary_input_dataset_id),
        name: body.name,
        parameters: body.parameters,
        created_by: principal(&headers),
    };

    match services.submission.submit(request) {
        // 202: the run is accepted; completion is observed by polling.
        Ok(run) => (StatusCode::ACCEPTED, Json(run)).into_response(),
        Err(e) => submit_error_to_response(e),
    }
}

pub async fn get_run(
    Extension(services): Extension<Arc<AppServices>>,
    Path(run_id): Path<Uuid>,
) -> axum::response::Response {
    match load(&services, run_id) {
        Ok(run) => Json(run).into_response(),
        Err(response) => response,
    }
}

pub async fn list_project_runs(
    Extension(services): Extension<Arc<AppServices>>,
    Path(project_id): Path<Uuid>,
) -> axum::response::Response {
    match services
        .runs
        .list_by_project(ProjectId::from(project_id), LIST_LIMIT)
    {
        Ok(runs) => Json(json!({"runs": runs})).into_response(),
        Err(e) => store_error_to_response(e),
    }
}

/// Cosmetic updates only; the store writes back nothing but name and
/// description, so a concurrent engine transition cannot be clobbered.
pub async fn update_run(
    Extension(services): Extension<Arc<AppServices>>,
    Path(run_id): Path<Uuid>,
    Json(body): Json<UpdateRunRequest>,
) -> axum::response::Response {
    match services
        .runs
        .update_cosmetic(RunId::from(run_id), body.name, body.description)
    {
        Ok(run) => Json(run).into_response(),
        Err(e) => store_error_to_response(e),
    }
}

pub async fn cancel_run(
    Extension(services): Extension<Arc<AppServices>>,
    Path(run_id): Path<Uuid>,
) -> axum::response::Response {
    match services.runs.cancel(RunId::from(run_id)) {
        Ok(run) => Json(run).into_response(),
        Err(e) => store_error_to_response(e),
    }
}

pub async fn results_url(
    Extension(services): Extension<Arc<AppServices>>,
    Path(run_id): Path<Uuid>,
) -> axum::response::Response {
    let run = match load(&services, run_id) {
        Ok(run) => run,
        Err(response) => return response,
    };
    if run.status != RunStatus::Completed {
        return json_error(
            StatusCode::CONFLICT,
            "no_results",
            format!("run {} is {} and has no results", run.id, run.status.as_str()),
        );
    }

    let key = result_key(run.id, RESULTS_JSON);
    let ttl = services.storage.presign_ttl;
    match services
        .objects
        .presign(&services.storage.results_bucket, &key, ttl)
    {
        Ok(url) => Json(ResultsUrlResponse {
            url,
            expires_in_secs: ttl.as_secs(),
        })
        .into_response(),
        Err(e) => storage_error_to_response(e),
    }
}

fn load(services: &AppServices, run_id: Uuid) -> Result<AnalysisRun, axum::response::Response> {
    let run_id = RunId::from(run_id);
    match services.runs.get(run_id) {
        Ok(Some(run)) => Ok(run),
        Ok(None) => Err(json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("run {run_id} not found"),
        )),
        Err(e) => Err(store_error_to_response(e)),
    }
}
