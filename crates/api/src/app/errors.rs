use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use benchrun_engine::SubmitError;
use benchrun_runs::store::RunStoreError;
use benchrun_storage::StorageError;

pub fn submit_error_to_response(err: SubmitError) -> axum::response::Response {
    match err {
        SubmitError::UnknownTool(tool_id) => json_error(
            StatusCode::NOT_FOUND,
            "unknown_tool",
            format!("no tool registered as '{tool_id}'"),
        ),
        SubmitError::ProjectNotFound(_) | SubmitError::DatasetNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        SubmitError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        SubmitError::Store(e) => store_error_to_response(e),
        SubmitError::Catalog(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "catalog_error",
            e.to_string(),
        ),
        SubmitError::Publish { reason } => json_error(
            StatusCode::BAD_GATEWAY,
            "publish_error",
            format!("run was created but could not be enqueued and is now failed: {reason}"),
        ),
    }
}

pub fn store_error_to_response(err: RunStoreError) -> axum::response::Response {
    match err {
        RunStoreError::NotFound(run_id) => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("run {run_id} not found"),
        ),
        RunStoreError::AlreadyExists(run_id) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("run {run_id} already exists"),
        ),
        RunStoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        RunStoreError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn storage_error_to_response(err: StorageError) -> axum::response::Response {
    match err {
        StorageError::NotFound { .. } => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        StorageError::Transport(msg) => json_error(StatusCode::BAD_GATEWAY, "storage_error", msg),
        StorageError::Config(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_config_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
