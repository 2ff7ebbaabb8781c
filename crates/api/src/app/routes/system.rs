use std::sync::Arc;

use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::json;

use benchrun_runs::store::RunStore;

use crate::app::dto::ToolListResponse;
use crate::app::errors::store_error_to_response;
use crate::app::services::AppServices;

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn list_tools(
    Extension(services): Extension<Arc<AppServices>>,
) -> impl IntoResponse {
    Json(ToolListResponse {
        tools: services
            .registry
            .tool_ids()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.runs.stats() {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => store_error_to_response(e),
    }
}
