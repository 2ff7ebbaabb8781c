use axum::{
    Router,
    routing::{get, post},
};

pub mod projects;
pub mod runs;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/projects", post(projects::create_project))
        .route("/projects/:project_id/datasets", post(projects::upload_dataset))
        .route("/projects/:project_id/runs", get(runs::list_project_runs))
        .route("/tools", get(system::list_tools))
        .route("/tools/:tool_id/submit", post(runs::submit))
        .route("/runs/:run_id", get(runs::get_run).put(runs::update_run))
        .route("/runs/:run_id/cancel", post(runs::cancel_run))
        .route("/runs/:run_id/results/url", get(runs::results_url))
        .route("/stats", get(system::stats))
}

/// Placeholder principal until real authentication lands: the caller may
/// pass `x-user-id`, otherwise a fresh anonymous id is minted per request.
pub fn principal(headers: &axum::http::HeaderMap) -> benchrun_core::UserId {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}
