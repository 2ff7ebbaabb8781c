use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use uuid::Uuid;

use benchrun_core::ProjectId;
use benchrun_runs::catalog::{CatalogStore, Dataset, Project};
use benchrun_storage::keys::dataset_key;
use benchrun_storage::ObjectStore;

use crate::app::dto::{CreateProjectRequest, UploadDatasetQuery};
use crate::app::errors::{json_error, storage_error_to_response};
use crate::app::routes::principal;
use crate::app::services::AppServices;

pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<CreateProjectRequest>,
) -> axum::response::Response {
    if body.name.trim().is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "project name must not be empty",
        );
    }

    let project = Project::new(body.name, principal(&headers));
    if let Err(e) = services.catalog.insert_project(project.clone()) {
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "catalog_error",
            e.to_string(),
        );
    }
    (StatusCode::CREATED, Json(project)).into_response()
}

/// Raw-bytes upload: the body is the file, the query string names it.
pub async fn upload_dataset(
    Extension(services): Extension<Arc<AppServices>>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<UploadDatasetQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let project_id = ProjectId::from(project_id);
    let project = match services.catalog.get_project(project_id) {
        Ok(Some(project)) => project,
        Ok(None) => {
            return json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("project {project_id} not found"),
            );
        }
        Err(e) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "catalog_error",
                e.to_string(),
            );
        }
    };
    if body.is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "dataset body must not be empty",
        );
    }

    let name = query.name.unwrap_or_else(|| query.file_name.clone());
    let mut dataset = Dataset::new(project.id, name, query.file_name, "", principal(&headers));
    dataset.object_key = dataset_key(project.id, dataset.id, &dataset.file_name);

    if let Err(e) = services
        .objects
        .upload(&services.storage.datasets_bucket, &dataset.object_key, &body)
    {
        return storage_error_to_response(e);
    }
    if let Err(e) = services.catalog.insert_dataset(dataset.clone()) {
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "catalog_error",
            e.to_string(),
        );
    }

    (StatusCode::CREATED, Json(dataset)).into_response()
}
