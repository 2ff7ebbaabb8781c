//! Request/response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

/// Query string accompanying a raw-bytes dataset upload.
#[derive(Debug, Deserialize)]
pub struct UploadDatasetQuery {
    /// Original filename; its extension selects the parser downstream.
    pub file_name: String,
    /// Display name; defaults to the filename.
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRunRequest {
    pub project_id: Uuid,
    pub primary_input_dataset_id: Uuid,
    pub name: Option<String>,
    #[serde(default = "empty_object")]
    pub parameters: JsonValue,
}

fn empty_object() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

#[derive(Debug, Deserialize)]
pub struct UpdateRunRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultsUrlResponse {
    pub url: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<String>,
}
