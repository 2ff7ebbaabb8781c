//! The wire message between submission and execution.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use benchrun_core::RunId;

/// One unit of queued work.
///
/// Carries just enough to start execution: the run record's identifier, the
/// input's object key, and the validated parameters. The worker dispatches
/// on the *record's* `tool_id`, not anything in the message, so a replayed
/// message can never run the wrong tool against a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub run_id: RunId,
    pub input_key: String,
    pub parameters: JsonValue,
}

impl TaskMessage {
    pub fn new(run_id: RunId, input_key: impl Into<String>, parameters: JsonValue) -> Self {
        Self {
            run_id,
            input_key: input_key.into(),
            parameters,
        }
    }

    /// Serialize to the compact JSON form carried on the wire.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
