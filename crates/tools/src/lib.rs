//! Analysis processors and the registry that owns them.
//!
//! A processor is a pure function over bytes and parameters. It never sees
//! the run record, the queue, or object storage; the execution engine feeds
//! it input and persists whatever it returns. Because delivery upstream is
//! at-least-once, processors must tolerate being run more than once for the
//! same input.

pub mod imaging;
pub mod params;
pub mod registry;
pub mod rna_seq;
pub mod table;

pub use imaging::{GaussianBlurProcessor, ImagingGateway, PgmImagingGateway};
pub use registry::{RegisteredTool, ToolRegistry};

use std::path::Path;
use std::sync::Arc;

use serde_json::Value as JsonValue;

/// Raw input handed to a processor.
///
/// Carries the uploaded bytes together with the original filename so the
/// processor can pick a parser by extension.
#[derive(Debug, Clone)]
pub struct ToolInput {
    pub bytes: Vec<u8>,
    pub original_filename: String,
}

impl ToolInput {
    pub fn new(bytes: Vec<u8>, original_filename: impl Into<String>) -> Self {
        Self {
            bytes,
            original_filename: original_filename.into(),
        }
    }

    /// Lowercased extension of the original filename, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Processor failure, split by whether rerunning could possibly help.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcessorError {
    /// The input or parameters are wrong. Rerunning the same task will
    /// produce the same error, so this is never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Anything else that went wrong while processing.
    #[error("processing failed: {0}")]
    Failed(String),
}

impl ProcessorError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ProcessorError::InvalidInput(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        ProcessorError::Failed(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessorError::Failed(_))
    }
}

/// What a processor produces: the result document that gets persisted as
/// `results.json`, and a small summary block surfaced on the run record.
#[derive(Debug, Clone)]
pub struct ProcessorOutput {
    pub result: JsonValue,
    pub summary_stats: JsonValue,
}

/// A single analysis tool.
///
/// Implementations must be repeat-safe: running twice with the same input
/// and parameters yields an equivalent output.
pub trait Processor: Send + Sync {
    fn run(&self, input: &ToolInput, params: &JsonValue) -> Result<ProcessorOutput, ProcessorError>;
}

impl<P> Processor for Arc<P>
where
    P: Processor + ?Sized,
{
    fn run(&self, input: &ToolInput, params: &JsonValue) -> Result<ProcessorOutput, ProcessorError> {
        (**self).run(input, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        let input = ToolInput::new(vec![], "Counts.CSV");
        assert_eq!(input.extension().as_deref(), Some("csv"));
    }

    #[test]
    fn extension_absent_when_filename_has_none() {
        let input = ToolInput::new(vec![], "counts");
        assert_eq!(input.extension(), None);
    }

    #[test]
    fn only_generic_failures_are_retryable() {
        assert!(ProcessorError::failed("disk on fire").is_retryable());
        assert!(!ProcessorError::invalid_input("bad column").is_retryable());
    }
}
