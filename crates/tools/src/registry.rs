//! Static tool registry.
//!
//! Built once at startup from the compiled-in tool set; dispatch is a map
//! lookup on the tool id, never a string-assembled import path.

use std::collections::HashMap;
use std::sync::Arc;

use crate::imaging::{GaussianBlurProcessor, ImagingGateway};
use crate::rna_seq::{HeatmapProcessor, PcaProcessor, VolcanoProcessor};
use crate::Processor;

pub const HEATMAP_TOOL_ID: &str = "benchrun_heatmap_v1";
pub const VOLCANO_TOOL_ID: &str = "benchrun_volcano_v1";
pub const PCA_TOOL_ID: &str = "benchrun_pca_v1";
pub const GAUSSIAN_BLUR_TOOL_ID: &str = "benchrun_gaussian_blur_v1";

/// A tool the service can run.
#[derive(Clone)]
pub struct RegisteredTool {
    pub tool_id: String,
    pub version: String,
    pub processor: Arc<dyn Processor>,
}

/// Immutable tool_id -> tool map.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// All built-in tools. The imaging gateway is owned by process startup
    /// and shared into every tool that needs it.
    pub fn builtin(gateway: Arc<dyn ImagingGateway>) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };
        registry.register(HEATMAP_TOOL_ID, "1.0", Arc::new(HeatmapProcessor));
        registry.register(VOLCANO_TOOL_ID, "1.0", Arc::new(VolcanoProcessor));
        registry.register(PCA_TOOL_ID, "1.0", Arc::new(PcaProcessor));
        registry.register(
            GAUSSIAN_BLUR_TOOL_ID,
            "1.0",
            Arc::new(GaussianBlurProcessor::new(gateway)),
        );
        registry
    }

    /// An empty registry, for tests that register their own doubles.
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        tool_id: impl Into<String>,
        version: impl Into<String>,
        processor: Arc<dyn Processor>,
    ) {
        let tool_id = tool_id.into();
        self.tools.insert(
            tool_id.clone(),
            RegisteredTool {
                tool_id,
                version: version.into(),
                processor,
            },
        );
    }

    pub fn get(&self, tool_id: &str) -> Option<&RegisteredTool> {
        self.tools.get(tool_id)
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id)
    }

    /// Registered tool ids, sorted for stable listings.
    pub fn tool_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::PgmImagingGateway;

    fn registry() -> ToolRegistry {
        ToolRegistry::builtin(Arc::new(PgmImagingGateway::new()))
    }

    #[test]
    fn builtin_registry_knows_all_tools() {
        let registry = registry();
        for id in [
            HEATMAP_TOOL_ID,
            VOLCANO_TOOL_ID,
            PCA_TOOL_ID,
            GAUSSIAN_BLUR_TOOL_ID,
        ] {
            assert!(registry.contains(id), "missing {id}");
            assert_eq!(registry.get(id).unwrap().tool_id, id);
        }
    }

    #[test]
    fn unknown_tool_is_absent() {
        assert!(registry().get("benchrun_teleport_v1").is_none());
    }

    #[test]
    fn tool_ids_are_sorted() {
        let registry = registry();
        let ids = registry.tool_ids();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
