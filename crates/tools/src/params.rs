//! Typed parameter contracts for the built-in tools.
//!
//! Every tool publishes a struct with serde defaults; the raw JSON from the
//! submission request is deserialized here, and anything malformed is an
//! invalid-input error rather than a retryable failure.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::ProcessorError;

/// Deserialize a parameter block, mapping serde errors to `InvalidInput`.
pub fn parse<'de, T: Deserialize<'de>>(params: &'de JsonValue) -> Result<T, ProcessorError> {
    T::deserialize(params).map_err(|e| ProcessorError::invalid_input(format!("bad parameters: {e}")))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeatmapParams {
    pub analysis_name: Option<String>,
    /// One of `top_n_variable`, `de_genes`, `gene_list`.
    pub gene_selection_method: String,
    pub top_n_genes: usize,
    pub de_logfc_threshold: f64,
    pub de_pvalue_threshold: f64,
    pub gene_list: Option<Vec<String>>,
    /// `log2_transform` or `none`.
    pub normalization_method: String,
    /// `z_score_row` or `none`.
    pub scaling_method: String,
}

impl Default for HeatmapParams {
    fn default() -> Self {
        Self {
            analysis_name: None,
            gene_selection_method: "top_n_variable".to_string(),
            top_n_genes: 50,
            de_logfc_threshold: 1.0,
            de_pvalue_threshold: 0.05,
            gene_list: None,
            normalization_method: "log2_transform".to_string(),
            scaling_method: "z_score_row".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VolcanoParams {
    pub analysis_name: Option<String>,
    pub gene_col: String,
    pub log2fc_col: String,
    pub pvalue_col: String,
    pub fold_change_threshold: f64,
    pub p_value_threshold: f64,
    pub label_top_n: usize,
}

impl Default for VolcanoParams {
    fn default() -> Self {
        Self {
            analysis_name: None,
            gene_col: "Gene".to_string(),
            log2fc_col: "logFC".to_string(),
            pvalue_col: "PValue".to_string(),
            fold_change_threshold: 1.0,
            p_value_threshold: 0.05,
            label_top_n: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PcaParams {
    pub analysis_name: Option<String>,
    pub scale_data: bool,
    pub n_components: usize,
    pub pc_x_axis: usize,
    pub pc_y_axis: usize,
}

impl Default for PcaParams {
    fn default() -> Self {
        Self {
            analysis_name: None,
            scale_data: true,
            n_components: 10,
            pc_x_axis: 1,
            pc_y_axis: 2,
        }
    }
}

/// Blur has no sensible default sigma, so it is required.
#[derive(Debug, Clone, Deserialize)]
pub struct GaussianBlurParams {
    pub sigma: f64,
}

/// Kernel radius is 3 sigma, so this caps the blur kernel at a few hundred
/// taps; sigma comes straight from user parameters.
pub const MAX_BLUR_SIGMA: f64 = 100.0;

impl GaussianBlurParams {
    pub fn validate(&self) -> Result<(), ProcessorError> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(ProcessorError::invalid_input(format!(
                "sigma must be a positive number, got {}",
                self.sigma
            )));
        }
        if self.sigma > MAX_BLUR_SIGMA {
            return Err(ProcessorError::invalid_input(format!(
                "sigma {} exceeds the maximum of {MAX_BLUR_SIGMA}",
                self.sigma
            )));
        }
        Ok(())
    }
}
