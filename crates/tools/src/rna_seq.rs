//! Bulk RNA-seq processors: heatmap, volcano, PCA.
//!
//! All three consume an expression table (gene rows, sample columns) and
//! emit a JSON result document plus summary stats. Plot rendering is the
//! frontend's problem; these produce the numbers behind the plot.

use serde_json::{Value as JsonValue, json};
use tracing::debug;

use crate::params::{self, HeatmapParams, PcaParams, VolcanoParams};
use crate::table::{Table, variance};
use crate::{Processor, ProcessorError, ProcessorOutput, ToolInput};

/// Column-name fragments treated as gene metadata rather than samples.
const METADATA_FRAGMENTS: [&str; 3] = ["logfc", "pval", "fdr"];

fn sample_indexes(table: &Table) -> Vec<usize> {
    (0..table.columns.len())
        .filter(|&i| {
            let lower = table.columns[i].to_ascii_lowercase();
            !METADATA_FRAGMENTS.iter().any(|f| lower.contains(f))
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct HeatmapProcessor;

impl Processor for HeatmapProcessor {
    fn run(&self, input: &ToolInput, params: &JsonValue) -> Result<ProcessorOutput, ProcessorError> {
        let params: HeatmapParams = params::parse(params)?;
        let table = Table::parse(input)?;

        let samples = sample_indexes(&table);
        if samples.is_empty() {
            return Err(ProcessorError::invalid_input(
                "no sample columns found after excluding metadata columns",
            ));
        }

        let (selected, reason) = select_genes(&table, &samples, &params)?;
        if selected.is_empty() {
            return Err(ProcessorError::invalid_input(
                "no genes remained after filtering; check the selection criteria",
            ));
        }

        let mut matrix: Vec<Vec<f64>> = selected
            .iter()
            .map(|&g| table.imputed_row(g, &samples))
            .collect();

        if params.normalization_method == "log2_transform" {
            for row in &mut matrix {
                for v in row.iter_mut() {
                    *v = (*v + 1.0).max(f64::MIN_POSITIVE).log2();
                }
            }
        }
        if params.scaling_method == "z_score_row" {
            for row in &mut matrix {
                z_score(row);
            }
        }

        let gene_labels: Vec<&str> = selected.iter().map(|&g| table.genes[g].as_str()).collect();
        let sample_labels: Vec<&str> = samples.iter().map(|&i| table.columns[i].as_str()).collect();

        debug!(genes = gene_labels.len(), samples = sample_labels.len(), "heatmap matrix built");

        Ok(ProcessorOutput {
            result: json!({
                "plot_type": "heatmap",
                "heatmap_values": matrix,
                "gene_labels": gene_labels,
                "sample_labels": sample_labels,
                "title": params.analysis_name,
                "subtitle": reason,
            }),
            summary_stats: json!({
                "genes_plotted": gene_labels.len(),
                "samples_plotted": sample_labels.len(),
                "gene_selection_reason": reason,
            }),
        })
    }
}

fn select_genes(
    table: &Table,
    samples: &[usize],
    params: &HeatmapParams,
) -> Result<(Vec<usize>, String), ProcessorError> {
    match params.gene_selection_method.as_str() {
        "top_n_variable" => {
            let mut by_variance: Vec<(usize, f64)> = (0..table.genes.len())
                .map(|g| (g, variance(&table.imputed_row(g, samples))))
                .collect();
            by_variance.sort_by(|a, b| b.1.total_cmp(&a.1));
            by_variance.truncate(params.top_n_genes);
            let reason = format!("Top {} Most Variable Genes", params.top_n_genes);
            Ok((by_variance.into_iter().map(|(g, _)| g).collect(), reason))
        }
        "de_genes" => {
            let logfc = table.column_index_containing("logfc");
            let pval = table
                .column_index_containing("pval")
                .or_else(|| table.column_index_containing("fdr"));
            let (Some(logfc), Some(pval)) = (logfc, pval) else {
                return Err(ProcessorError::invalid_input(
                    "gene selection by differential expression requires 'logFC' and 'PValue'/'FDR' columns",
                ));
            };
            let selected = (0..table.genes.len())
                .filter(|&g| {
                    matches!(
                        (table.rows[g][logfc], table.rows[g][pval]),
                        (Some(fc), Some(p))
                            if fc.abs() >= params.de_logfc_threshold && p < params.de_pvalue_threshold
                    )
                })
                .collect();
            let reason = format!(
                "Differentially Expressed Genes (|logFC| >= {}, p < {})",
                params.de_logfc_threshold, params.de_pvalue_threshold
            );
            Ok((selected, reason))
        }
        "gene_list" => {
            let Some(wanted) = params.gene_list.as_ref().filter(|l| !l.is_empty()) else {
                return Err(ProcessorError::invalid_input(
                    "gene selection by list requires a non-empty gene_list",
                ));
            };
            let selected = (0..table.genes.len())
                .filter(|&g| wanted.iter().any(|w| w == &table.genes[g]))
                .collect();
            Ok((selected, "User-Provided Gene List".to_string()))
        }
        other => Err(ProcessorError::invalid_input(format!(
            "unknown gene selection method '{other}'"
        ))),
    }
}

fn z_score(row: &mut [f64]) {
    let mean = row.iter().sum::<f64>() / row.len() as f64;
    let sd = variance(row).sqrt();
    for v in row.iter_mut() {
        *v = if sd > 0.0 { (*v - mean) / sd } else { 0.0 };
    }
}

#[derive(Debug, Default)]
pub struct VolcanoProcessor;

impl Processor for VolcanoProcessor {
    fn run(&self, input: &ToolInput, params: &JsonValue) -> Result<ProcessorOutput, ProcessorError> {
        let params: VolcanoParams = params::parse(params)?;
        let table = Table::parse(input)?;

        let mut missing = Vec::new();
        let logfc = table.column_index(&params.log2fc_col);
        if logfc.is_none() {
            missing.push(params.log2fc_col.as_str());
        }
        let pval = table.column_index(&params.pvalue_col);
        if pval.is_none() {
            missing.push(params.pvalue_col.as_str());
        }
        if !missing.is_empty() {
            return Err(ProcessorError::invalid_input(format!(
                "missing expected columns: {}",
                missing.join(", ")
            )));
        }
        // Both set by the checks above.
        let (Some(logfc), Some(pval)) = (logfc, pval) else {
            return Err(ProcessorError::failed("column index lookup out of sync"));
        };

        let mut points = Vec::new();
        let (mut up, mut down, mut neutral) = (0usize, 0usize, 0usize);
        for g in 0..table.genes.len() {
            let (Some(fc), Some(p)) = (table.rows[g][logfc], table.rows[g][pval]) else {
                continue;
            };
            let regulation = if p < params.p_value_threshold && fc >= params.fold_change_threshold {
                up += 1;
                "up"
            } else if p < params.p_value_threshold && fc <= -params.fold_change_threshold {
                down += 1;
                "down"
            } else {
                neutral += 1;
                "neutral"
            };
            let neg_log10_p = -p.max(f64::MIN_POSITIVE).log10();
            points.push(json!({
                "gene": table.genes[g],
                "log2fc": fc,
                "neg_log10_p": neg_log10_p,
                "regulation": regulation,
            }));
        }

        // Most significant first, for labelling.
        let mut ranked: Vec<(f64, String)> = points
            .iter()
            .map(|p| {
                let score = p["log2fc"].as_f64().unwrap_or(0.0).abs()
                    * p["neg_log10_p"].as_f64().unwrap_or(0.0);
                (score, p["gene"].as_str().unwrap_or_default().to_string())
            })
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        let labeled: Vec<String> = ranked
            .into_iter()
            .take(params.label_top_n)
            .map(|(_, g)| g)
            .collect();

        Ok(ProcessorOutput {
            result: json!({
                "plot_type": "volcano",
                "points": points,
                "labeled_genes": labeled,
                "title": params.analysis_name,
                "fold_change_threshold": params.fold_change_threshold,
                "p_value_threshold": params.p_value_threshold,
            }),
            summary_stats: json!({
                "n_genes": up + down + neutral,
                "upregulated": up,
                "downregulated": down,
                "neutral": neutral,
            }),
        })
    }
}

#[derive(Debug, Default)]
pub struct PcaProcessor;

impl Processor for PcaProcessor {
    fn run(&self, input: &ToolInput, params: &JsonValue) -> Result<ProcessorOutput, ProcessorError> {
        let params: PcaParams = params::parse(params)?;
        let table = Table::parse(input)?;

        let samples = sample_indexes(&table);
        if samples.len() < 2 {
            return Err(ProcessorError::invalid_input(
                "principal component analysis needs at least two sample columns",
            ));
        }

        // Samples are the observations: one row per sample, one feature per gene.
        let n_samples = samples.len();
        let n_genes = table.genes.len();
        let mut data = vec![vec![0.0f64; n_genes]; n_samples];
        for (g, _) in table.genes.iter().enumerate() {
            let row = table.imputed_row(g, &samples);
            for (s, v) in row.into_iter().enumerate() {
                data[s][g] = v;
            }
        }

        // Center (and optionally scale) each gene across samples.
        for g in 0..n_genes {
            let mut column: Vec<f64> = (0..n_samples).map(|s| data[s][g]).collect();
            let mean = column.iter().sum::<f64>() / n_samples as f64;
            let sd = variance(&column).sqrt();
            for v in column.iter_mut() {
                *v -= mean;
                if params.scale_data && sd > 0.0 {
                    *v /= sd;
                }
            }
            for s in 0..n_samples {
                data[s][g] = column[s];
            }
        }

        let n_components = params.n_components.min(n_samples).min(n_genes).max(1);
        let pca = principal_components(&data, n_components);

        let max_axis = params.pc_x_axis.max(params.pc_y_axis);
        if params.pc_x_axis == 0 || params.pc_y_axis == 0 || max_axis > pca.scores[0].len() {
            return Err(ProcessorError::invalid_input(format!(
                "requested principal components are out of bounds for the {} computed",
                pca.scores[0].len()
            )));
        }

        let sample_labels: Vec<&str> = samples.iter().map(|&i| table.columns[i].as_str()).collect();
        let coordinates: Vec<JsonValue> = (0..n_samples)
            .map(|s| {
                json!({
                    "sample": sample_labels[s],
                    "x": pca.scores[s][params.pc_x_axis - 1],
                    "y": pca.scores[s][params.pc_y_axis - 1],
                })
            })
            .collect();

        Ok(ProcessorOutput {
            result: json!({
                "plot_type": "pca",
                "coordinates": coordinates,
                "pc_x_axis": params.pc_x_axis,
                "pc_y_axis": params.pc_y_axis,
                "explained_variance_ratio": pca.explained_variance_ratio,
                "title": params.analysis_name,
            }),
            summary_stats: json!({
                "components_computed": pca.explained_variance_ratio.len(),
                "samples_plotted": n_samples,
                "explained_variance_ratio": pca.explained_variance_ratio,
            }),
        })
    }
}

struct Pca {
    /// One row per sample, one column per retained component.
    scores: Vec<Vec<f64>>,
    explained_variance_ratio: Vec<f64>,
}

/// PCA via the sample Gram matrix and power iteration with deflation.
///
/// The Gram matrix is `n_samples x n_samples`, which stays tiny for the
/// workloads here even when the gene dimension is large.
fn principal_components(data: &[Vec<f64>], n_components: usize) -> Pca {
    let n = data.len();
    let mut gram = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in i..n {
            let dot: f64 = data[i].iter().zip(&data[j]).map(|(a, b)| a * b).sum();
            let cov = dot / (n as f64 - 1.0);
            gram[i][j] = cov;
            gram[j][i] = cov;
        }
    }

    let total_variance: f64 = (0..n).map(|i| gram[i][i]).sum();
    let mut scores = vec![vec![0.0f64; n_components]; n];
    let mut ratios = Vec::with_capacity(n_components);

    let cutoff = total_variance.max(f64::MIN_POSITIVE) * 1e-12;
    for c in 0..n_components {
        let (eigenvalue, eigenvector) = dominant_eigenpair(&gram);
        if eigenvalue <= cutoff {
            // Remaining components carry no variance.
            for r in &mut scores {
                r.truncate(c);
            }
            break;
        }
        let scale = (eigenvalue * (n as f64 - 1.0)).sqrt();
        for s in 0..n {
            scores[s][c] = eigenvector[s] * scale;
        }
        ratios.push(if total_variance > 0.0 {
            eigenvalue / total_variance
        } else {
            0.0
        });
        // Deflate.
        for i in 0..n {
            for j in 0..n {
                gram[i][j] -= eigenvalue * eigenvector[i] * eigenvector[j];
            }
        }
    }

    Pca {
        scores,
        explained_variance_ratio: ratios,
    }
}

fn dominant_eigenpair(matrix: &[Vec<f64>]) -> (f64, Vec<f64>) {
    let n = matrix.len();
    // Deterministic start with an asymmetry nudge so a symmetric start never
    // sits orthogonal to the dominant eigenvector.
    let mut v: Vec<f64> = (0..n).map(|i| 1.0 + i as f64 * 1e-3).collect();
    normalize(&mut v);
    let mut eigenvalue = 0.0;
    for _ in 0..200 {
        let mut next = vec![0.0f64; n];
        for i in 0..n {
            next[i] = matrix[i].iter().zip(&v).map(|(m, x)| m * x).sum();
        }
        let norm = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm <= f64::EPSILON {
            return (0.0, v);
        }
        for x in &mut next {
            *x /= norm;
        }
        eigenvalue = norm;
        let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
        v = next;
        if delta < 1e-12 {
            break;
        }
    }
    (eigenvalue, v)
}

fn normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
