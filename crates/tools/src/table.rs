//! Delimited-text tables: gene rows by sample columns.
//!
//! The first column is the gene identifier, every other column is either a
//! numeric sample column or a recognised metadata column (logFC, p-value).
//! Tab-separated for `.tsv`/`.txt`, comma-separated otherwise.

use crate::{ProcessorError, ToolInput};

/// A parsed expression table.
#[derive(Debug, Clone)]
pub struct Table {
    /// Header names, excluding the leading gene column.
    pub columns: Vec<String>,
    pub genes: Vec<String>,
    /// Row-major cell values, one row per gene; `None` for blank or
    /// non-numeric cells.
    pub rows: Vec<Vec<Option<f64>>>,
}

impl Table {
    pub fn parse(input: &ToolInput) -> Result<Self, ProcessorError> {
        let delimiter = match input.extension().as_deref() {
            Some("tsv") | Some("txt") => '\t',
            _ => ',',
        };

        let text = std::str::from_utf8(&input.bytes)
            .map_err(|_| ProcessorError::invalid_input("file is not valid UTF-8 text"))?;

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| ProcessorError::invalid_input("file is empty"))?;

        let mut header_cells = split_row(header, delimiter);
        if header_cells.len() < 2 {
            return Err(ProcessorError::invalid_input(
                "expected a gene column followed by at least one sample column",
            ));
        }
        header_cells.remove(0);
        let columns = header_cells;

        let mut genes = Vec::new();
        let mut rows = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let mut cells = split_row(line, delimiter);
            if cells.len() != columns.len() + 1 {
                return Err(ProcessorError::invalid_input(format!(
                    "row {} has {} cells, expected {}",
                    line_no + 2,
                    cells.len(),
                    columns.len() + 1
                )));
            }
            let gene = cells.remove(0);
            genes.push(gene);
            rows.push(cells.iter().map(|c| c.parse::<f64>().ok()).collect());
        }

        if genes.is_empty() {
            return Err(ProcessorError::invalid_input("file has a header but no data rows"));
        }

        Ok(Self { columns, genes, rows })
    }

    /// Index of a column by case-insensitive name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// First column whose name contains `fragment` (case-insensitive).
    pub fn column_index_containing(&self, fragment: &str) -> Option<usize> {
        let fragment = fragment.to_ascii_lowercase();
        self.columns
            .iter()
            .position(|c| c.to_ascii_lowercase().contains(&fragment))
    }

    /// Values of one column across all genes.
    pub fn column(&self, index: usize) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r[index]).collect()
    }

    /// Numeric sample values for one gene, restricted to `sample_indexes`,
    /// with missing cells imputed as the row mean of the present ones.
    pub fn imputed_row(&self, gene_index: usize, sample_indexes: &[usize]) -> Vec<f64> {
        let row = &self.rows[gene_index];
        let present: Vec<f64> = sample_indexes.iter().filter_map(|&i| row[i]).collect();
        let mean = if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f64>() / present.len() as f64
        };
        sample_indexes.iter().map(|&i| row[i].unwrap_or(mean)).collect()
    }
}

fn split_row(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter).map(|c| c.trim().to_string()).collect()
}

/// Population variance of a slice; 0 for fewer than two values.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(body: &str) -> ToolInput {
        ToolInput::new(body.as_bytes().to_vec(), "counts.csv")
    }

    #[test]
    fn parses_comma_separated_by_default() {
        let table = Table::parse(&csv("Gene,S1,S2\nTP53,1.0,2.0\nBRCA1,3.5,\n")).unwrap();
        assert_eq!(table.columns, vec!["S1", "S2"]);
        assert_eq!(table.genes, vec!["TP53", "BRCA1"]);
        assert_eq!(table.rows[1], vec![Some(3.5), None]);
    }

    #[test]
    fn tsv_extension_switches_delimiter() {
        let input = ToolInput::new(b"Gene\tS1\nTP53\t4.0\n".to_vec(), "counts.tsv");
        let table = Table::parse(&input).unwrap();
        assert_eq!(table.rows[0], vec![Some(4.0)]);
    }

    #[test]
    fn ragged_row_is_invalid_input() {
        let err = Table::parse(&csv("Gene,S1,S2\nTP53,1.0\n")).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidInput(_)));
    }

    #[test]
    fn header_only_file_is_invalid_input() {
        let err = Table::parse(&csv("Gene,S1\n")).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidInput(_)));
    }

    #[test]
    fn imputes_missing_cells_with_row_mean() {
        let table = Table::parse(&csv("Gene,S1,S2,S3\nTP53,2.0,,4.0\n")).unwrap();
        assert_eq!(table.imputed_row(0, &[0, 1, 2]), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let table = Table::parse(&csv("Gene,logFC,PValue\nTP53,1.0,0.01\n")).unwrap();
        assert_eq!(table.column_index("logfc"), Some(0));
        assert_eq!(table.column_index_containing("pval"), Some(1));
    }
}
