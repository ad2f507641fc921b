//! Sample-indexed numeric tables.
//!
//! Tab- or space-delimited text with a header row. One column holds the
//! sample ID; the others are numeric. Missing tokens (`NA`, `.`, empty,
//! ...) become NaN.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use permols_linalg::DenseMatrix;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    /// Sample IDs in row order.
    pub sample_ids: Vec<String>,
    pub column_names: Vec<String>,
    /// Column-major values: `columns[j][i]` is sample i, column j.
    pub columns: Vec<Vec<f64>>,
}

/// Read a table, keeping `columns` (or every non-ID column when `None`).
pub fn read_table(path: &Path, id_col: &str, columns: Option<&[String]>) -> Result<NumericTable> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read table: {}", path.display()))?;
    parse_table(&contents, id_col, columns)
        .with_context(|| format!("Invalid table: {}", path.display()))
}

pub fn parse_table(contents: &str, id_col: &str, columns: Option<&[String]>) -> Result<NumericTable> {
    let mut lines = contents.lines();
    let header_line = lines
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty table"))?;
    let delim = if header_line.contains('\t') { '\t' } else { ' ' };
    let split = |line: &str| -> Vec<String> {
        if delim == '\t' {
            line.split('\t').map(|s| s.trim().to_string()).collect()
        } else {
            line.split_whitespace().map(String::from).collect()
        }
    };
    let headers = split(header_line);

    let id_idx = headers
        .iter()
        .position(|h| h == id_col)
        .ok_or_else(|| anyhow::anyhow!("Sample ID column '{}' not found in header", id_col))?;

    let column_names: Vec<String> = match columns {
        Some(names) => names.to_vec(),
        None => headers
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != id_idx)
            .map(|(_, h)| h.clone())
            .collect(),
    };
    let col_indices: Vec<usize> = column_names
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| anyhow::anyhow!("Column '{}' not found in header", name))
        })
        .collect::<Result<Vec<_>>>()?;
    if col_indices.is_empty() {
        bail!("No value columns besides '{}'", id_col);
    }

    let mut sample_ids = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); col_indices.len()];
    let mut seen = HashSet::new();
    let width = col_indices.iter().copied().chain([id_idx]).max().unwrap_or(0) + 1;

    for (line_num, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split(line);
        if fields.len() < width {
            bail!(
                "Line {} has too few fields (expected at least {})",
                line_num + 2,
                width
            );
        }
        let id = fields[id_idx].clone();
        if !seen.insert(id.clone()) {
            bail!("Duplicate sample ID '{}' on line {}", id, line_num + 2);
        }
        sample_ids.push(id);
        for (col, &ci) in values.iter_mut().zip(&col_indices) {
            col.push(parse_value(&fields[ci]));
        }
    }

    debug!(
        "parsed table: {} samples, {} columns",
        sample_ids.len(),
        column_names.len()
    );
    Ok(NumericTable {
        sample_ids,
        column_names,
        columns: values,
    })
}

/// Parse a value, treating NA-like and unparsable tokens as NaN.
fn parse_value(s: &str) -> f64 {
    match s {
        "NA" | "na" | "Na" | "." | "" | "-" | "NaN" | "nan" => f64::NAN,
        _ => s.parse().unwrap_or(f64::NAN),
    }
}

impl NumericTable {
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Whether sample `i` has a value in every column.
    pub fn is_complete(&self, i: usize) -> bool {
        self.columns.iter().all(|c| !c[i].is_nan())
    }

    /// Rows taken in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> NumericTable {
        NumericTable {
            sample_ids: rows.iter().map(|&i| self.sample_ids[i].clone()).collect(),
            column_names: self.column_names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| rows.iter().map(|&i| c[i]).collect())
                .collect(),
        }
    }

    pub fn to_matrix(&self) -> Result<DenseMatrix> {
        Ok(DenseMatrix::from_columns(&self.columns)?)
    }
}
