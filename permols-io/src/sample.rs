//! Sample alignment across tables.
//!
//! Tables are matched on sample ID. The analysis keeps samples present
//! in every table, in the order of the first, and drops samples with a
//! missing value in any table.

use std::collections::HashMap;

use anyhow::{bail, Result};
use tracing::info;

use crate::table::NumericTable;

/// Samples shared by several sources.
#[derive(Debug, Clone)]
pub struct SampleIntersection {
    /// Shared IDs, in the order of the first source.
    pub ids: Vec<String>,
    /// `indices[s][k]` is the row of `ids[k]` in source `s`.
    pub indices: Vec<Vec<usize>>,
}

pub fn intersect_samples(sources: &[&[String]]) -> SampleIntersection {
    let Some((primary, rest)) = sources.split_first() else {
        return SampleIntersection {
            ids: Vec::new(),
            indices: Vec::new(),
        };
    };
    let maps: Vec<HashMap<&str, usize>> = rest
        .iter()
        .map(|ids| ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect())
        .collect();

    let mut ids = Vec::new();
    let mut indices: Vec<Vec<usize>> = vec![Vec::new(); sources.len()];
    for (row, id) in primary.iter().enumerate() {
        let rows: Option<Vec<usize>> = maps.iter().map(|m| m.get(id.as_str()).copied()).collect();
        if let Some(rows) = rows {
            ids.push(id.clone());
            indices[0].push(row);
            for (s, r) in rows.into_iter().enumerate() {
                indices[s + 1].push(r);
            }
        }
    }
    SampleIntersection { ids, indices }
}

/// Reorder every table onto the shared, complete samples.
///
/// Returns the kept sample IDs and one aligned table per input.
pub fn align_tables(tables: &[&NumericTable]) -> Result<(Vec<String>, Vec<NumericTable>)> {
    let sources: Vec<&[String]> = tables.iter().map(|t| t.sample_ids.as_slice()).collect();
    let shared = intersect_samples(&sources);

    let complete: Vec<usize> = (0..shared.ids.len())
        .filter(|&k| {
            tables
                .iter()
                .zip(&shared.indices)
                .all(|(t, rows)| t.is_complete(rows[k]))
        })
        .collect();

    info!(
        "{} samples shared across {} tables, {} with complete data",
        shared.ids.len(),
        tables.len(),
        complete.len()
    );
    if complete.is_empty() {
        bail!("No samples with complete data are shared by all tables");
    }

    let ids = complete.iter().map(|&k| shared.ids[k].clone()).collect();
    let aligned = tables
        .iter()
        .zip(&shared.indices)
        .map(|(t, rows)| {
            let picked: Vec<usize> = complete.iter().map(|&k| rows[k]).collect();
            t.select_rows(&picked)
        })
        .collect();
    Ok((ids, aligned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_table;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_intersect_two_sources() {
        let src1 = ids(&["A", "B", "C", "D"]);
        let src2 = ids(&["C", "A", "E"]);
        let result = intersect_samples(&[&src1, &src2]);
        assert_eq!(result.ids, vec!["A", "C"]);
        assert_eq!(result.indices[0], vec![0, 2]);
        assert_eq!(result.indices[1], vec![1, 0]);
    }

    #[test]
    fn test_empty_intersection() {
        let s1 = ids(&["A", "B"]);
        let s2 = ids(&["C", "D"]);
        assert!(intersect_samples(&[&s1, &s2]).ids.is_empty());
        assert!(intersect_samples(&[]).ids.is_empty());
    }

    #[test]
    fn test_align_drops_incomplete_rows() {
        let tested = parse_table("IID\tx\nA\t1\nB\t2\nC\t3\nD\t4\n", "IID", None).unwrap();
        let targets = parse_table("IID\ty\nD\t40\nC\tNA\nA\t10\n", "IID", None).unwrap();
        let (kept, aligned) = align_tables(&[&tested, &targets]).unwrap();
        assert_eq!(kept, vec!["A", "D"]);
        assert_eq!(aligned[0].columns, vec![vec![1.0, 4.0]]);
        assert_eq!(aligned[1].columns, vec![vec![10.0, 40.0]]);
        assert_eq!(aligned[1].sample_ids, kept);
    }

    #[test]
    fn test_align_fails_without_shared_samples() {
        let a = parse_table("IID\tx\nA\t1\n", "IID", None).unwrap();
        let b = parse_table("IID\ty\nB\t1\n", "IID", None).unwrap();
        assert!(align_tables(&[&a, &b]).is_err());
    }
}
