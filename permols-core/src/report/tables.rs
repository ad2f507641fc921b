//! Tab-separated result tables.
//!
//! Undefined values are written as `NA`. Tested and target columns are
//! labeled with the given names, or with their index when no name is
//! available.

use anyhow::Result;

use crate::accumulator::ScoreAccumulator;
use crate::permuted_ols::PermutedOlsResult;

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        format!("{}", v)
    }
}

fn label(names: &[String], i: usize) -> String {
    names.get(i).cloned().unwrap_or_else(|| i.to_string())
}

/// One row per (tested, target) pair.
pub fn write_pvalues(
    writer: &mut impl std::io::Write,
    result: &PermutedOlsResult,
    tested_names: &[String],
    target_names: &[String],
) -> Result<()> {
    writeln!(writer, "tested\ttarget\tF\tbeta\tneg_log10_p")?;
    let stats = &result.true_statistics;
    for (x_id, row) in result.p_values.iter().enumerate() {
        for (y_id, &p) in row.iter().enumerate() {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}",
                label(tested_names, x_id),
                label(target_names, y_id),
                fmt_value(stats.scores[x_id][y_id]),
                fmt_value(stats.coefficients[x_id][y_id]),
                fmt_value(p),
            )?;
        }
    }
    Ok(())
}

/// Maximum score per permutation, iterations numbered from 1.
pub fn write_null(writer: &mut impl std::io::Write, null: &[f64]) -> Result<()> {
    writeln!(writer, "iteration\tmax_F")?;
    for (i, &v) in null.iter().enumerate() {
        writeln!(writer, "{}\t{}", i + 1, fmt_value(v))?;
    }
    Ok(())
}

/// Retained permuted scores in storage order.
pub fn write_entries(
    writer: &mut impl std::io::Write,
    scores: &ScoreAccumulator,
    tested_names: &[String],
    target_names: &[String],
) -> Result<()> {
    writeln!(writer, "iteration\ttested\ttarget\tF")?;
    for e in scores.entries() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            e.iter_id,
            label(tested_names, e.x_id),
            label(target_names, e.y_id),
            fmt_value(e.score),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_null_marks_nan() {
        let mut buf = Vec::new();
        write_null(&mut buf, &[2.5, f64::NAN]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "iteration\tmax_F\n1\t2.5\n2\tNA\n");
    }

    #[test]
    fn test_write_entries_labels() {
        let mut acc = ScoreAccumulator::new(3, 1.0);
        acc.append_with(2, 0, &[0.5, 4.0], 0);
        let mut buf = Vec::new();
        write_entries(&mut buf, &acc, &["age".to_string()], &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["iteration\ttested\ttarget\tF", "2\tage\t1\t4"]);
    }
}
