//! Run the permutation test.
//!
//! permols run --tested-file x.tsv --target-file y.tsv [--confound-file c.tsv] --output-prefix out

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use permols_core::permuted_ols::permuted_ols;
use permols_core::report::serialization::{save_params_json, save_run, SavedRun};
use permols_core::report::tables::{write_entries, write_null, write_pvalues};
use permols_core::PermutedOlsConfig;
use permols_io::{align_tables, read_table, NumericTable};

#[derive(Args)]
pub struct RunArgs {
    /// Table of tested variables
    #[arg(long)]
    tested_file: String,

    /// Tested column names (comma-separated; default: all)
    #[arg(long, default_value = "")]
    tested_cols: String,

    /// Table of target variables
    #[arg(long)]
    target_file: String,

    /// Target column names (comma-separated; default: all)
    #[arg(long, default_value = "")]
    target_cols: String,

    /// Table of confounding variables
    #[arg(long)]
    confound_file: Option<String>,

    /// Confound column names (comma-separated; default: all)
    #[arg(long, default_value = "")]
    confound_cols: String,

    /// Sample ID column name
    #[arg(long, default_value = "IID")]
    sample_id_col: String,

    /// Output file prefix
    #[arg(long)]
    output_prefix: String,

    /// JSON run configuration; explicit flags take precedence
    #[arg(long)]
    config: Option<String>,

    /// Number of permutations
    #[arg(long)]
    n_perm: Option<usize>,

    /// Tail probability below which permuted scores are kept
    #[arg(long)]
    sparsity_threshold: Option<f64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Do not add an intercept to the confounds
    #[arg(long, default_value = "false")]
    no_intercept: bool,
}

fn parse_cols(cols: &str) -> Option<Vec<String>> {
    let names: Vec<String> = cols
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!names.is_empty()).then_some(names)
}

fn load(path: &str, id_col: &str, cols: &str) -> Result<NumericTable> {
    let names = parse_cols(cols);
    let table = read_table(Path::new(path), id_col, names.as_deref())?;
    info!(
        "Read {}: {} samples, {} columns",
        path,
        table.n_samples(),
        table.n_columns()
    );
    Ok(table)
}

fn build_config(args: &RunArgs, threads: Option<usize>) -> Result<PermutedOlsConfig> {
    let mut config = match &args.config {
        Some(path) => PermutedOlsConfig::from_json_file(Path::new(path))?,
        None => PermutedOlsConfig::default(),
    };
    if let Some(n_perm) = args.n_perm {
        config.n_perm = n_perm;
    }
    if let Some(p) = args.sparsity_threshold {
        config.sparsity_threshold = p;
    }
    if args.seed.is_some() {
        config.random_seed = args.seed;
    }
    if args.no_intercept {
        config.model_intercept = false;
    }
    if let Some(threads) = threads {
        config.n_workers = threads;
    }
    config.validate()?;
    Ok(config)
}

fn output_path(prefix: &str, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", prefix, suffix))
}

fn write_table<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<std::fs::File>) -> Result<()>,
{
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn run(args: RunArgs, threads: Option<usize>) -> Result<()> {
    let config = build_config(&args, threads)?;

    let tested = load(&args.tested_file, &args.sample_id_col, &args.tested_cols)?;
    let targets = load(&args.target_file, &args.sample_id_col, &args.target_cols)?;
    let confounds = args
        .confound_file
        .as_deref()
        .map(|path| load(path, &args.sample_id_col, &args.confound_cols))
        .transpose()?;

    let mut tables = vec![&tested, &targets];
    tables.extend(confounds.as_ref());
    let (sample_ids, aligned) = align_tables(&tables)?;

    let x = aligned[0].to_matrix()?;
    let y = aligned[1].to_matrix()?;
    let c = aligned.get(2).map(NumericTable::to_matrix).transpose()?;

    let out = permuted_ols(&x, &y, c.as_ref(), &config)?;
    if out.has_diagnostics() {
        warn!("Run finished with {} diagnostics:", out.diagnostics.len());
        for d in &out.diagnostics {
            warn!("  {}", d);
        }
    }
    let (result, diagnostics) = out.into_parts();

    let prefix = &args.output_prefix;
    write_table(&output_path(prefix, ".pvalues.tsv"), |w| {
        write_pvalues(w, &result, &tested.column_names, &targets.column_names)
    })?;
    write_table(&output_path(prefix, ".null.tsv"), |w| {
        write_null(w, &result.null_distribution)
    })?;
    write_table(&output_path(prefix, ".entries.tsv"), |w| {
        write_entries(
            w,
            &result.permuted_scores,
            &tested.column_names,
            &targets.column_names,
        )
    })?;
    save_params_json(&result.params, &output_path(prefix, ".params.json"))?;

    let saved = SavedRun::new(
        sample_ids,
        tested.column_names.clone(),
        targets.column_names.clone(),
        result,
        diagnostics,
    );
    let run_path = output_path(prefix, ".permols");
    save_run(&saved, &run_path)?;
    info!("Run saved to {}", run_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use permols_core::report::serialization::load_run;

    #[test]
    fn test_parse_cols() {
        assert_eq!(parse_cols(""), None);
        assert_eq!(parse_cols(" , "), None);
        assert_eq!(
            parse_cols("a, b"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    fn write(dir: &Path, name: &str, text: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn args(dir: &Path) -> RunArgs {
        let mut tested = String::from("IID\tdose\n");
        let mut targets = String::from("IID\tr1\tr2\n");
        for i in 0..20 {
            tested.push_str(&format!("S{}\t{}\n", i, i));
            let noise = ((i * 7) % 5) as f64;
            targets.push_str(&format!("S{}\t{}\t{}\n", i, 2.0 * i as f64 + noise, noise));
        }
        // One sample missing from the targets, one with a missing value.
        tested.push_str("S20\t5\nS99\t3\n");
        targets.push_str("S20\tNA\t1\n");
        RunArgs {
            tested_file: write(dir, "tested.tsv", &tested),
            tested_cols: String::new(),
            target_file: write(dir, "targets.tsv", &targets),
            target_cols: String::new(),
            confound_file: None,
            confound_cols: String::new(),
            sample_id_col: "IID".to_string(),
            output_prefix: dir.join("out").to_string_lossy().into_owned(),
            config: None,
            n_perm: Some(50),
            sparsity_threshold: Some(0.5),
            seed: Some(3),
            no_intercept: false,
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path());
        a.config = Some(write(
            dir.path(),
            "config.json",
            r#"{"n_perm": 7, "n_workers": 2, "model_intercept": false}"#,
        ));
        let config = build_config(&a, None).unwrap();
        assert_eq!(config.n_perm, 50);
        assert_eq!(config.n_workers, 2);
        assert!(!config.model_intercept);
        assert_eq!(config.random_seed, Some(3));

        let config = build_config(&a, Some(4)).unwrap();
        assert_eq!(config.n_workers, 4);
    }

    #[test]
    fn test_run_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        run(args(dir.path()), None).unwrap();

        let pvalues = std::fs::read_to_string(dir.path().join("out.pvalues.tsv")).unwrap();
        let lines: Vec<&str> = pvalues.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("dose\tr1\t"));
        assert!(lines[2].starts_with("dose\tr2\t"));

        let null = std::fs::read_to_string(dir.path().join("out.null.tsv")).unwrap();
        assert_eq!(null.lines().count(), 51);
        assert!(dir.path().join("out.entries.tsv").exists());

        let params: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("out.params.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(params["n_samples"], 20);
        assert_eq!(params["random_seed"], 3);

        let saved = load_run(&dir.path().join("out.permols")).unwrap();
        assert_eq!(saved.sample_ids.len(), 20);
        assert_eq!(saved.target_names, vec!["r1", "r2"]);
        assert_eq!(saved.result.null_distribution.len(), 50);
    }
}
