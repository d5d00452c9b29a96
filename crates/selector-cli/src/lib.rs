//! RUL Feature Selection CLI
//!
//! Loads a CSV dataset and a hyperparameter file, ranks the feature columns
//! with the configured tree ensembles and prints the selection as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use feature_selector::{FeatureMatrix, FeatureSelector, HyperparameterConfig, TargetVector};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Select RUL features by tree-ensemble importance")]
pub struct Args {
    /// CSV file with a header row
    #[arg(short, long)]
    pub data: PathBuf,

    /// Target column
    #[arg(short, long, default_value = "RUL")]
    pub target: String,

    /// Hyperparameter file (yaml, toml or json)
    #[arg(short, long, default_value = "config/model_config.yaml")]
    pub config: PathBuf,

    /// Number of features to keep per model
    #[arg(short = 'n', long, default_value = "20")]
    pub top_n: usize,

    /// Columns to leave out of the feature set, e.g. unit,cycle
    #[arg(long, value_delimiter = ',')]
    pub drop: Vec<String>,

    /// Rank with a single model kind and print its scores
    #[arg(short, long)]
    pub model: Option<String>,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Initialize logging (stderr, so stdout carries only the result)
pub fn init_logging(json: bool, verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.expect("Failed to set tracing subscriber");
}

/// Split a CSV file into feature matrix and target.
///
/// Every column except `target` and `drop` becomes a feature and must be numeric.
pub fn load_dataset(
    path: &Path,
    target: &str,
    drop: &[String],
) -> Result<(FeatureMatrix, TargetVector)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let target_idx = headers
        .iter()
        .position(|h| h == target)
        .with_context(|| format!("Target column '{}' not found", target))?;

    for name in drop {
        if !headers.iter().any(|h| h == name) {
            warn!("Column '{}' listed in --drop does not exist", name);
        }
    }

    let feature_idx: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| *i != target_idx && !drop.iter().any(|d| d == h))
        .map(|(i, _)| i)
        .collect();
    let names: Vec<String> = feature_idx.iter().map(|&i| headers[i].to_string()).collect();

    let mut rows = Vec::new();
    let mut targets = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read record {}", line + 1))?;
        let parse = |i: usize| -> Result<f64> {
            record[i].parse::<f64>().with_context(|| {
                format!(
                    "Record {}: column '{}' is not numeric: {:?}",
                    line + 1,
                    &headers[i],
                    &record[i]
                )
            })
        };

        targets.push(parse(target_idx)?);
        rows.push(
            feature_idx
                .iter()
                .map(|&i| parse(i))
                .collect::<Result<Vec<f64>>>()?,
        );
    }

    info!(
        "Loaded {} rows x {} features from {}",
        rows.len(),
        names.len(),
        path.display()
    );

    let matrix = FeatureMatrix::from_rows(names, &rows)?;
    Ok((matrix, TargetVector::from(targets)))
}

/// Run selection and emit the JSON result
pub fn run(args: &Args) -> Result<()> {
    ensure!(args.top_n > 0, "--top-n must be at least 1");

    let config = HyperparameterConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let (matrix, target) = load_dataset(&args.data, &args.target, &args.drop)?;
    let selector = FeatureSelector::new(config);

    let json = match &args.model {
        Some(kind) => {
            let ranking = selector.rank(&matrix, &target, kind)?;
            let top = &ranking.entries()[..args.top_n.min(ranking.len())];
            serde_json::to_string_pretty(top)?
        }
        None => {
            let result = selector.consensus_select(&matrix, &target, args.top_n)?;
            serde_json::to_string_pretty(&result)?
        }
    };

    match &args.output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Selection written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    /// unit, cycle, three sensors and RUL; sensor_2 tracks RUL exactly
    fn fd001_like_csv(rows: usize) -> String {
        let mut csv = String::from("unit,cycle,sensor_2,sensor_7,sensor_11,RUL\n");
        for i in 0..rows {
            csv.push_str(&format!(
                "1,{},{},{},{},{}\n",
                i + 1,
                641.0 + i as f64 * 0.1,
                ((i * 7) % 5) as f64,
                47.0,
                rows - i
            ));
        }
        csv
    }

    const CONFIG: &str = "
gradient_boosting:
  n_estimators: 10
  max_depth: 3
  random_state: 1
random_forest:
  n_estimators: 10
  random_state: 1
";

    fn args(data: &Path, config: &Path) -> Args {
        Args {
            data: data.to_path_buf(),
            target: "RUL".to_string(),
            config: config.to_path_buf(),
            top_n: 2,
            drop: vec!["unit".to_string(), "cycle".to_string()],
            model: None,
            output: None,
            json_logs: false,
            verbose: false,
        }
    }

    #[test]
    fn test_load_dataset() {
        let data = temp_file(".csv", &fd001_like_csv(5));
        let drop = vec!["unit".to_string(), "cycle".to_string()];
        let (matrix, target) = load_dataset(data.path(), "RUL", &drop).unwrap();

        assert_eq!(matrix.names(), &["sensor_2", "sensor_7", "sensor_11"]);
        assert_eq!(matrix.n_rows(), 5);
        assert_eq!(target.values()[0], 5.0);
    }

    #[test]
    fn test_missing_target_column() {
        let data = temp_file(".csv", &fd001_like_csv(3));
        let err = load_dataset(data.path(), "rul", &[]).unwrap_err();
        assert!(err.to_string().contains("Target column 'rul' not found"));
    }

    #[test]
    fn test_non_numeric_value() {
        let data = temp_file(".csv", "a,RUL\n1.0,3\nbad,2\n");
        let err = load_dataset(data.path(), "RUL", &[]).unwrap_err();
        assert!(err.to_string().contains("column 'a' is not numeric"));
    }

    #[test]
    fn test_run_writes_consensus() {
        let data = temp_file(".csv", &fd001_like_csv(40));
        let config = temp_file(".yaml", CONFIG);
        let output = tempfile::Builder::new().suffix(".json").tempfile().unwrap();

        let mut args = args(data.path(), config.path());
        args.output = Some(output.path().to_path_buf());
        run(&args).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output.path()).unwrap()).unwrap();
        assert_eq!(written["gradient_boosting"][0], "sensor_2");
        assert_eq!(written["random_forest"][0], "sensor_2");
        assert!(written["common"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("sensor_2")));
    }

    #[test]
    fn test_run_single_model() {
        let data = temp_file(".csv", &fd001_like_csv(30));
        let config = temp_file(".yaml", CONFIG);
        let output = tempfile::Builder::new().suffix(".json").tempfile().unwrap();

        let mut args = args(data.path(), config.path());
        args.model = Some("random_forest".to_string());
        args.top_n = 10;
        args.output = Some(output.path().to_path_buf());
        run(&args).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output.path()).unwrap()).unwrap();
        let entries = written.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["feature"], "sensor_2");
    }

    #[test]
    fn test_run_rejects_zero_top_n() {
        let data = temp_file(".csv", &fd001_like_csv(5));
        let config = temp_file(".yaml", CONFIG);
        let mut args = args(data.path(), config.path());
        args.top_n = 0;
        assert!(run(&args).is_err());
    }
}
