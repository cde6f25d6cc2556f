//! tabcv CLI Module
//!
//! Command-line interface for building splits, training and joint studies.

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::ExperimentConfig;
use crate::dataset::Dataset;
use crate::optimizer::{model_params, sampled_model, SearchStrategy, PREPROCESSING_KEY};
use crate::splits::SplitStore;
use crate::training::Trainer;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<20} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tabcv")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reproducible splits, cross-validation and hyperparameter search for tabular classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and save a split document
    Split(RunArgs),

    /// Tune, cross-validate and test every model, then write the prediction table
    Train(RunArgs),

    /// Joint trial study over models and preprocessing variants
    Optimize(RunArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    Grid,
    Trials,
}

impl From<StrategyArg> for SearchStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Grid => SearchStrategy::Grid,
            StrategyArg::Trials => SearchStrategy::Trials,
        }
    }
}

/// Options shared by every command; each one overrides the config file
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Experiment config file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Feature table (CSV or TSV)
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Label column name
    #[arg(short, long)]
    pub target: Option<String>,

    /// Case id column name
    #[arg(long)]
    pub id_column: Option<String>,

    /// Task name used in the prediction file name
    #[arg(long)]
    pub task: Option<String>,

    /// Split document path
    #[arg(long)]
    pub split_path: Option<PathBuf>,

    /// Output directory for predictions and best parameters
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Parameter cache directory
    #[arg(long)]
    pub param_dir: Option<PathBuf>,

    /// Models to train, comma separated (logistic_regression, random_forest)
    #[arg(short, long, value_delimiter = ',')]
    pub models: Option<Vec<String>>,

    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Trial budget of the trial search and joint study
    #[arg(long)]
    pub n_trials: Option<usize>,

    /// Parallel workers for candidate evaluation
    #[arg(long)]
    pub n_jobs: Option<usize>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub test_fraction: Option<f64>,

    #[arg(long)]
    pub n_splits: Option<usize>,

    /// Column defining a predefined test set; requires --test-value
    #[arg(long, requires = "test_value")]
    pub test_column: Option<String>,

    #[arg(long, requires = "test_column")]
    pub test_value: Option<String>,
}

impl RunArgs {
    /// Config file values with command-line overrides applied
    pub fn resolve(&self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_file(path)?,
            None => ExperimentConfig::default(),
        };
        let trainer = &mut config.trainer;

        if let Some(data) = &self.data {
            config.data = Some(data.clone());
        }
        if let Some(target) = &self.target {
            config.columns.target = target.clone();
        }
        if let Some(id) = &self.id_column {
            config.columns.id_column = id.clone();
        }
        if let Some(task) = &self.task {
            trainer.task_name = task.clone();
        }
        if let Some(path) = &self.split_path {
            trainer.split_path = path.clone();
        }
        if let Some(dir) = &self.output {
            trainer.result_dir = dir.clone();
        }
        if let Some(dir) = &self.param_dir {
            trainer.search.param_dir = dir.clone();
        }
        if let Some(models) = &self.models {
            trainer.models = models.clone();
        }
        if let Some(strategy) = self.strategy {
            trainer.search.strategy = strategy.into();
        }
        if let Some(n) = self.n_trials {
            trainer.search.n_trials = n;
        }
        if let Some(n) = self.n_jobs {
            trainer.search.n_jobs = n;
        }
        if let Some(seed) = self.seed {
            trainer.split.seed = seed;
            trainer.search.seed = seed;
        }
        if let Some(fraction) = self.test_fraction {
            trainer.split.test_fraction = fraction;
        }
        if let Some(n) = self.n_splits {
            trainer.split.n_splits = n;
        }
        if let (Some(column), Some(value)) = (&self.test_column, &self.test_value) {
            *trainer = trainer.clone().with_test_selector(column.clone(), value.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_dataset(config: &ExperimentConfig) -> anyhow::Result<Dataset> {
    let path = config
        .data
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("No data file given; use --data or set \"data\" in the config"))?;

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_csv(path)?;
    let dataset = Dataset::from_dataframe(&df, &config.columns)?;
    step_done(&format!(
        "{} rows × {} features in {:?}",
        dataset.n_rows(),
        dataset.feature_names().len(),
        start.elapsed()
    ));
    Ok(dataset)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_split(args: &RunArgs) -> anyhow::Result<()> {
    section("Split");
    let config = args.resolve()?;
    let dataset = load_dataset(&config)?;
    let trainer = &config.trainer;

    step_run("Building split");
    let assignment = match &trainer.test_selector {
        Some(selector) => dataset.split_with_test_from_column(&selector.column, &selector.value, &trainer.split)?,
        None => dataset.full_split(&trainer.split)?,
    };
    SplitStore::save(&assignment, &trainer.split_path)?;
    step_done(&trainer.split_path.display().to_string());

    println!();
    kv("Test ids", &assignment.test_ids().len().to_string());
    for (i, fold) in assignment.folds().iter().enumerate() {
        kv(
            &format!("fold_{}", i),
            &format!("{} train / {} validation", fold.train.len(), fold.val.len()),
        );
    }
    if let Some(split_type) = assignment.split_type() {
        kv("Split type", split_type);
    }
    println!();
    Ok(())
}

pub fn cmd_train(args: &RunArgs) -> anyhow::Result<()> {
    section("Train");
    let config = args.resolve()?;
    let dataset = load_dataset(&config)?;
    let models = config.trainer.build_models()?;

    let start = Instant::now();
    let mut trainer = Trainer::new(dataset, models, config.trainer.clone())?;
    let report = trainer.run()?;

    println!();
    for (model, tuned) in &report.params {
        kv(model, &format!("{} ({})", tuned.params, tuned.source));
    }
    kv("Predictions", &report.predictions_path.display().to_string());
    kv("Split", &report.split_path.display().to_string());
    kv("Time", &format!("{:.3}s", start.elapsed().as_secs_f64()));
    println!();
    Ok(())
}

pub fn cmd_optimize(args: &RunArgs) -> anyhow::Result<()> {
    section("Optimize");
    let config = args.resolve()?;
    let dataset = load_dataset(&config)?;
    let models = config.trainer.build_models()?;

    let start = Instant::now();
    let mut trainer = Trainer::new(dataset, models, config.trainer.clone())?;
    let report = trainer.optimize()?;
    let outcome = &report.outcome;
    let n_failed = outcome.trials.iter().filter(|t| t.score.is_none()).count();

    println!();
    let best = &outcome.best_params;
    kv("Best AUC", &format!("{:.4}", outcome.best_score));
    kv("Best model", sampled_model(best).unwrap_or("-"));
    if let Some(variant) = best.get(PREPROCESSING_KEY).and_then(|v| v.as_str()) {
        kv("Preprocessing", variant);
    }
    kv("Best params", &model_params(best).to_string());
    kv("Trials", &format!("{} ({} failed)", outcome.trials.len(), n_failed));
    kv("Saved", &report.best_params_path.display().to_string());
    kv("Time", &format!("{:.3}s", start.elapsed().as_secs_f64()));
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_train() {
        let cli = Cli::try_parse_from([
            "tabcv", "train", "--data", "f.csv", "--models", "rf,lr", "--strategy", "trials", "--n-trials", "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Train(args) => {
                let config = args.resolve().unwrap();
                assert_eq!(config.trainer.models, vec!["rf", "lr"]);
                assert_eq!(config.trainer.search.strategy, SearchStrategy::Trials);
                assert_eq!(config.trainer.search.n_trials, 5);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_test_column_requires_value() {
        assert!(Cli::try_parse_from(["tabcv", "split", "--test-column", "center"]).is_err());
    }
}
