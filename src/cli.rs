//! CLI argument parsing for Veredicto

use crate::dataset::{DuplicatePolicy, DEFAULT_SEGMENT_COLUMN};
use crate::experiment::AnalysisConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for analysis reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format for spreadsheet analysis (one row per segment)
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "veredicto")]
#[command(version)]
#[command(about = "Statistical analysis of two-arm A/B experiments", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output (to stderr)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate, test and report on an experiment dataset
    Analyze(AnalyzeArgs),
    /// Write a seeded synthetic dataset
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Experiment events CSV (id, timestamp, group/con_treat, variant/page, converted)
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// Segment lookup CSV keyed by id
    #[arg(long, value_name = "FILE")]
    pub segments: Option<PathBuf>,

    /// Column of the lookup file holding the segment label
    #[arg(long, value_name = "NAME", default_value = DEFAULT_SEGMENT_COLUMN)]
    pub segment_column: String,

    /// TOML file with analysis settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Significance level
    #[arg(long, value_name = "ALPHA")]
    pub alpha: Option<f64>,

    /// Confidence level for intervals
    #[arg(long, value_name = "LEVEL")]
    pub confidence: Option<f64>,

    /// Target statistical power
    #[arg(long, value_name = "POWER")]
    pub target_power: Option<f64>,

    /// Minimum detectable effect (absolute) for power analysis
    #[arg(long, value_name = "EFFECT", allow_hyphen_values = true)]
    pub mde: Option<f64>,

    /// Minimum smaller/larger group size ratio considered balanced
    #[arg(long, value_name = "RATIO")]
    pub balance_threshold: Option<f64>,

    /// How to resolve identifiers on more than one record
    #[arg(long, value_enum, default_value = "keep-first")]
    pub duplicates: DuplicatePolicy,

    /// Remove records whose variant does not match their group
    #[arg(long)]
    pub drop_misassigned: bool,

    /// Report segment intervals at the Bonferroni-adjusted level
    #[arg(long)]
    pub adjusted_intervals: bool,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl AnalyzeArgs {
    /// Apply command-line overrides on top of a base configuration
    pub fn apply_overrides(&self, mut config: AnalysisConfig) -> AnalysisConfig {
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(confidence) = self.confidence {
            config.confidence_level = confidence;
        }
        if let Some(power) = self.target_power {
            config.target_power = power;
        }
        if self.mde.is_some() {
            config.minimum_detectable_effect = self.mde;
        }
        if let Some(threshold) = self.balance_threshold {
            config.balance_threshold = threshold;
        }
        if self.adjusted_intervals {
            config.adjusted_intervals = true;
        }
        config
    }
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Number of users
    #[arg(long, default_value = "100000")]
    pub users: usize,

    /// RNG seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Directory for experiment.csv and segments.csv
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Column name for the segment label
    #[arg(long, value_name = "NAME", default_value = DEFAULT_SEGMENT_COLUMN)]
    pub segment_column: String,
}
