//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use metapool::input::InputFormat;
use metapool::models::{EffectMeasure, EffectType, MethodChoice};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// metapool - fixed- and random-effects meta-analysis
///
/// Computes per-study effect sizes from a study table, pools them under
/// fixed- and random-effects models, and reports heterogeneity.
///
/// Examples:
///   metapool --input studies.csv
///   metapool --input trials.csv --effect-type binary --measure risk-difference
///   metapool --input effects.json --effect-type pre-calculated --method random
///   metapool --input studies.csv --format markdown --output report.md --leave-one-out
///   metapool --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Study table to analyze (CSV or JSON, one row per study)
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Input format; inferred from the file extension when omitted
    #[arg(long, value_name = "FORMAT")]
    pub input_format: Option<InputFormat>,

    /// Outcome family of the study table
    #[arg(short = 't', long, value_name = "TYPE")]
    pub effect_type: Option<EffectType>,

    /// Effect measure to compute per study
    ///
    /// Defaults: cohen-d (continuous), log-odds-ratio (binary),
    /// pre-calculated (pre-calculated).
    #[arg(short, long, value_name = "MEASURE")]
    pub measure: Option<EffectMeasure>,

    /// Primary pooling model (auto picks from the heterogeneity test)
    #[arg(long, value_name = "METHOD")]
    pub method: Option<MethodChoice>,

    /// Q-test p-value below which auto selection uses random effects
    #[arg(long, value_name = "P")]
    pub threshold: Option<f64>,

    /// Add a leave-one-out sensitivity analysis to the report
    #[arg(long)]
    pub leave_one_out: bool,

    /// Output file path for the report (`-` for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (json, markdown)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write JSON on a single line
    #[arg(long)]
    pub compact: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .metapool.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "METAPOOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .metapool.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON result document (default)
    #[default]
    Json,
    /// Markdown summary
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate input file
        match self.input {
            Some(ref input) if !input.is_file() => {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            None => return Err("An input file is required (--input)".to_string()),
            _ => {}
        }

        // Validate threshold range
        if let Some(threshold) = self.threshold {
            if !(threshold > 0.0 && threshold < 1.0) {
                return Err("Threshold must be between 0 and 1 (exclusive)".to_string());
            }
        }

        // Validate measure against an explicit effect type
        if let (Some(effect_type), Some(measure)) = (self.effect_type, self.measure) {
            if measure.effect_type() != effect_type {
                return Err(format!(
                    "Measure '{}' cannot be computed from {} data",
                    measure, effect_type
                ));
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over both `--verbose` and a config file's `verbose`.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
