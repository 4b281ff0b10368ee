//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.metapool.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use metapool::analysis::{AnalysisOptions, DEFAULT_HETEROGENEITY_THRESHOLD};
use metapool::models::{EffectMeasure, EffectType, MethodChoice};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".metapool.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path (`-` for stdout).
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "meta_analysis.json".to_string()
}

/// Statistical engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Outcome family of the input table.
    #[serde(default)]
    pub effect_type: EffectType,

    /// Effect measure; defaults per effect type when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure: Option<EffectMeasure>,

    /// Primary model selection.
    #[serde(default)]
    pub method: MethodChoice,

    /// Q p-value below which random effects becomes primary.
    #[serde(default = "default_threshold")]
    pub heterogeneity_threshold: f64,

    /// Run a leave-one-out sensitivity analysis.
    #[serde(default)]
    pub leave_one_out: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            effect_type: EffectType::default(),
            measure: None,
            method: MethodChoice::default(),
            heterogeneity_threshold: default_threshold(),
            leave_one_out: false,
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_HETEROGENEITY_THRESHOLD
}

impl AnalysisConfig {
    /// Engine options derived from these settings.
    pub fn options(&self) -> AnalysisOptions {
        AnalysisOptions {
            method: self.method,
            heterogeneity_threshold: self.heterogeneity_threshold,
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            pretty: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.analysis.heterogeneity_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            anyhow::bail!(
                "heterogeneity_threshold must be between 0 and 1 (exclusive), got {}",
                threshold
            );
        }
        EffectMeasure::resolve(self.analysis.effect_type, self.analysis.measure)?;
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(effect_type) = args.effect_type {
            if effect_type != self.analysis.effect_type {
                // A measure configured for another outcome family no longer applies.
                self.analysis.measure = None;
            }
            self.analysis.effect_type = effect_type;
        }
        if let Some(measure) = args.measure {
            self.analysis.measure = Some(measure);
        }
        if let Some(method) = args.method {
            self.analysis.method = method;
        }
        if let Some(threshold) = args.threshold {
            self.analysis.heterogeneity_threshold = threshold;
        }
        if args.leave_one_out {
            self.analysis.leave_one_out = true;
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if args.compact {
            self.report.pretty = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
