//! metapool - meta-analysis from the command line
//!
//! Reads a study table, runs the pooled analysis and writes the result
//! document (JSON) or a Markdown summary.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, input, or no valid studies)

mod cli;
mod config;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use metapool::analysis::{leave_one_out, run_analysis};
use metapool::input::load_records;
use metapool::report::{generate_json_report, generate_markdown_report, ResultDocument};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `[general] verbose` applies
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("metapool v{}", env!("CARGO_PKG_VERSION"));
    source.log();
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args, config) {
        error!("Analysis failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .metapool.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the effect type, measure, method and threshold.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete analysis workflow.
fn run(args: Args, config: Config) -> Result<()> {
    config.validate()?;

    let input = args
        .input
        .as_deref()
        .context("An input file is required (--input)")?;

    // Step 1: Load the study table
    let effect_type = config.analysis.effect_type;
    let records = load_records(input, args.input_format, effect_type)
        .with_context(|| format!("Failed to load studies from {}", input.display()))?;

    // Step 2: Effect sizes, heterogeneity and pooling
    let options = config.analysis.options();
    let (preparation, result) = run_analysis(
        &records,
        effect_type,
        config.analysis.measure,
        &options,
    )
    .context("Meta-analysis failed")?;

    // Step 3: Optional leave-one-out
    let sensitivity = if config.analysis.leave_one_out {
        let runs = leave_one_out(&result.estimates, &options)?;
        if runs.is_empty() {
            warn!("Leave-one-out needs at least 3 studies; skipped");
        }
        Some(runs)
    } else {
        None
    };

    // Step 4: Render and write the report
    let document = ResultDocument::new(&result, preparation.dropped_count(), sensitivity);
    let output = match config.report.format {
        OutputFormat::Json => generate_json_report(&document, config.report.pretty)?,
        OutputFormat::Markdown => generate_markdown_report(&result, &document),
    };

    let destination = config.general.output.as_str();
    if destination == "-" {
        println!("{}", output);
    } else {
        std::fs::write(destination, &output)
            .with_context(|| format!("Failed to write report to {}", destination))?;

        let primary = result.primary();
        eprintln!("\n📊 Meta-Analysis Summary:");
        eprintln!(
            "   Studies pooled: {} ({} dropped)",
            result.total_studies(),
            preparation.dropped_count()
        );
        eprintln!("   Measure: {}", preparation.measure.label());
        eprintln!(
            "   Q = {:.3} (p = {:.4}), I² = {:.1}%, τ² = {:.4}",
            result.heterogeneity.q,
            result.heterogeneity.q_p_value,
            result.heterogeneity.i_squared,
            result.heterogeneity.tau_squared
        );
        eprintln!(
            "   Primary ({}): {:.3} [{:.3}, {:.3}], p = {:.4}",
            result.primary_method,
            primary.overall_effect,
            primary.ci_lower,
            primary.ci_upper,
            primary.p_value
        );
        eprintln!("\n✅ Report saved to: {}", destination);
    }

    Ok(())
}

/// Where the active configuration came from.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    /// The default file exists but could not be loaded.
    Fallback(String),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE_NAME),
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
            ConfigSource::Fallback(reason) => warn!("Failed to load config: {}", reason),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigSource::Builtin)),
        Err(e) => Ok((Config::default(), ConfigSource::Fallback(format!("{:#}", e)))),
    }
}
