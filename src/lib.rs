//! metapool - meta-analysis statistical engine
//!
//! Computes per-study effect sizes (Cohen's d, Hedges' g, log odds ratio,
//! risk difference, or pre-calculated), pools them under fixed- and
//! random-effects models, and reports Cochran's Q, tau² and I².
//!
//! ```ignore
//! use metapool::analysis::{run_analysis, AnalysisOptions};
//! use metapool::models::EffectType;
//!
//! let records = metapool::input::parse_csv(&csv_text, EffectType::Continuous)?;
//! let (prep, result) = run_analysis(&records, EffectType::Continuous, None, &AnalysisOptions::default())?;
//! println!("{} = {:.3}", result.primary_method, result.primary().overall_effect);
//! ```

pub mod analysis;
pub mod effect;
pub mod error;
pub mod input;
pub mod models;
pub mod report;

pub use error::{MetaError, Result};
