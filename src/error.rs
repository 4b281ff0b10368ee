//! Error types for the meta-analysis engine.
//!
//! Per-record failures (`Validation`, `DegenerateCell`, `DegenerateVariance`)
//! are recovered by the orchestrator, which drops the record and counts it.
//! `InsufficientData` and `IncompatibleMeasure` abort the whole run.

use crate::models::{EffectMeasure, EffectType};
use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, MetaError>;

/// Errors raised by the statistical engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetaError {
    /// A study record does not satisfy the field shape of its effect type.
    #[error("invalid study record '{study_id}': {reason}")]
    Validation { study_id: String, reason: String },

    /// A 2x2 table has non-positive totals after continuity correction.
    #[error("degenerate 2x2 table for study '{study_id}'")]
    DegenerateCell { study_id: String },

    /// An estimate produced a zero, negative or non-finite variance.
    #[error("study '{study_id}' has unusable variance {variance}")]
    DegenerateVariance { study_id: String, variance: f64 },

    /// No valid estimates survived preparation.
    #[error("no valid studies to pool ({dropped} record(s) dropped)")]
    InsufficientData { dropped: usize },

    /// The requested measure cannot be computed for this effect type.
    #[error("measure '{measure}' is not available for {effect_type} outcomes")]
    IncompatibleMeasure {
        effect_type: EffectType,
        measure: EffectMeasure,
    },
}

impl MetaError {
    /// Shorthand for a validation failure.
    pub fn validation(study_id: &str, reason: impl Into<String>) -> Self {
        MetaError::Validation {
            study_id: study_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error only affects a single record.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            MetaError::Validation { .. }
                | MetaError::DegenerateCell { .. }
                | MetaError::DegenerateVariance { .. }
        )
    }
}
