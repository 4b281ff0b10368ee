//! Analysis orchestration.
//!
//! Turns validated study rows into effect estimates, runs the heterogeneity
//! estimator and both pooling models, and assembles the final result.

use super::heterogeneity;
use super::pooling::{self, DEFAULT_HETEROGENEITY_THRESHOLD};
use crate::effect::compute_estimate;
use crate::error::{MetaError, Result};
use crate::models::{
    AnalysisResult, EffectEstimate, EffectMeasure, EffectType, MethodChoice, PoolingMethod,
    StudyRecord,
};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Options controlling how the primary result is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOptions {
    /// Auto selection or an explicit override.
    pub method: MethodChoice,
    /// Q p-value below which auto selection picks random effects.
    pub heterogeneity_threshold: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            method: MethodChoice::Auto,
            heterogeneity_threshold: DEFAULT_HETEROGENEITY_THRESHOLD,
        }
    }
}

/// A record that was dropped during preparation.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRecord {
    /// Zero-based position in the input.
    pub index: usize,
    pub error: MetaError,
}

/// Output of [`prepare`].
#[derive(Debug, Clone, PartialEq)]
pub struct Preparation {
    /// Valid estimates, in input order.
    pub estimates: Vec<EffectEstimate>,
    pub dropped: Vec<DroppedRecord>,
    pub measure: EffectMeasure,
}

impl Preparation {
    /// Number of dropped records.
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }
}

/// Convert study rows into effect estimates.
///
/// Rows that fail validation or produce an unusable variance are dropped and
/// counted. Fails only if the measure does not fit `effect_type` or if no
/// row survives.
pub fn prepare(
    records: &[StudyRecord],
    effect_type: EffectType,
    measure: Option<EffectMeasure>,
) -> Result<Preparation> {
    let measure = EffectMeasure::resolve(effect_type, measure)?;
    debug!(
        "Preparing {} records as {} ({})",
        records.len(),
        effect_type,
        measure
    );

    let mut estimates = Vec::with_capacity(records.len());
    let mut dropped = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let outcome = record
            .shape(effect_type)
            .and_then(|data| compute_estimate(&record.study_id, &data, measure));

        match outcome {
            Ok(estimate) => estimates.push(estimate),
            Err(error) if error.is_record_level() => {
                debug!("Dropping record {}: {}", index, error);
                dropped.push(DroppedRecord { index, error });
            }
            Err(error) => return Err(error),
        }
    }

    if !dropped.is_empty() {
        warn!(
            "Dropped {} of {} records during preparation",
            dropped.len(),
            records.len()
        );
    }

    if estimates.is_empty() {
        return Err(MetaError::InsufficientData {
            dropped: dropped.len(),
        });
    }

    Ok(Preparation {
        estimates,
        dropped,
        measure,
    })
}

/// Run heterogeneity and both pooling models over prepared estimates.
pub fn analyze(estimates: &[EffectEstimate], options: &AnalysisOptions) -> Result<AnalysisResult> {
    if estimates.is_empty() {
        return Err(MetaError::InsufficientData { dropped: 0 });
    }

    let effects: Vec<f64> = estimates.iter().map(|e| e.effect_size).collect();
    let variances: Vec<f64> = estimates.iter().map(|e| e.variance).collect();

    let heterogeneity = heterogeneity::estimate(&effects, &variances)?;
    let fixed_effects = pooling::fixed_effects(&effects, &variances)?;
    let random_effects =
        pooling::random_effects(&effects, &variances, heterogeneity.tau_squared)?;

    let primary_method = match options.method {
        MethodChoice::Auto => pooling::select_pooling_method(
            heterogeneity.q_p_value,
            options.heterogeneity_threshold,
        ),
        MethodChoice::Fixed => PoolingMethod::FixedEffects,
        MethodChoice::Random => PoolingMethod::RandomEffects,
    };

    info!(
        "Pooled {} studies: Q = {:.3} (p = {:.4}), I² = {:.1}%, primary = {}",
        estimates.len(),
        heterogeneity.q,
        heterogeneity.q_p_value,
        heterogeneity.i_squared,
        primary_method
    );

    Ok(AnalysisResult {
        heterogeneity,
        fixed_effects,
        random_effects,
        primary_method,
        estimates: estimates.to_vec(),
        timestamp: Utc::now(),
    })
}

/// Prepare and analyze in one step.
pub fn run_analysis(
    records: &[StudyRecord],
    effect_type: EffectType,
    measure: Option<EffectMeasure>,
    options: &AnalysisOptions,
) -> Result<(Preparation, AnalysisResult)> {
    let preparation = prepare(records, effect_type, measure)?;
    let result = analyze(&preparation.estimates, options)?;
    Ok((preparation, result))
}
