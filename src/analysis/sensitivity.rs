//! Leave-one-out sensitivity analysis.
//!
//! Re-runs the pooled analysis once per study with that study omitted, to
//! show how much any single study drives the primary estimate.

use super::orchestrator::{analyze, AnalysisOptions};
use crate::error::Result;
use crate::models::{EffectEstimate, PoolingMethod};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum number of studies for a leave-one-out run to be meaningful.
pub const MIN_STUDIES_FOR_LEAVE_ONE_OUT: usize = 3;

/// Pooled result with one study omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveOneOut {
    pub omitted_study: String,
    pub primary_method: PoolingMethod,
    pub overall_effect: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub p_value: f64,
    #[serde(rename = "I2")]
    pub i_squared: f64,
}

/// Run the analysis `k` times, each time without one study.
///
/// Returns an empty list when fewer than three studies are available.
pub fn leave_one_out(
    estimates: &[EffectEstimate],
    options: &AnalysisOptions,
) -> Result<Vec<LeaveOneOut>> {
    if estimates.len() < MIN_STUDIES_FOR_LEAVE_ONE_OUT {
        debug!(
            "Skipping leave-one-out: {} studies (need {})",
            estimates.len(),
            MIN_STUDIES_FOR_LEAVE_ONE_OUT
        );
        return Ok(Vec::new());
    }

    estimates
        .iter()
        .enumerate()
        .map(|(i, omitted)| -> Result<LeaveOneOut> {
            let subset: Vec<EffectEstimate> = estimates
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, e)| e.clone())
                .collect();

            let result = analyze(&subset, options)?;
            let primary = result.primary();

            Ok(LeaveOneOut {
                omitted_study: omitted.study_id.clone(),
                primary_method: result.primary_method,
                overall_effect: primary.overall_effect,
                ci_lower: primary.ci_lower,
                ci_upper: primary.ci_upper,
                p_value: primary.p_value,
                i_squared: result.heterogeneity.i_squared,
            })
        })
        .collect()
}

/// The omitted study whose removal shifts the primary estimate the most.
pub fn most_influential<'a>(
    full_effect: f64,
    runs: &'a [LeaveOneOut],
) -> Option<(&'a LeaveOneOut, f64)> {
    runs.iter()
        .map(|r| (r, (r.overall_effect - full_effect).abs()))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}
