//! Per-study effect size calculation.
//!
//! Pure functions turning two-arm summary statistics into an effect size
//! and its standard error, plus [`compute_estimate`] which dispatches a
//! validated study on the requested measure.

use crate::error::{MetaError, Result};
use crate::models::{ArmCounts, ArmSummary, EffectEstimate, EffectMeasure, StudyData};

/// Continuity correction added to each cell of a 2x2 table with a zero cell.
pub const ZERO_CELL_CORRECTION: f64 = 0.5;

/// Cohen's d and its standard error.
///
/// Requires `n_t > 1`, `n_c > 1` and non-negative SDs. When both SDs are
/// zero the pooled SD is zero and the result is non-finite; callers drop it.
pub fn cohen_d(
    mean_t: f64,
    mean_c: f64,
    sd_t: f64,
    sd_c: f64,
    n_t: f64,
    n_c: f64,
) -> Result<(f64, f64)> {
    if n_t <= 1.0 || n_c <= 1.0 {
        return Err(MetaError::validation(
            "",
            "each arm needs more than one participant",
        ));
    }
    if sd_t < 0.0 || sd_c < 0.0 {
        return Err(MetaError::validation("", "standard deviations must be non-negative"));
    }

    let pooled_sd =
        (((n_t - 1.0) * sd_t.powi(2) + (n_c - 1.0) * sd_c.powi(2)) / (n_t + n_c - 2.0)).sqrt();
    let d = (mean_t - mean_c) / pooled_sd;
    let se = ((n_t + n_c) / (n_t * n_c) + d.powi(2) / (2.0 * (n_t + n_c))).sqrt();

    Ok((d, se))
}

/// Hedges' small-sample correction factor `J = 1 - 3 / (4 df - 1)`.
pub fn hedges_correction(n_t: f64, n_c: f64) -> f64 {
    1.0 - 3.0 / (4.0 * (n_t + n_c - 2.0) - 1.0)
}

/// Hedges' g: Cohen's d and its standard error both scaled by `J`.
pub fn hedges_g(
    mean_t: f64,
    mean_c: f64,
    sd_t: f64,
    sd_c: f64,
    n_t: f64,
    n_c: f64,
) -> Result<(f64, f64)> {
    let (d, se) = cohen_d(mean_t, mean_c, sd_t, sd_c, n_t, n_c)?;
    let j = hedges_correction(n_t, n_c);
    Ok((d * j, se * j))
}

/// Corrected 2x2 cells `(a, b, c, d)`: events and non-events per arm.
fn table_cells(events_t: f64, total_t: f64, events_c: f64, total_c: f64) -> [f64; 4] {
    let cells = [
        events_t,
        total_t - events_t,
        events_c,
        total_c - events_c,
    ];
    if cells.iter().any(|&c| c == 0.0) {
        cells.map(|c| c + ZERO_CELL_CORRECTION)
    } else {
        cells
    }
}

/// Odds ratio and the standard error of its natural log.
///
/// If any cell is zero, 0.5 is added to every event and non-event count
/// (so each total grows by 1) before computing.
pub fn odds_ratio(events_t: f64, total_t: f64, events_c: f64, total_c: f64) -> Result<(f64, f64)> {
    let [a, b, c, d] = table_cells(events_t, total_t, events_c, total_c);
    if a + b <= 0.0 || c + d <= 0.0 || [a, b, c, d].iter().any(|&x| x <= 0.0) {
        return Err(MetaError::DegenerateCell {
            study_id: String::new(),
        });
    }

    let or = (a / b) / (c / d);
    let se = (1.0 / a + 1.0 / b + 1.0 / c + 1.0 / d).sqrt();

    Ok((or, se))
}

/// Risk difference `p_t - p_c` and its standard error.
pub fn risk_difference(
    events_t: f64,
    total_t: f64,
    events_c: f64,
    total_c: f64,
) -> Result<(f64, f64)> {
    if total_t <= 0.0 || total_c <= 0.0 {
        return Err(MetaError::validation("", "totals must be positive"));
    }

    let p_t = events_t / total_t;
    let p_c = events_c / total_c;
    let rd = p_t - p_c;
    let se = (p_t * (1.0 - p_t) / total_t + p_c * (1.0 - p_c) / total_c).sqrt();

    Ok((rd, se))
}

/// Compute the estimate for one validated study.
pub fn compute_estimate(
    study_id: &str,
    data: &StudyData,
    measure: EffectMeasure,
) -> Result<EffectEstimate> {
    let (effect, se) = match (data, measure) {
        (
            StudyData::Continuous {
                intervention,
                control,
            },
            EffectMeasure::CohenD | EffectMeasure::HedgesG,
        ) => continuous_effect(intervention, control, measure),
        (
            StudyData::Binary {
                intervention,
                control,
            },
            EffectMeasure::LogOddsRatio | EffectMeasure::RiskDifference,
        ) => binary_effect(intervention, control, measure),
        (
            StudyData::PreCalculated {
                effect_size,
                standard_error,
            },
            EffectMeasure::PreCalculated,
        ) => Ok((*effect_size, *standard_error)),
        _ => Err(MetaError::validation(
            study_id,
            format!("record shape does not support {}", measure),
        )),
    }
    .map_err(|e| attach_study_id(e, study_id))?;

    EffectEstimate::new(study_id, effect, se, measure)
}

fn continuous_effect(
    t: &ArmSummary,
    c: &ArmSummary,
    measure: EffectMeasure,
) -> Result<(f64, f64)> {
    match measure {
        EffectMeasure::HedgesG => hedges_g(t.mean, c.mean, t.sd, c.sd, t.n, c.n),
        _ => cohen_d(t.mean, c.mean, t.sd, c.sd, t.n, c.n),
    }
}

fn binary_effect(t: &ArmCounts, c: &ArmCounts, measure: EffectMeasure) -> Result<(f64, f64)> {
    match measure {
        EffectMeasure::RiskDifference => risk_difference(t.events, t.total, c.events, c.total),
        _ => {
            let (or, se) = odds_ratio(t.events, t.total, c.events, c.total)?;
            Ok((or.ln(), se))
        }
    }
}

fn attach_study_id(err: MetaError, study_id: &str) -> MetaError {
    match err {
        MetaError::Validation { reason, .. } => MetaError::validation(study_id, reason),
        MetaError::DegenerateCell { .. } => MetaError::DegenerateCell {
            study_id: study_id.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_cohen_d_equal_sds() {
        let (d, se) = cohen_d(15.0, 10.0, 3.0, 3.0, 20.0, 20.0).unwrap();
        assert!((d - 5.0 / 3.0).abs() < EPS);
        let expected_se = (40.0_f64 / 400.0 + d * d / 80.0).sqrt();
        assert!((se - expected_se).abs() < EPS);
    }

    #[test]
    fn test_cohen_d_unequal_groups() {
        let (d, _) = cohen_d(12.0, 10.0, 2.0, 4.0, 10.0, 30.0).unwrap();
        let pooled = ((9.0 * 4.0 + 29.0 * 16.0) / 38.0_f64).sqrt();
        assert!((d - 2.0 / pooled).abs() < EPS);
    }

    #[test]
    fn test_cohen_d_rejects_single_participant() {
        assert!(cohen_d(1.0, 0.0, 1.0, 1.0, 1.0, 10.0).is_err());
    }

    #[test]
    fn test_cohen_d_zero_sd_is_not_finite() {
        let (d, se) = cohen_d(2.0, 1.0, 0.0, 0.0, 10.0, 10.0).unwrap();
        assert!(!d.is_finite());
        assert!(!se.is_finite());
    }

    #[test]
    fn test_hedges_g_shrinks_toward_zero() {
        let (d, se_d) = cohen_d(15.0, 10.0, 3.0, 3.0, 10.0, 10.0).unwrap();
        let (g, se_g) = hedges_g(15.0, 10.0, 3.0, 3.0, 10.0, 10.0).unwrap();
        let j = 1.0 - 3.0 / (4.0 * 18.0 - 1.0);
        assert!((g - d * j).abs() < EPS);
        assert!((se_g - se_d * j).abs() < EPS);
        assert!(g.abs() < d.abs());
    }

    #[test]
    fn test_odds_ratio_no_zero_cells() {
        let (or, se) = odds_ratio(10.0, 50.0, 5.0, 50.0).unwrap();
        assert!((or - (10.0 / 40.0) / (5.0 / 45.0)).abs() < EPS);
        let expected = (1.0 / 10.0 + 1.0 / 40.0 + 1.0 / 5.0 + 1.0 / 45.0_f64).sqrt();
        assert!((se - expected).abs() < EPS);
    }

    #[test]
    fn test_odds_ratio_zero_cell_correction() {
        // Cells (0, 10, 2, 8) become (0.5, 10.5, 2.5, 8.5).
        let (or, se) = odds_ratio(0.0, 10.0, 2.0, 10.0).unwrap();
        assert!(or.is_finite());
        assert!((or - (0.5 / 10.5) / (2.5 / 8.5)).abs() < EPS);
        assert!((or - 0.1619).abs() < 1e-3);
        let expected = (1.0 / 0.5 + 1.0 / 10.5 + 1.0 / 2.5 + 1.0 / 8.5_f64).sqrt();
        assert!((se - expected).abs() < EPS);
    }

    #[test]
    fn test_odds_ratio_all_events() {
        // Non-event cell of the intervention arm is zero.
        let (or, _) = odds_ratio(10.0, 10.0, 5.0, 10.0).unwrap();
        assert!((or - (10.5 / 0.5) / (5.5 / 5.5)).abs() < EPS);
    }

    #[test]
    fn test_risk_difference() {
        let (rd, se) = risk_difference(30.0, 100.0, 20.0, 100.0).unwrap();
        assert!((rd - 0.1).abs() < EPS);
        let expected = (0.3 * 0.7 / 100.0 + 0.2 * 0.8 / 100.0_f64).sqrt();
        assert!((se - expected).abs() < EPS);
    }

    #[test]
    fn test_risk_difference_rejects_zero_total() {
        assert!(risk_difference(0.0, 0.0, 1.0, 10.0).is_err());
    }

    #[test]
    fn test_compute_estimate_log_odds() {
        let data = StudyData::Binary {
            intervention: ArmCounts {
                events: 10.0,
                total: 50.0,
            },
            control: ArmCounts {
                events: 5.0,
                total: 50.0,
            },
        };
        let est = compute_estimate("b1", &data, EffectMeasure::LogOddsRatio).unwrap();
        assert!((est.effect_size - 2.25_f64.ln()).abs() < EPS);
        assert_eq!(est.measure, EffectMeasure::LogOddsRatio);
    }

    #[test]
    fn test_compute_estimate_tags_study_id() {
        let data = StudyData::Continuous {
            intervention: ArmSummary {
                mean: 1.0,
                sd: 1.0,
                n: 1.0,
            },
            control: ArmSummary {
                mean: 0.0,
                sd: 1.0,
                n: 10.0,
            },
        };
        let err = compute_estimate("tiny", &data, EffectMeasure::CohenD).unwrap_err();
        assert!(matches!(err, MetaError::Validation { ref study_id, .. } if study_id == "tiny"));
    }

    #[test]
    fn test_compute_estimate_drops_zero_variance_rd() {
        let data = StudyData::Binary {
            intervention: ArmCounts {
                events: 0.0,
                total: 10.0,
            },
            control: ArmCounts {
                events: 0.0,
                total: 10.0,
            },
        };
        let err = compute_estimate("z", &data, EffectMeasure::RiskDifference).unwrap_err();
        assert!(matches!(err, MetaError::DegenerateVariance { .. }));
    }

    #[test]
    fn test_compute_estimate_shape_mismatch() {
        let data = StudyData::PreCalculated {
            effect_size: 0.3,
            standard_error: 0.1,
        };
        assert!(compute_estimate("p", &data, EffectMeasure::CohenD).is_err());
    }
}
