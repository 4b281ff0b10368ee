//! Inverse-variance pooling under fixed- and random-effects models, and the
//! heterogeneity-driven choice between them.

use super::distributions::{two_sided_p_value, Z_95};
use super::heterogeneity::{check_inputs, weighted_mean};
use crate::error::Result;
use crate::models::{PooledResult, PoolingMethod};

/// Default p-value threshold of Cochran's Q below which random effects is primary.
pub const DEFAULT_HETEROGENEITY_THRESHOLD: f64 = 0.10;

/// Fixed-effects pooled estimate with weights `1 / v_i`.
pub fn fixed_effects(effects: &[f64], variances: &[f64]) -> Result<PooledResult> {
    pool(effects, variances, 0.0, PoolingMethod::FixedEffects)
}

/// Random-effects pooled estimate with weights `1 / (v_i + tau²)`.
pub fn random_effects(effects: &[f64], variances: &[f64], tau_squared: f64) -> Result<PooledResult> {
    pool(
        effects,
        variances,
        tau_squared.max(0.0),
        PoolingMethod::RandomEffects,
    )
}

fn pool(
    effects: &[f64],
    variances: &[f64],
    tau_squared: f64,
    method: PoolingMethod,
) -> Result<PooledResult> {
    check_inputs(effects, variances)?;

    let weights: Vec<f64> = variances.iter().map(|v| 1.0 / (v + tau_squared)).collect();
    let (overall_effect, sum_w) = weighted_mean(effects, &weights);

    let standard_error = 1.0 / sum_w.sqrt();
    let z_statistic = overall_effect / standard_error;
    let p_value = two_sided_p_value(z_statistic);

    Ok(PooledResult {
        method,
        overall_effect,
        standard_error,
        z_statistic,
        p_value,
        ci_lower: overall_effect - Z_95 * standard_error,
        ci_upper: overall_effect + Z_95 * standard_error,
        tau_squared,
        weights,
    })
}

/// Pick the primary model: random effects when `q_p_value < threshold`.
pub fn select_pooling_method(q_p_value: f64, threshold: f64) -> PoolingMethod {
    if q_p_value < threshold {
        PoolingMethod::RandomEffects
    } else {
        PoolingMethod::FixedEffects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_effects_two_studies() {
        let pooled = fixed_effects(&[1.0, 2.0], &[1.0, 1.0]).unwrap();
        assert!((pooled.overall_effect - 1.5).abs() < 1e-12);
        assert!((pooled.standard_error - 0.5_f64.sqrt()).abs() < 1e-12);
        assert!((pooled.z_statistic - 1.5 / 0.5_f64.sqrt()).abs() < 1e-12);
        assert!((pooled.ci_lower - (1.5 - 1.96 * 0.5_f64.sqrt())).abs() < 1e-12);
        assert!((pooled.ci_upper - (1.5 + 1.96 * 0.5_f64.sqrt())).abs() < 1e-12);
        assert_eq!(pooled.weights, vec![1.0, 1.0]);
        assert_eq!(pooled.method, PoolingMethod::FixedEffects);
    }

    #[test]
    fn test_fixed_effects_weights_precise_studies() {
        let pooled = fixed_effects(&[0.0, 1.0], &[0.25, 1.0]).unwrap();
        // Weights 4 and 1.
        assert!((pooled.overall_effect - 0.2).abs() < 1e-12);
        assert!((pooled.total_weight() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_random_effects_adds_tau_squared() {
        let pooled = random_effects(&[0.0, 1.0], &[0.25, 1.0], 0.75).unwrap();
        // Weights 1 and 1/1.75.
        let w = [1.0, 1.0 / 1.75];
        let expected = w[1] / (w[0] + w[1]);
        assert!((pooled.overall_effect - expected).abs() < 1e-12);
        assert!((pooled.standard_error - 1.0 / (w[0] + w[1]).sqrt()).abs() < 1e-12);
        assert_eq!(pooled.tau_squared, 0.75);
    }

    #[test]
    fn test_random_equals_fixed_without_tau() {
        let fe = fixed_effects(&[0.3, 0.5, 0.1], &[0.1, 0.2, 0.3]).unwrap();
        let re = random_effects(&[0.3, 0.5, 0.1], &[0.1, 0.2, 0.3], 0.0).unwrap();
        assert_eq!(fe.overall_effect, re.overall_effect);
        assert_eq!(fe.standard_error, re.standard_error);
        assert_eq!(re.method, PoolingMethod::RandomEffects);
    }

    #[test]
    fn test_random_effects_is_wider() {
        let fe = fixed_effects(&[0.0, 1.0, 3.0], &[0.1, 0.1, 0.1]).unwrap();
        let re = random_effects(&[0.0, 1.0, 3.0], &[0.1, 0.1, 0.1], 1.5).unwrap();
        assert!(re.standard_error > fe.standard_error);
        assert!(re.ci_upper - re.ci_lower > fe.ci_upper - fe.ci_lower);
    }

    #[test]
    fn test_selection_policy() {
        assert_eq!(
            select_pooling_method(0.05, DEFAULT_HETEROGENEITY_THRESHOLD),
            PoolingMethod::RandomEffects
        );
        assert_eq!(
            select_pooling_method(0.10, DEFAULT_HETEROGENEITY_THRESHOLD),
            PoolingMethod::FixedEffects
        );
        assert_eq!(
            select_pooling_method(0.5, DEFAULT_HETEROGENEITY_THRESHOLD),
            PoolingMethod::FixedEffects
        );
        // Threshold is caller-controlled.
        assert_eq!(select_pooling_method(0.07, 0.05), PoolingMethod::FixedEffects);
    }
}
