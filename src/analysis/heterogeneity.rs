//! Between-study heterogeneity: Cochran's Q, DerSimonian-Laird tau² and I².

use super::distributions::chi_squared_sf;
use crate::error::{MetaError, Result};
use crate::models::HeterogeneityResult;

/// Check that effects and variances line up and are non-empty.
pub(crate) fn check_inputs(effects: &[f64], variances: &[f64]) -> Result<()> {
    if effects.is_empty() {
        return Err(MetaError::InsufficientData { dropped: 0 });
    }
    if effects.len() != variances.len() {
        return Err(MetaError::validation(
            "",
            format!(
                "{} effects but {} variances",
                effects.len(),
                variances.len()
            ),
        ));
    }
    Ok(())
}

/// Inverse-variance weighted mean and the total weight.
pub(crate) fn weighted_mean(effects: &[f64], weights: &[f64]) -> (f64, f64) {
    let total: f64 = weights.iter().sum();
    let weighted: f64 = effects.iter().zip(weights).map(|(e, w)| e * w).sum();
    (weighted / total, total)
}

/// The DerSimonian-Laird denominator `Σw - Σw² / Σw`.
///
/// Weights are rescaled by their maximum before squaring so that very
/// precise studies (weights near `f64::MAX.sqrt()` and beyond) do not
/// overflow `Σw²`.
fn dersimonian_laird_scale(weights: &[f64], sum_w: f64) -> f64 {
    let max_w = weights.iter().copied().fold(0.0, f64::max);
    if !(max_w > 0.0 && max_w.is_finite()) {
        return sum_w - weights.iter().map(|w| w * w).sum::<f64>() / sum_w;
    }
    let s1: f64 = weights.iter().map(|w| w / max_w).sum();
    let s2: f64 = weights.iter().map(|w| (w / max_w).powi(2)).sum();
    max_w * (s1 - s2 / s1)
}

/// Compute Q, its p-value, tau² and I² for `k >= 1` studies.
pub fn estimate(effects: &[f64], variances: &[f64]) -> Result<HeterogeneityResult> {
    check_inputs(effects, variances)?;

    let weights: Vec<f64> = variances.iter().map(|v| 1.0 / v).collect();
    let (mean, sum_w) = weighted_mean(effects, &weights);

    let q: f64 = effects
        .iter()
        .zip(&weights)
        .map(|(e, w)| w * (e - mean).powi(2))
        .sum::<f64>()
        .max(0.0);
    let df = effects.len() - 1;
    let df_f = df as f64;

    let q_p_value = chi_squared_sf(q, df);

    let c = dersimonian_laird_scale(&weights, sum_w);
    let tau_squared = if df > 0 && c > 0.0 {
        ((q - df_f) / c).max(0.0)
    } else {
        0.0
    };

    let i_squared = if q <= df_f || q <= 0.0 {
        0.0
    } else {
        (100.0 * (q - df_f) / q).clamp(0.0, 100.0)
    };

    Ok(HeterogeneityResult {
        q,
        degrees_of_freedom: df,
        q_p_value,
        tau_squared,
        i_squared,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::analysis::pooling::{fixed_effects, random_effects};
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-8 * (1.0 + a.abs().max(b.abs()))
    }

    fn studies(max: usize) -> impl Strategy<Value = Vec<(f64, f64)>> {
        prop::collection::vec((-5.0f64..5.0, 0.001f64..4.0), 1..=max)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Statistics must not depend on the order studies are supplied in.
        #[test]
        fn prop_order_invariance(data in studies(30), seed in any::<u64>()) {
            let (effects, variances): (Vec<f64>, Vec<f64>) = data.iter().copied().unzip();
            let reference = estimate(&effects, &variances).unwrap();

            let mut shuffled = data.clone();
            let len = shuffled.len();
            // Deterministic Fisher-Yates driven by the seed.
            let mut state = seed;
            for i in (1..len).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (state >> 33) as usize % (i + 1);
                shuffled.swap(i, j);
            }
            let (e2, v2): (Vec<f64>, Vec<f64>) = shuffled.into_iter().unzip();
            let permuted = estimate(&e2, &v2).unwrap();

            let tol = 1e-8 * (1.0 + reference.q.abs());
            prop_assert!((reference.q - permuted.q).abs() < tol);
            prop_assert!((reference.tau_squared - permuted.tau_squared).abs() < 1e-8 * (1.0 + reference.tau_squared));
            prop_assert!((reference.i_squared - permuted.i_squared).abs() < 1e-6);

            let pairs = [
                (
                    fixed_effects(&effects, &variances).unwrap(),
                    fixed_effects(&e2, &v2).unwrap(),
                ),
                (
                    random_effects(&effects, &variances, reference.tau_squared).unwrap(),
                    random_effects(&e2, &v2, permuted.tau_squared).unwrap(),
                ),
            ];
            for (a, b) in &pairs {
                prop_assert!(close(a.overall_effect, b.overall_effect));
                prop_assert!(close(a.standard_error, b.standard_error));
                prop_assert!(close(a.ci_lower, b.ci_lower));
                prop_assert!(close(a.ci_upper, b.ci_upper));
            }
        }

        /// I² stays in [0, 100] and tau² is never negative.
        #[test]
        fn prop_bounds(data in studies(40)) {
            let (effects, variances): (Vec<f64>, Vec<f64>) = data.into_iter().unzip();
            let het = estimate(&effects, &variances).unwrap();
            prop_assert!(het.q >= 0.0);
            prop_assert!(het.tau_squared >= 0.0);
            prop_assert!((0.0..=100.0).contains(&het.i_squared));
            prop_assert!((0.0..=1.0).contains(&het.q_p_value));
        }
    }
}
