//! Tail probabilities for the standard normal and chi-square distributions.

use statrs::function::erf::erfc;
use statrs::function::gamma::gamma_ur;
use std::f64::consts::FRAC_1_SQRT_2;

/// Two-sided critical value for a 95% normal interval.
pub const Z_95: f64 = 1.96;

/// Standard normal CDF: Φ(x) = erfc(-x/√2) / 2
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x * FRAC_1_SQRT_2)
}

/// Two-sided p-value `2·(1 - Φ(|z|))`, computed from the upper tail directly.
pub fn two_sided_p_value(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    (erfc(z.abs() * FRAC_1_SQRT_2)).clamp(0.0, 1.0)
}

/// Upper tail `P(X > x)` of a chi-square with `df` degrees of freedom.
///
/// Returns 1.0 for `df == 0` and for non-positive `x`.
pub fn chi_squared_sf(x: f64, df: usize) -> f64 {
    if df == 0 || !(x > 0.0) {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    gamma_ur(df as f64 / 2.0, x / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf_reference_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.96) - 0.975_002_1).abs() < 1e-6);
        assert!((normal_cdf(-1.96) - 0.024_997_9).abs() < 1e-6);
    }

    #[test]
    fn test_two_sided_p_value() {
        assert!((two_sided_p_value(1.96) - 0.049_995_8).abs() < 1e-6);
        assert!((two_sided_p_value(-1.96) - two_sided_p_value(1.96)).abs() < 1e-15);
        assert!((two_sided_p_value(0.0) - 1.0).abs() < 1e-12);
        assert!(two_sided_p_value(40.0) >= 0.0);
    }

    #[test]
    fn test_chi_squared_sf_reference_points() {
        // 95th percentiles of chi-square(1) and chi-square(5).
        assert!((chi_squared_sf(3.841_459, 1) - 0.05).abs() < 1e-6);
        assert!((chi_squared_sf(11.070_498, 5) - 0.05).abs() < 1e-6);
        // For 2 df the survival function is exp(-x/2).
        assert!((chi_squared_sf(4.0, 2) - (-2.0_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_chi_squared_sf_edges() {
        assert_eq!(chi_squared_sf(5.0, 0), 1.0);
        assert_eq!(chi_squared_sf(0.0, 3), 1.0);
        assert_eq!(chi_squared_sf(f64::INFINITY, 3), 0.0);
    }
}
