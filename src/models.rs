//! Data models for the meta-analysis engine.
//!
//! This module contains the core data structures used throughout the
//! crate: raw study rows, the validated per-type study shapes, derived
//! effect estimates, and the pooled results handed to reporting.

use crate::error::{MetaError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome family of the input table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    /// Means, SDs and sample sizes per arm
    #[default]
    Continuous,
    /// Event counts and totals per arm
    Binary,
    /// Effect size and standard error already computed
    #[value(alias = "pre_calculated")]
    PreCalculated,
}

impl EffectType {
    /// Columns that must be present in the input header for this type.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            EffectType::Continuous => &[
                "study_id",
                "intervention_mean",
                "intervention_sd",
                "intervention_n",
                "control_mean",
                "control_sd",
                "control_n",
            ],
            EffectType::Binary => &[
                "study_id",
                "intervention_events",
                "intervention_n",
                "control_events",
                "control_n",
            ],
            EffectType::PreCalculated => &["study_id", "effect_size", "effect_se"],
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectType::Continuous => write!(f, "continuous"),
            EffectType::Binary => write!(f, "binary"),
            EffectType::PreCalculated => write!(f, "pre_calculated"),
        }
    }
}

/// The effect size actually computed for each study.
///
/// Cohen's d and Hedges' g are both legitimate standardized mean
/// differences; they are labelled separately so output never mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EffectMeasure {
    /// Standardized mean difference without small-sample correction
    #[value(alias = "cohen_d")]
    CohenD,
    /// Standardized mean difference with Hedges' correction
    #[value(alias = "hedges_g")]
    HedgesG,
    /// Natural log of the odds ratio
    #[value(alias = "log_odds_ratio")]
    LogOddsRatio,
    /// Difference in event proportions
    #[value(alias = "risk_difference")]
    RiskDifference,
    /// Supplied by the input as-is
    #[value(alias = "pre_calculated")]
    PreCalculated,
}

impl EffectMeasure {
    /// Default measure for an effect type.
    pub fn default_for(effect_type: EffectType) -> Self {
        match effect_type {
            EffectType::Continuous => EffectMeasure::CohenD,
            EffectType::Binary => EffectMeasure::LogOddsRatio,
            EffectType::PreCalculated => EffectMeasure::PreCalculated,
        }
    }

    /// The effect type this measure is computed from.
    pub fn effect_type(&self) -> EffectType {
        match self {
            EffectMeasure::CohenD | EffectMeasure::HedgesG => EffectType::Continuous,
            EffectMeasure::LogOddsRatio | EffectMeasure::RiskDifference => EffectType::Binary,
            EffectMeasure::PreCalculated => EffectType::PreCalculated,
        }
    }

    /// Resolve an optional measure against an effect type.
    pub fn resolve(effect_type: EffectType, measure: Option<EffectMeasure>) -> Result<Self> {
        let measure = measure.unwrap_or_else(|| Self::default_for(effect_type));
        if measure.effect_type() != effect_type {
            return Err(MetaError::IncompatibleMeasure {
                effect_type,
                measure,
            });
        }
        Ok(measure)
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            EffectMeasure::CohenD => "Cohen's d",
            EffectMeasure::HedgesG => "Hedges' g",
            EffectMeasure::LogOddsRatio => "log odds ratio",
            EffectMeasure::RiskDifference => "risk difference",
            EffectMeasure::PreCalculated => "pre-calculated effect",
        }
    }

    /// Whether pooled values are on the log scale.
    pub fn is_log_scale(&self) -> bool {
        matches!(self, EffectMeasure::LogOddsRatio)
    }
}

impl fmt::Display for EffectMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectMeasure::CohenD => write!(f, "cohen_d"),
            EffectMeasure::HedgesG => write!(f, "hedges_g"),
            EffectMeasure::LogOddsRatio => write!(f, "log_odds_ratio"),
            EffectMeasure::RiskDifference => write!(f, "risk_difference"),
            EffectMeasure::PreCalculated => write!(f, "pre_calculated"),
        }
    }
}

/// One input row. Every outcome field is optional; which ones must be set
/// depends on the effect type and is checked by [`StudyRecord::shape`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyRecord {
    pub study_id: String,
    pub intervention_mean: Option<f64>,
    pub intervention_sd: Option<f64>,
    pub intervention_n: Option<f64>,
    pub control_mean: Option<f64>,
    pub control_sd: Option<f64>,
    pub control_n: Option<f64>,
    pub intervention_events: Option<f64>,
    pub control_events: Option<f64>,
    pub effect_size: Option<f64>,
    pub effect_se: Option<f64>,
    /// Columns whose cell could not be read as a number.
    #[serde(skip)]
    pub malformed: Vec<String>,
}

/// Summary statistics for one arm of a continuous outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmSummary {
    pub mean: f64,
    pub sd: f64,
    pub n: f64,
}

/// Event counts for one arm of a binary outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmCounts {
    pub events: f64,
    pub total: f64,
}

/// A study record validated against its effect type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StudyData {
    Continuous {
        intervention: ArmSummary,
        control: ArmSummary,
    },
    Binary {
        intervention: ArmCounts,
        control: ArmCounts,
    },
    PreCalculated {
        effect_size: f64,
        standard_error: f64,
    },
}

impl StudyRecord {
    /// Numeric outcome columns, in input-table order.
    pub const NUMERIC_COLUMNS: [&'static str; 10] = [
        "intervention_mean",
        "intervention_sd",
        "intervention_n",
        "control_mean",
        "control_sd",
        "control_n",
        "intervention_events",
        "control_events",
        "effect_size",
        "effect_se",
    ];

    /// Mutable access to a numeric column by name.
    pub fn numeric_slot_mut(&mut self, column: &str) -> Option<&mut Option<f64>> {
        match column {
            "intervention_mean" => Some(&mut self.intervention_mean),
            "intervention_sd" => Some(&mut self.intervention_sd),
            "intervention_n" => Some(&mut self.intervention_n),
            "control_mean" => Some(&mut self.control_mean),
            "control_sd" => Some(&mut self.control_sd),
            "control_n" => Some(&mut self.control_n),
            "intervention_events" => Some(&mut self.intervention_events),
            "control_events" => Some(&mut self.control_events),
            "effect_size" => Some(&mut self.effect_size),
            "effect_se" => Some(&mut self.effect_se),
            _ => None,
        }
    }

    /// Validate this record against the fields required by `effect_type`.
    pub fn shape(&self, effect_type: EffectType) -> Result<StudyData> {
        if let Some(column) = self.malformed.first() {
            let reason = if column == "study_id" {
                "study_id is not a text label".to_string()
            } else {
                format!("{} is not a number", column)
            };
            return Err(MetaError::validation(&self.study_id, reason));
        }

        match effect_type {
            EffectType::Continuous => {
                let intervention = ArmSummary {
                    mean: self.require("intervention_mean", self.intervention_mean)?,
                    sd: self.require("intervention_sd", self.intervention_sd)?,
                    n: self.require("intervention_n", self.intervention_n)?,
                };
                let control = ArmSummary {
                    mean: self.require("control_mean", self.control_mean)?,
                    sd: self.require("control_sd", self.control_sd)?,
                    n: self.require("control_n", self.control_n)?,
                };
                for (name, arm) in [("intervention", &intervention), ("control", &control)] {
                    if arm.n <= 0.0 {
                        return Err(MetaError::validation(
                            &self.study_id,
                            format!("{}_n must be positive", name),
                        ));
                    }
                    if arm.sd < 0.0 {
                        return Err(MetaError::validation(
                            &self.study_id,
                            format!("{}_sd must not be negative", name),
                        ));
                    }
                }
                Ok(StudyData::Continuous {
                    intervention,
                    control,
                })
            }
            EffectType::Binary => {
                let intervention = ArmCounts {
                    events: self.require("intervention_events", self.intervention_events)?,
                    total: self.require("intervention_n", self.intervention_n)?,
                };
                let control = ArmCounts {
                    events: self.require("control_events", self.control_events)?,
                    total: self.require("control_n", self.control_n)?,
                };
                for (name, arm) in [("intervention", &intervention), ("control", &control)] {
                    if arm.total <= 0.0 {
                        return Err(MetaError::validation(
                            &self.study_id,
                            format!("{}_n must be positive", name),
                        ));
                    }
                    if arm.events < 0.0 || arm.events > arm.total {
                        return Err(MetaError::validation(
                            &self.study_id,
                            format!("{}_events must lie between 0 and {}_n", name, name),
                        ));
                    }
                }
                Ok(StudyData::Binary {
                    intervention,
                    control,
                })
            }
            EffectType::PreCalculated => Ok(StudyData::PreCalculated {
                effect_size: self.require("effect_size", self.effect_size)?,
                standard_error: self.require("effect_se", self.effect_se)?,
            }),
        }
    }

    fn require(&self, column: &str, value: Option<f64>) -> Result<f64> {
        match value {
            Some(v) if v.is_finite() => Ok(v),
            Some(_) => Err(MetaError::validation(
                &self.study_id,
                format!("{} is not finite", column),
            )),
            None => Err(MetaError::validation(
                &self.study_id,
                format!("missing {}", column),
            )),
        }
    }
}

/// Effect size derived from one study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectEstimate {
    pub study_id: String,
    /// Positive values favour the intervention arm by convention.
    pub effect_size: f64,
    pub standard_error: f64,
    pub variance: f64,
    pub effect_type: EffectType,
    pub measure: EffectMeasure,
}

impl EffectEstimate {
    /// Build an estimate, rejecting zero, negative or non-finite variance.
    pub fn new(
        study_id: impl Into<String>,
        effect_size: f64,
        standard_error: f64,
        measure: EffectMeasure,
    ) -> Result<Self> {
        let study_id = study_id.into();
        let variance = standard_error * standard_error;

        if !effect_size.is_finite() {
            return Err(MetaError::validation(&study_id, "effect size is not finite"));
        }
        if !(standard_error > 0.0) || !variance.is_finite() || variance <= 0.0 {
            return Err(MetaError::DegenerateVariance { study_id, variance });
        }

        Ok(Self {
            study_id,
            effect_size,
            standard_error,
            variance,
            effect_type: measure.effect_type(),
            measure,
        })
    }
}

/// Cochran's Q, tau² and I² for a set of studies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeterogeneityResult {
    pub q: f64,
    pub degrees_of_freedom: usize,
    pub q_p_value: f64,
    pub tau_squared: f64,
    pub i_squared: f64,
}

/// Pooling model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingMethod {
    FixedEffects,
    RandomEffects,
}

impl fmt::Display for PoolingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolingMethod::FixedEffects => write!(f, "fixed_effects"),
            PoolingMethod::RandomEffects => write!(f, "random_effects"),
        }
    }
}

/// Which pooled result to mark as primary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MethodChoice {
    /// Choose from the heterogeneity test
    #[default]
    Auto,
    /// Always report fixed effects as primary
    Fixed,
    /// Always report random effects as primary
    Random,
}

/// A pooled estimate under one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledResult {
    pub method: PoolingMethod,
    pub overall_effect: f64,
    pub standard_error: f64,
    pub z_statistic: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    /// Between-study variance added to each study variance (0 for fixed).
    pub tau_squared: f64,
    /// Inverse-variance weight per study, in input order.
    pub weights: Vec<f64>,
}

impl PooledResult {
    /// Sum of the per-study weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Per-study weights as percentages of the total.
    pub fn relative_weights(&self) -> Vec<f64> {
        let total = self.total_weight();
        self.weights.iter().map(|w| 100.0 * w / total).collect()
    }
}

/// Complete result of one analysis run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub heterogeneity: HeterogeneityResult,
    pub fixed_effects: PooledResult,
    pub random_effects: PooledResult,
    pub primary_method: PoolingMethod,
    pub estimates: Vec<EffectEstimate>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    /// The pooled result selected as primary.
    pub fn primary(&self) -> &PooledResult {
        match self.primary_method {
            PoolingMethod::FixedEffects => &self.fixed_effects,
            PoolingMethod::RandomEffects => &self.random_effects,
        }
    }

    /// Number of studies that contributed.
    pub fn total_studies(&self) -> usize {
        self.estimates.len()
    }

    /// Measure shared by the contributing estimates.
    pub fn measure(&self) -> Option<EffectMeasure> {
        self.estimates.first().map(|e| e.measure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continuous_record() -> StudyRecord {
        StudyRecord {
            study_id: "s1".to_string(),
            intervention_mean: Some(15.0),
            intervention_sd: Some(3.0),
            intervention_n: Some(20.0),
            control_mean: Some(10.0),
            control_sd: Some(3.0),
            control_n: Some(20.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_measure_resolution() {
        assert_eq!(
            EffectMeasure::resolve(EffectType::Binary, None).unwrap(),
            EffectMeasure::LogOddsRatio
        );
        assert_eq!(
            EffectMeasure::resolve(EffectType::Continuous, Some(EffectMeasure::HedgesG)).unwrap(),
            EffectMeasure::HedgesG
        );
        assert!(matches!(
            EffectMeasure::resolve(EffectType::Continuous, Some(EffectMeasure::RiskDifference)),
            Err(MetaError::IncompatibleMeasure { .. })
        ));
    }

    #[test]
    fn test_continuous_shape() {
        let shaped = continuous_record().shape(EffectType::Continuous).unwrap();
        match shaped {
            StudyData::Continuous {
                intervention,
                control,
            } => {
                assert_eq!(intervention.mean, 15.0);
                assert_eq!(control.n, 20.0);
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn test_shape_rejects_missing_fields() {
        let record = continuous_record();
        let err = record.shape(EffectType::Binary).unwrap_err();
        assert_eq!(
            err,
            MetaError::validation("s1", "missing intervention_events")
        );
    }

    #[test]
    fn test_shape_rejects_non_positive_n() {
        let record = StudyRecord {
            control_n: Some(0.0),
            ..continuous_record()
        };
        assert!(record.shape(EffectType::Continuous).is_err());
    }

    #[test]
    fn test_shape_rejects_events_above_total() {
        let record = StudyRecord {
            study_id: "b".to_string(),
            intervention_events: Some(12.0),
            intervention_n: Some(10.0),
            control_events: Some(2.0),
            control_n: Some(10.0),
            ..Default::default()
        };
        assert!(record.shape(EffectType::Binary).is_err());
    }

    #[test]
    fn test_shape_reports_malformed_cells() {
        let record = StudyRecord {
            malformed: vec!["control_sd".to_string()],
            ..continuous_record()
        };
        let err = record.shape(EffectType::Continuous).unwrap_err();
        assert_eq!(err, MetaError::validation("s1", "control_sd is not a number"));
    }

    #[test]
    fn test_numeric_slot_lookup() {
        let mut record = StudyRecord::default();
        for column in StudyRecord::NUMERIC_COLUMNS {
            *record.numeric_slot_mut(column).unwrap() = Some(1.0);
        }
        assert_eq!(record.effect_se, Some(1.0));
        assert_eq!(record.intervention_events, Some(1.0));
        assert!(record.numeric_slot_mut("study_id").is_none());
    }

    #[test]
    fn test_estimate_rejects_zero_variance() {
        let err = EffectEstimate::new("s", 0.4, 0.0, EffectMeasure::PreCalculated).unwrap_err();
        assert!(matches!(err, MetaError::DegenerateVariance { .. }));

        let err =
            EffectEstimate::new("s", 0.4, f64::NAN, EffectMeasure::PreCalculated).unwrap_err();
        assert!(matches!(err, MetaError::DegenerateVariance { .. }));
    }

    #[test]
    fn test_estimate_variance_is_se_squared() {
        let est = EffectEstimate::new("s", 0.4, 0.2, EffectMeasure::HedgesG).unwrap();
        assert!((est.variance - 0.04).abs() < 1e-12);
        assert_eq!(est.effect_type, EffectType::Continuous);
    }

    #[test]
    fn test_relative_weights() {
        let pooled = PooledResult {
            method: PoolingMethod::FixedEffects,
            overall_effect: 0.0,
            standard_error: 1.0,
            z_statistic: 0.0,
            p_value: 1.0,
            ci_lower: -1.96,
            ci_upper: 1.96,
            tau_squared: 0.0,
            weights: vec![1.0, 3.0],
        };
        assert_eq!(pooled.total_weight(), 4.0);
        assert_eq!(pooled.relative_weights(), vec![25.0, 75.0]);
    }

    #[test]
    fn test_method_serialization() {
        assert_eq!(
            serde_json::to_string(&PoolingMethod::RandomEffects).unwrap(),
            "\"random_effects\""
        );
        assert_eq!(
            serde_json::to_string(&EffectType::PreCalculated).unwrap(),
            "\"pre_calculated\""
        );
    }
}
