//! The serialized shape of an analysis result.

use crate::analysis::LeaveOneOut;
use crate::models::{AnalysisResult, EffectMeasure, HeterogeneityResult, PooledResult, PoolingMethod};
use serde::{Deserialize, Serialize};

/// Cochran's Q test as embedded in each pooled block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeterogeneityTest {
    #[serde(rename = "Q")]
    pub q: f64,
    pub p_value: f64,
    #[serde(rename = "I2")]
    pub i_squared: f64,
}

impl From<&HeterogeneityResult> for HeterogeneityTest {
    fn from(het: &HeterogeneityResult) -> Self {
        Self {
            q: het.q,
            p_value: het.q_p_value,
            i_squared: het.i_squared,
        }
    }
}

/// One pooled model in the output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledBlock {
    pub overall_effect: f64,
    pub se: f64,
    pub z_stat: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub heterogeneity_test: HeterogeneityTest,
    /// Present for random-effects blocks only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau2: Option<f64>,
}

impl PooledBlock {
    fn new(pooled: &PooledResult, het: &HeterogeneityResult) -> Self {
        Self {
            overall_effect: pooled.overall_effect,
            se: pooled.standard_error,
            z_stat: pooled.z_statistic,
            p_value: pooled.p_value,
            ci_lower: pooled.ci_lower,
            ci_upper: pooled.ci_upper,
            heterogeneity_test: het.into(),
            tau2: match pooled.method {
                PoolingMethod::RandomEffects => Some(pooled.tau_squared),
                PoolingMethod::FixedEffects => None,
            },
        }
    }
}

/// Per-study inputs to the pooling, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyEffects {
    pub effects: Vec<f64>,
    pub variances: Vec<f64>,
    pub study_labels: Vec<String>,
}

/// Top-level JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub primary_method: PoolingMethod,
    pub primary_results: PooledBlock,
    pub fixed_effects: PooledBlock,
    pub random_effects: PooledBlock,
    pub study_effects: StudyEffects,
    pub total_studies: usize,
    /// ISO-8601 timestamp.
    pub analysis_timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_measure: Option<EffectMeasure>,
    pub dropped_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<Vec<LeaveOneOut>>,
}

impl ResultDocument {
    /// Build the document for a finished analysis.
    pub fn new(
        result: &AnalysisResult,
        dropped_records: usize,
        sensitivity: Option<Vec<LeaveOneOut>>,
    ) -> Self {
        let het = &result.heterogeneity;

        Self {
            primary_method: result.primary_method,
            primary_results: PooledBlock::new(result.primary(), het),
            fixed_effects: PooledBlock::new(&result.fixed_effects, het),
            random_effects: PooledBlock::new(&result.random_effects, het),
            study_effects: StudyEffects {
                effects: result.estimates.iter().map(|e| e.effect_size).collect(),
                variances: result.estimates.iter().map(|e| e.variance).collect(),
                study_labels: result.estimates.iter().map(|e| e.study_id.clone()).collect(),
            },
            total_studies: result.total_studies(),
            analysis_timestamp: result.timestamp.to_rfc3339(),
            effect_measure: result.measure(),
            dropped_records,
            sensitivity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalysisOptions};
    use crate::models::EffectEstimate;

    fn sample_result() -> AnalysisResult {
        let estimates: Vec<EffectEstimate> = [("a", 0.0, 0.3), ("b", 1.0, 0.3), ("c", 3.0, 0.3)]
            .iter()
            .map(|(id, e, se)| {
                EffectEstimate::new(*id, *e, *se, EffectMeasure::PreCalculated).unwrap()
            })
            .collect();
        analyze(&estimates, &AnalysisOptions::default()).unwrap()
    }

    #[test]
    fn test_document_shape() {
        let result = sample_result();
        let doc = ResultDocument::new(&result, 1, None);
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["primary_method"], "random_effects");
        assert_eq!(value["total_studies"], 3);
        assert_eq!(value["dropped_records"], 1);
        assert_eq!(value["effect_measure"], "pre_calculated");
        assert!(value["fixed_effects"].get("tau2").is_none());
        assert!(value["random_effects"]["tau2"].as_f64().unwrap() > 0.0);
        assert!(value["primary_results"]["tau2"].is_number());
        assert!(value["fixed_effects"]["heterogeneity_test"]["Q"].is_number());
        assert!(value["fixed_effects"]["heterogeneity_test"]["I2"].is_number());
        assert_eq!(
            value["study_effects"]["study_labels"],
            serde_json::json!(["a", "b", "c"])
        );
        assert!(value.get("sensitivity").is_none());
    }

    #[test]
    fn test_primary_block_matches_selected_model() {
        let result = sample_result();
        let doc = ResultDocument::new(&result, 0, None);
        assert_eq!(doc.primary_results, doc.random_effects);
        assert_ne!(doc.primary_results, doc.fixed_effects);
    }

    #[test]
    fn test_timestamp_is_iso8601() {
        let result = sample_result();
        let doc = ResultDocument::new(&result, 0, None);
        assert!(chrono::DateTime::parse_from_rfc3339(&doc.analysis_timestamp).is_ok());
    }
}
