//! Report rendering.
//!
//! JSON is the machine-readable interface; the Markdown summary mirrors it
//! in tables for a quick read.

use super::document::ResultDocument;
use crate::analysis::sensitivity::{most_influential, LeaveOneOut};
use crate::models::{AnalysisResult, EffectMeasure, PooledResult, PoolingMethod};
use anyhow::Result;

/// Serialize the result document.
pub fn generate_json_report(document: &ResultDocument, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(document)?
    } else {
        serde_json::to_string(document)?
    };
    Ok(json)
}

/// Generate a complete Markdown summary.
pub fn generate_markdown_report(result: &AnalysisResult, document: &ResultDocument) -> String {
    let mut output = String::new();
    let measure = result.measure().unwrap_or(EffectMeasure::PreCalculated);

    output.push_str("# Meta-Analysis Report\n\n");
    output.push_str(&generate_metadata_section(result, document, measure));
    output.push_str(&generate_primary_section(result, measure));
    output.push_str(&generate_models_section(result, measure));
    output.push_str(&generate_heterogeneity_section(result));
    output.push_str(&generate_studies_section(result, measure));

    if let Some(ref runs) = document.sensitivity {
        output.push_str(&generate_sensitivity_section(result, runs, measure));
    }

    output.push_str(&generate_footer());

    output
}

/// Format an effect, with the back-transformed ratio for log-scale measures.
fn format_effect(value: f64, measure: EffectMeasure) -> String {
    if measure.is_log_scale() {
        format!("{:.3} (OR {:.3})", value, value.exp())
    } else {
        format!("{:.3}", value)
    }
}

fn format_ci(lower: f64, upper: f64, measure: EffectMeasure) -> String {
    if measure.is_log_scale() {
        format!(
            "[{:.3}, {:.3}] (OR [{:.3}, {:.3}])",
            lower,
            upper,
            lower.exp(),
            upper.exp()
        )
    } else {
        format!("[{:.3}, {:.3}]", lower, upper)
    }
}

fn format_p(p: f64) -> String {
    if p < 0.001 {
        "< 0.001".to_string()
    } else {
        format!("{:.3}", p)
    }
}

fn method_label(method: PoolingMethod) -> &'static str {
    match method {
        PoolingMethod::FixedEffects => "Fixed effects",
        PoolingMethod::RandomEffects => "Random effects",
    }
}

/// Generate the metadata section.
fn generate_metadata_section(
    result: &AnalysisResult,
    document: &ResultDocument,
    measure: EffectMeasure,
) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Effect Measure:** {}\n", measure.label()));
    section.push_str(&format!("- **Studies Pooled:** {}\n", result.total_studies()));
    if document.dropped_records > 0 {
        section.push_str(&format!(
            "- **Records Dropped:** {}\n",
            document.dropped_records
        ));
    }
    section.push_str(&format!(
        "- **Primary Model:** {}\n",
        method_label(result.primary_method)
    ));
    section.push('\n');

    section
}

/// Generate the primary result section.
fn generate_primary_section(result: &AnalysisResult, measure: EffectMeasure) -> String {
    let primary = result.primary();
    let mut section = String::new();

    section.push_str("## Primary Result\n\n");
    section.push_str(&format!(
        "Pooled {} = {}, 95% CI {}, z = {:.2}, p = {}\n\n",
        measure.label(),
        format_effect(primary.overall_effect, measure),
        format_ci(primary.ci_lower, primary.ci_upper, measure),
        primary.z_statistic,
        format_p(primary.p_value)
    ));

    section
}

fn model_row(pooled: &PooledResult, measure: EffectMeasure) -> String {
    format!(
        "| {} | {} | {:.4} | {} | {:.2} | {} |\n",
        method_label(pooled.method),
        format_effect(pooled.overall_effect, measure),
        pooled.standard_error,
        format_ci(pooled.ci_lower, pooled.ci_upper, measure),
        pooled.z_statistic,
        format_p(pooled.p_value)
    )
}

/// Generate the side-by-side model comparison.
fn generate_models_section(result: &AnalysisResult, measure: EffectMeasure) -> String {
    let mut section = String::new();

    section.push_str("## Pooling Models\n\n");
    section.push_str("| Model | Effect | SE | 95% CI | z | p |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&model_row(&result.fixed_effects, measure));
    section.push_str(&model_row(&result.random_effects, measure));
    section.push('\n');

    section
}

/// Generate the heterogeneity section.
fn generate_heterogeneity_section(result: &AnalysisResult) -> String {
    let het = &result.heterogeneity;
    let mut section = String::new();

    section.push_str("## Heterogeneity\n\n");
    section.push_str("| Q | df | p | I² | τ² |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {:.3} | {} | {} | {:.1}% | {:.4} |\n\n",
        het.q,
        het.degrees_of_freedom,
        format_p(het.q_p_value),
        het.i_squared,
        het.tau_squared
    ));

    section
}

/// Generate the per-study table.
fn generate_studies_section(result: &AnalysisResult, measure: EffectMeasure) -> String {
    let mut section = String::new();
    let fixed = result.fixed_effects.relative_weights();
    let random = result.random_effects.relative_weights();

    section.push_str("## Studies\n\n");
    section.push_str("| Study | Effect | SE | Weight (FE) | Weight (RE) |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");

    for (i, estimate) in result.estimates.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {:.4} | {:.1}% | {:.1}% |\n",
            estimate.study_id,
            format_effect(estimate.effect_size, measure),
            estimate.standard_error,
            fixed[i],
            random[i]
        ));
    }
    section.push('\n');

    section
}

/// Generate the leave-one-out section.
fn generate_sensitivity_section(
    result: &AnalysisResult,
    runs: &[LeaveOneOut],
    measure: EffectMeasure,
) -> String {
    let mut section = String::new();

    section.push_str("## Leave-One-Out Sensitivity\n\n");
    if runs.is_empty() {
        section.push_str("Not enough studies for a leave-one-out analysis.\n\n");
        return section;
    }

    section.push_str("| Omitted | Effect | 95% CI | p | I² |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");
    for run in runs {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {:.1}% |\n",
            run.omitted_study,
            format_effect(run.overall_effect, measure),
            format_ci(run.ci_lower, run.ci_upper, measure),
            format_p(run.p_value),
            run.i_squared
        ));
    }
    section.push('\n');

    if let Some((run, shift)) = most_influential(result.primary().overall_effect, runs) {
        section.push_str(&format!(
            "Most influential study: **{}** (shift {:.3}).\n\n",
            run.omitted_study, shift
        ));
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by metapool v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}
