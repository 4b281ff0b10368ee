//! Tabular study input.
//!
//! Loads one row per study from CSV or JSON into [`StudyRecord`]s. Column
//! presence is checked against the effect type here; per-row values are
//! validated later, so a bad row is dropped rather than failing the load.
//!
//! # Supported Formats
//!
//! - **CSV**: header row, columns matched by name, extra columns ignored
//! - **JSON**: an array of objects using the same field names

mod csv;

pub use self::csv::parse_csv;

use crate::models::{EffectType, StudyRecord};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while loading study data.
#[derive(Debug, Error)]
pub enum InputError {
    /// IO error reading the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV content at a specific line (1-indexed).
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Malformed JSON document.
    #[error("Invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    /// The header lacks a column the effect type needs.
    #[error("Missing required column '{column}' for {effect_type} data")]
    MissingColumn {
        column: String,
        effect_type: EffectType,
    },

    /// The file extension does not identify a supported format.
    #[error("Cannot infer input format from '{0}'; use --input-format")]
    UnknownFormat(String),
}

/// Input file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(InputFormat::Csv),
            Some("json") => Ok(InputFormat::Json),
            _ => Err(InputError::UnknownFormat(path.display().to_string())),
        }
    }
}

/// Load study records from a file.
pub fn load_records(
    path: &Path,
    format: Option<InputFormat>,
    effect_type: EffectType,
) -> Result<Vec<StudyRecord>, InputError> {
    let format = match format {
        Some(f) => f,
        None => InputFormat::from_path(path)?,
    };
    info!("Loading {:?} study data from {}", format, path.display());

    let content = std::fs::read_to_string(path)?;
    let records = match format {
        InputFormat::Csv => parse_csv(&content, effect_type)?,
        InputFormat::Json => parse_json(&content)?,
    };

    debug!("Loaded {} rows", records.len());
    Ok(records)
}

/// Parse a JSON array of study objects.
///
/// A field that is present but not a number (or, for `study_id`, not a
/// string or number) marks that record as malformed instead of failing the
/// whole array; `null` counts as absent.
pub fn parse_json(content: &str) -> Result<Vec<StudyRecord>, InputError> {
    let rows: Vec<Value> = serde_json::from_str(content)?;

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let object = row.as_object().ok_or_else(|| InputError::Parse {
            line: i + 1,
            message: format!("element {} is not an object", i + 1),
        })?;

        let mut record = StudyRecord::default();
        match object.get("study_id") {
            None | Some(Value::Null) => {}
            Some(Value::String(id)) => record.study_id = id.clone(),
            Some(Value::Number(id)) => record.study_id = id.to_string(),
            Some(_) => record.malformed.push("study_id".to_string()),
        }

        for name in StudyRecord::NUMERIC_COLUMNS {
            let value = match object.get(name) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };
            match value.as_f64() {
                Some(number) => {
                    if let Some(slot) = record.numeric_slot_mut(name) {
                        *slot = Some(number);
                    }
                }
                None => record.malformed.push(name.to_string()),
            }
        }

        fill_study_id(&mut record, i + 1);
        records.push(record);
    }

    Ok(records)
}

/// Give unlabeled rows a stable `study_<row>` label.
pub(crate) fn fill_study_id(record: &mut StudyRecord, row: usize) {
    if record.study_id.trim().is_empty() {
        record.study_id = format!("study_{}", row);
    } else {
        record.study_id = record.study_id.trim().to_string();
    }
}
