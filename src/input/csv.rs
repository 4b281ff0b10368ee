//! CSV parsing for study tables.

use super::{fill_study_id, InputError};
use crate::models::{EffectType, StudyRecord};
use std::collections::HashMap;

/// Parse a CSV study table with a header row.
///
/// # Example file content
/// ```csv
/// study_id,effect_size,effect_se
/// Smith 2019,0.42,0.11
/// Jones 2021,0.18,0.09
/// ```
///
/// Quoted fields with embedded commas are not supported.
pub fn parse_csv(content: &str, effect_type: EffectType) -> Result<Vec<StudyRecord>, InputError> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let (_, header) = lines.next().ok_or(InputError::Parse {
        line: 1,
        message: "empty input, expected a header row".to_string(),
    })?;

    let columns: HashMap<String, usize> = header
        .split(',')
        .enumerate()
        .map(|(i, name)| (normalize(name), i))
        .collect();

    for required in effect_type.required_columns() {
        if !columns.contains_key(*required) {
            return Err(InputError::MissingColumn {
                column: required.to_string(),
                effect_type,
            });
        }
    }

    let mut records = Vec::new();
    for (row, (line_num, line)) in lines.enumerate() {
        let cells: Vec<&str> = line.split(',').map(|c| c.trim()).collect();
        if cells.len() > columns.len() {
            return Err(InputError::Parse {
                line: line_num,
                message: format!(
                    "expected at most {} fields, found {}",
                    columns.len(),
                    cells.len()
                ),
            });
        }

        let mut record = StudyRecord::default();
        let cell = |name: &str| {
            columns
                .get(name)
                .and_then(|&i| cells.get(i))
                .copied()
                .filter(|c| !c.is_empty())
        };

        record.study_id = cell("study_id").unwrap_or_default().to_string();

        for name in StudyRecord::NUMERIC_COLUMNS {
            if let Some(raw) = cell(name) {
                match raw.parse::<f64>() {
                    Ok(value) => {
                        if let Some(slot) = record.numeric_slot_mut(name) {
                            *slot = Some(value);
                        }
                    }
                    Err(_) => record.malformed.push(name.to_string()),
                }
            }
        }

        fill_study_id(&mut record, row + 1);
        records.push(record);
    }

    Ok(records)
}

fn normalize(name: &str) -> String {
    name.trim().trim_matches('"').to_ascii_lowercase()
}
