//! CRF JSON records to `CompletionReport` converter.

use crfdate_core::{
    CompletedDate, CompletedRecord, CompletionConfig, CompletionError, CompletionReport,
    DateFieldSpec, PartialDate,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Complete partial dates from a JSON string.
pub fn complete_records_str(
    records_json: &str,
    config: &CompletionConfig,
) -> Result<CompletionReport, CompletionError> {
    let value: Value = serde_json::from_str(records_json)
        .map_err(|err| CompletionError::Parse(err.to_string()))?;
    complete_records_value(&value, config)
}

/// Complete partial dates from a `serde_json::Value`.
///
/// Accepts either a bare array of records or an object wrapping them under
/// `records`.
pub fn complete_records_value(
    input: &Value,
    config: &CompletionConfig,
) -> Result<CompletionReport, CompletionError> {
    config.validate()?;

    let entries = match input {
        Value::Array(entries) => entries,
        Value::Object(wrapper) => wrapper
            .get("records")
            .and_then(Value::as_array)
            .ok_or(CompletionError::MissingData)?,
        other => {
            return Err(CompletionError::Parse(format!(
                "Expected an array of records, received {}",
                json_kind(other)
            )))
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Some(record) = entry.as_object() else {
            warn!(index, kind = json_kind(entry), "skipping non-object record");
            continue;
        };
        records.push(complete_record(index, record, config));
    }

    let report = CompletionReport::new(records);
    debug!(
        resolved = report.resolved_count,
        invalid = report.invalid_count,
        "completed record batch"
    );
    Ok(report)
}

fn complete_record(
    index: usize,
    record: &Map<String, Value>,
    config: &CompletionConfig,
) -> CompletedRecord {
    let id = config
        .id_field
        .as_deref()
        .and_then(|field| record.get(field))
        .and_then(field_text);

    let dates = config
        .fields
        .iter()
        .map(|spec| complete_field(record, spec, config))
        .collect();

    CompletedRecord { index, id, dates }
}

fn complete_field(
    record: &Map<String, Value>,
    spec: &DateFieldSpec,
    config: &CompletionConfig,
) -> CompletedDate {
    let [day_key, month_key, year_key] = config.part_keys(&spec.name);
    let raw = match (
        record.get(&day_key).and_then(field_text),
        record.get(&month_key).and_then(field_text),
        record.get(&year_key).and_then(field_text),
    ) {
        (Some(day), Some(month), Some(year)) => Some(PartialDate::new(day, month, year)),
        _ => {
            debug!(field = %spec.name, "date parts missing from record");
            None
        }
    };

    CompletedDate::new(spec.name.clone(), spec.rule, raw)
}

/// Strings are taken verbatim, numbers as their decimal text.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
