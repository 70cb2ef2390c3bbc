use std::fs;

use crfdate_core::{CompletionConfig, CompletionError, DateFieldSpec, ImputationRule, Invalidity};
use crfdate_records::{complete_records_str, complete_records_value};
use serde_json::{json, Value};

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn adverse_event_records_match_golden() {
    let records = fs::read_to_string(fixture_path("adverse_event_records.json"))
        .expect("cannot read sample records");

    let report = complete_records_str(&records, &CompletionConfig::default())
        .expect("cannot build report");

    let mut actual = serde_json::to_value(report).expect("cannot serialize report");
    normalize_dynamic_fields(&mut actual);

    let expected = fs::read_to_string(fixture_path("adverse_event_report.json"))
        .expect("cannot read golden report");

    let mut expected_value: Value = serde_json::from_str(&expected).expect("invalid golden");
    normalize_dynamic_fields(&mut expected_value);

    assert_eq!(actual, expected_value);
}

#[test]
fn wrapped_records_are_accepted() {
    let input = json!({
        "records": [
            { "MHSTDAT_DD": "UN", "MHSTDAT_MM": "UN", "MHSTDAT_YY": "1998" }
        ]
    });
    let config = CompletionConfig {
        id_field: None,
        fields: vec![DateFieldSpec::new("MHSTDAT", ImputationRule::Earliest)],
        ..CompletionConfig::default()
    };

    let report = complete_records_value(&input, &config).expect("cannot build report");

    assert_eq!(report.resolved_count, 1);
    assert_eq!(report.records[0].id, None);
    assert_eq!(report.records[0].dates[0].iso.as_deref(), Some("1998-01-01"));
}

#[test]
fn missing_parts_are_reported_as_invalid() {
    let input = json!([{ "USUBJID": "S-1", "AEENDAT_DD": "UNK", "AEENDAT_YY": "2020", "AESTDAT_DD": null }]);

    let report = complete_records_value(&input, &CompletionConfig::default())
        .expect("cannot build report");

    assert_eq!(report.invalid_count, 2);
    assert_eq!(report.resolved_count, 0);
    let reasons: Vec<_> = report
        .invalid_dates()
        .map(|(record, date)| (record.id.clone(), date.result.invalidity()))
        .collect();
    assert_eq!(
        reasons,
        vec![
            (Some("S-1".to_string()), Some(Invalidity::MissingField)),
            (Some("S-1".to_string()), Some(Invalidity::MissingField)),
        ]
    );
}

#[test]
fn custom_suffixes_are_honoured() {
    let input = json!([{ "DSSTDATD": "UNK", "DSSTDATM": "12", "DSSTDATY": "2021" }]);
    let config = CompletionConfig {
        day_suffix: "D".to_string(),
        month_suffix: "M".to_string(),
        year_suffix: "Y".to_string(),
        id_field: None,
        fields: vec![DateFieldSpec::new("DSSTDAT", ImputationRule::Latest)],
    };

    let report = complete_records_value(&input, &config).expect("cannot build report");

    assert_eq!(report.records[0].dates[0].iso.as_deref(), Some("2021-12-31"));
}

#[test]
fn rejects_unexpected_shapes() {
    assert!(matches!(
        complete_records_str("{ not json", &CompletionConfig::default()),
        Err(CompletionError::Parse(_))
    ));
    assert!(matches!(
        complete_records_value(&json!("records"), &CompletionConfig::default()),
        Err(CompletionError::Parse(_))
    ));
    assert!(matches!(
        complete_records_value(&json!({ "rows": [] }), &CompletionConfig::default()),
        Err(CompletionError::MissingData)
    ));
}

#[test]
fn invalid_config_is_rejected_before_processing() {
    let config = CompletionConfig {
        fields: vec![DateFieldSpec::new(" ", ImputationRule::Earliest)],
        ..CompletionConfig::default()
    };
    assert!(matches!(
        complete_records_value(&json!([]), &config),
        Err(CompletionError::Config(_))
    ));
}

fn normalize_dynamic_fields(value: &mut Value) {
    if let Some(obj) = value.as_object_mut() {
        if obj.contains_key("generated_at") {
            obj.insert(
                "generated_at".to_string(),
                Value::String("__DYNAMIC_TIMESTAMP__".to_string()),
            );
        }
    }
}
