//! Bridge WASM <-> JavaScript trung lập framework.

use crfdate_core::{CompletionConfig, CompletionError, DateFieldSpec, ImputationRule, PartialDate};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Deserialize, Default)]
struct JsCompletionConfig {
    #[serde(default)]
    day_suffix: Option<String>,
    #[serde(default)]
    month_suffix: Option<String>,
    #[serde(default)]
    year_suffix: Option<String>,
    #[serde(default)]
    id_field: Option<String>,
    #[serde(default)]
    fields: Option<Vec<DateFieldSpec>>,
}

impl From<JsCompletionConfig> for CompletionConfig {
    fn from(cfg: JsCompletionConfig) -> Self {
        let mut base = CompletionConfig::default();
        if let Some(suffix) = cfg.day_suffix {
            base.day_suffix = suffix;
        }
        if let Some(suffix) = cfg.month_suffix {
            base.month_suffix = suffix;
        }
        if let Some(suffix) = cfg.year_suffix {
            base.year_suffix = suffix;
        }
        if let Some(field) = cfg.id_field {
            base.id_field = Some(field);
        }
        if let Some(fields) = cfg.fields {
            base.fields = fields;
        }
        base
    }
}

#[wasm_bindgen]
pub fn complete_records(input: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let records = from_value::<serde_json::Value>(input)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON bản ghi: {err}")))?;

    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsCompletionConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            CompletionConfig::from(cfg)
        }
        None => CompletionConfig::default(),
    };

    let report = crfdate_records::complete_records_value(&records, &cfg)
        .map_err(|err| JsValue::from_str(&format_completion_error(err)))?;

    to_value(&report).map_err(|err| JsValue::from_str(&format!("Không serialize báo cáo: {err}")))
}

/// Trả về ngày ISO, `undefined` nếu ngày không hợp lệ.
#[wasm_bindgen]
pub fn resolve_partial_date(
    day: &str,
    month: &str,
    year: &str,
    rule: &str,
) -> Result<Option<String>, JsValue> {
    let rule: ImputationRule = rule
        .parse()
        .map_err(|err| JsValue::from_str(&format_completion_error(err)))?;
    Ok(PartialDate::new(day, month, year).resolve(rule).to_iso_string())
}

fn format_completion_error(err: CompletionError) -> String {
    format!("Completion error: {err}")
}
