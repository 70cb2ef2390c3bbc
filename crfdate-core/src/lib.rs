//! Logic lõi hoàn thiện ngày khuyết (partial date) trên phiếu CRF.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mã tháng hai chữ số và dạng viết tắt tương ứng, dùng chung cho cả hai bộ giải.
const MONTH_ABBREVIATIONS: [(&str, &str); 12] = [
    ("01", "JAN"),
    ("02", "FEB"),
    ("03", "MAR"),
    ("04", "APR"),
    ("05", "MAY"),
    ("06", "JUN"),
    ("07", "JUL"),
    ("08", "AUG"),
    ("09", "SEP"),
    ("10", "OCT"),
    ("11", "NOV"),
    ("12", "DEC"),
];

const UNKNOWN_MARKER: &str = "UN";
const START_DAY: &str = "01";
/// Ngày tạm, hợp lệ với mọi tháng.
const END_DAY_PLACEHOLDER: &str = "28";
/// Chỉ giá trị thô đúng bằng chuỗi này mới kích hoạt hiệu chỉnh ngày cuối tháng.
const RAW_UNKNOWN_DAY: &str = "UNK";
const COMPOSITE_FORMAT: &str = "%Y-%b-%d";

/// Tra dạng viết tắt ba chữ cái của mã tháng "01".."12".
pub fn month_abbreviation(code: &str) -> Option<&'static str> {
    MONTH_ABBREVIATIONS
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, abbreviation)| *abbreviation)
}

/// Quy tắc điền giá trị cho các trường chưa biết.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImputationRule {
    /// Ngày bắt đầu: lấy ngày sớm nhất có thể.
    #[serde(alias = "start")]
    Earliest,
    /// Ngày kết thúc: lấy ngày muộn nhất có thể.
    #[serde(alias = "end")]
    Latest,
}

impl ImputationRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

impl fmt::Display for ImputationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImputationRule {
    type Err = CompletionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "start" | "earliest" => Ok(Self::Earliest),
            "end" | "latest" => Ok(Self::Latest),
            other => Err(CompletionError::Config(format!(
                "Quy tắc điền không hợp lệ: {other}"
            ))),
        }
    }
}

/// Lý do một ngày khuyết không thể giải thành ngày lịch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum Invalidity {
    #[error("năm chứa ký tự không phải chữ số")]
    InvalidYear,
    #[error("không đọc được chuỗi ngày ghép")]
    UnparseableComposite,
    #[error("thiếu trường ngày/tháng/năm")]
    MissingField,
}

/// Kết quả giải một ngày khuyết.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolvedDate {
    Resolved { date: NaiveDate },
    Invalid { reason: Invalidity },
}

impl ResolvedDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Resolved { date } => Some(*date),
            Self::Invalid { .. } => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    pub fn invalidity(&self) -> Option<Invalidity> {
        match self {
            Self::Resolved { .. } => None,
            Self::Invalid { reason } => Some(*reason),
        }
    }

    /// Dạng ISO 8601 `YYYY-MM-DD`, `None` nếu không hợp lệ.
    pub fn to_iso_string(&self) -> Option<String> {
        self.date().map(|date| date.format("%Y-%m-%d").to_string())
    }
}

impl From<Invalidity> for ResolvedDate {
    fn from(reason: Invalidity) -> Self {
        Self::Invalid { reason }
    }
}

/// Bộ ba ngày/tháng/năm thô lấy từ phiếu CRF.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PartialDate {
    pub day: String,
    pub month: String,
    pub year: String,
}

impl PartialDate {
    pub fn new(day: impl Into<String>, month: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            month: month.into(),
            year: year.into(),
        }
    }

    pub fn resolve(&self, rule: ImputationRule) -> ResolvedDate {
        match rule {
            ImputationRule::Earliest => self.resolve_start(),
            ImputationRule::Latest => self.resolve_end(),
        }
    }

    pub fn resolve_start(&self) -> ResolvedDate {
        resolve_start_date(&self.day, &self.month, &self.year)
    }

    pub fn resolve_end(&self) -> ResolvedDate {
        resolve_end_date(&self.day, &self.month, &self.year)
    }
}

/// Giải ngày bắt đầu: ngày chưa biết thành "01", tháng chưa biết thành tháng 1.
pub fn resolve_start_date(day: &str, month: &str, year: &str) -> ResolvedDate {
    let year = match normalize_year(year) {
        Ok(year) => year,
        Err(reason) => return reason.into(),
    };
    let month = normalize_month(month, "JAN");
    let day = normalize_day(day, START_DAY);
    parse_composite(&year, &month, &day)
}

/// Giải ngày kết thúc: tháng chưa biết thành tháng 12, ngày chưa biết thành ngày cuối tháng.
///
/// Ngày chưa biết được thay tạm bằng "28". Chỉ khi ngày thô đúng bằng `UNK`
/// (phân biệt hoa thường) mới chuyển sang ngày cuối tháng; `UN` giữ nguyên 28.
pub fn resolve_end_date(day: &str, month: &str, year: &str) -> ResolvedDate {
    let normalized_year = match normalize_year(year) {
        Ok(year) => year,
        Err(reason) => return reason.into(),
    };
    let normalized_month = normalize_month(month, "DEC");
    let normalized_day = normalize_day(day, END_DAY_PLACEHOLDER);

    match parse_composite(&normalized_year, &normalized_month, &normalized_day) {
        ResolvedDate::Resolved { date } if day == RAW_UNKNOWN_DAY => ResolvedDate::Resolved {
            date: last_day_of_month(date),
        },
        other => other,
    }
}

/// Ngày cuối cùng của tháng chứa `date`: mùng 1 tháng sau trừ đi một ngày.
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    first
        .checked_add_months(Months::new(1))
        .and_then(|next_month| next_month.pred_opt())
        // Chỉ tràn ở tháng 12 của năm lớn nhất chrono hỗ trợ.
        .or_else(|| NaiveDate::from_ymd_opt(date.year(), 12, 31))
        .unwrap_or(date)
}

fn normalize_year(year: &str) -> Result<String, Invalidity> {
    let year = year.to_uppercase();
    if year.chars().any(|c| !c.is_ascii_digit()) {
        debug!(year = %year, "năm không phải số, bỏ qua ngày");
        return Err(Invalidity::InvalidYear);
    }
    Ok(year)
}

fn normalize_month(month: &str, unknown: &'static str) -> String {
    let month = month.to_uppercase();
    if matches!(month.as_str(), "UNK" | UNKNOWN_MARKER) {
        return unknown.to_string();
    }
    match month_abbreviation(&month) {
        Some(abbreviation) => abbreviation.to_string(),
        None => month,
    }
}

fn normalize_day(day: &str, substitute: &'static str) -> String {
    let day = day.to_uppercase();
    if day.contains(UNKNOWN_MARKER) {
        substitute.to_string()
    } else {
        day
    }
}

fn parse_composite(year: &str, month: &str, day: &str) -> ResolvedDate {
    let composite = format!("{year}-{month}-{day}");
    match NaiveDate::parse_from_str(&composite, COMPOSITE_FORMAT) {
        Ok(date) => ResolvedDate::Resolved { date },
        Err(err) => {
            debug!(composite = %composite, error = %err, "không đọc được ngày ghép");
            Invalidity::UnparseableComposite.into()
        }
    }
}

/// Nhóm trường ngày cần hoàn thiện trong một bản ghi.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateFieldSpec {
    /// Tiền tố tên trường, ví dụ `AESTDAT`.
    pub name: String,
    pub rule: ImputationRule,
}

impl DateFieldSpec {
    pub fn new(name: impl Into<String>, rule: ImputationRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }
}

/// Cấu hình cách bản ghi CRF đặt tên các phần của ngày.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub day_suffix: String,
    pub month_suffix: String,
    pub year_suffix: String,
    /// Trường định danh bản ghi (mặc định `USUBJID`).
    pub id_field: Option<String>,
    pub fields: Vec<DateFieldSpec>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            day_suffix: "_DD".to_string(),
            month_suffix: "_MM".to_string(),
            year_suffix: "_YY".to_string(),
            id_field: Some("USUBJID".to_string()),
            fields: vec![
                DateFieldSpec::new("AESTDAT", ImputationRule::Earliest),
                DateFieldSpec::new("AEENDAT", ImputationRule::Latest),
            ],
        }
    }
}

impl CompletionConfig {
    /// Kiểm tra hậu tố và tên trường trước khi xử lý.
    pub fn validate(&self) -> Result<(), CompletionError> {
        let suffixes = [&self.day_suffix, &self.month_suffix, &self.year_suffix];
        if suffixes.iter().any(|suffix| suffix.is_empty()) {
            return Err(CompletionError::Config(
                "Hậu tố ngày/tháng/năm không được rỗng".to_string(),
            ));
        }
        if self.day_suffix == self.month_suffix
            || self.day_suffix == self.year_suffix
            || self.month_suffix == self.year_suffix
        {
            return Err(CompletionError::Config(
                "Hậu tố ngày/tháng/năm phải khác nhau".to_string(),
            ));
        }
        if self.fields.iter().any(|field| field.name.trim().is_empty()) {
            return Err(CompletionError::Config(
                "Tên trường ngày không được rỗng".to_string(),
            ));
        }
        Ok(())
    }

    /// Tên ba khóa ngày, tháng, năm của một nhóm trường.
    pub fn part_keys(&self, field: &str) -> [String; 3] {
        [
            format!("{field}{}", self.day_suffix),
            format!("{field}{}", self.month_suffix),
            format!("{field}{}", self.year_suffix),
        ]
    }
}

/// Một ngày đã được hoàn thiện trong bản ghi.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedDate {
    pub field: String,
    pub rule: ImputationRule,
    pub raw: Option<PartialDate>,
    pub result: ResolvedDate,
    pub iso: Option<String>,
}

impl CompletedDate {
    /// `raw` rỗng nghĩa là thiếu ít nhất một trường.
    pub fn new(field: impl Into<String>, rule: ImputationRule, raw: Option<PartialDate>) -> Self {
        let result = match &raw {
            Some(partial) => partial.resolve(rule),
            None => Invalidity::MissingField.into(),
        };
        Self {
            field: field.into(),
            rule,
            raw,
            iso: result.to_iso_string(),
            result,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedRecord {
    pub index: usize,
    pub id: Option<String>,
    pub dates: Vec<CompletedDate>,
}

/// Kết quả tổng hợp cho cả lô bản ghi.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionReport {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<CompletedRecord>,
    pub resolved_count: usize,
    pub invalid_count: usize,
}

impl CompletionReport {
    pub fn new(records: Vec<CompletedRecord>) -> Self {
        let (invalid_count, resolved_count) = records
            .iter()
            .flat_map(|record| &record.dates)
            .fold((0, 0), |(invalid, resolved), date| {
                if date.result.is_invalid() {
                    (invalid + 1, resolved)
                } else {
                    (invalid, resolved + 1)
                }
            });
        Self {
            generated_at: Utc::now(),
            records,
            resolved_count,
            invalid_count,
        }
    }

    pub fn invalid_dates(&self) -> impl Iterator<Item = (&CompletedRecord, &CompletedDate)> {
        self.records.iter().flat_map(|record| {
            record
                .dates
                .iter()
                .filter(|date| date.result.is_invalid())
                .map(move |date| (record, date))
        })
    }
}

/// Lỗi vận hành khi xử lý lô bản ghi (ngày không hợp lệ không phải lỗi).
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Dữ liệu đầu vào thiếu thông tin tối thiểu")]
    MissingData,
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
    #[error("Cấu hình không hợp lệ: {0}")]
    Config(String),
}
