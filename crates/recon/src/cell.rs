use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Typed value of a single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
    Bool(bool),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

/// A cell value plus the display format it was read with.
///
/// `format` is an Excel number-format string (`yyyy-mm-dd`, `0.00`, ...).
/// It never takes part in equality checks during reconciliation; the writer
/// uses it to render the value the way the source document did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

pub(crate) static EMPTY_CELL: Cell = Cell {
    value: CellValue::Empty,
    format: None,
};

impl Cell {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            return Self::empty();
        }
        Self { value: CellValue::Text(s), format: None }
    }

    pub fn number(n: f64) -> Self {
        Self { value: CellValue::Number(n), format: None }
    }

    pub fn date(d: NaiveDate) -> Self {
        Self {
            value: CellValue::Date(d.and_time(NaiveTime::MIN)),
            format: Some(DATE_FORMAT.to_string()),
        }
    }

    pub fn datetime(dt: NaiveDateTime) -> Self {
        let format = if dt.time() == NaiveTime::MIN { DATE_FORMAT } else { DATETIME_FORMAT };
        Self { value: CellValue::Date(dt), format: Some(format.to_string()) }
    }

    pub fn boolean(b: bool) -> Self {
        Self { value: CellValue::Bool(b), format: None }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Empty cells and whitespace-only text both count as empty.
    pub fn is_empty(&self) -> bool {
        match &self.value {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Canonical comparison form shared by key extraction and field comparison.
    pub fn canonical(&self) -> String {
        match &self.value {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => {
                let norm = normalize_text(s);
                match parse_plain_number(&norm) {
                    Some(n) => canonical_number(n),
                    None => norm,
                }
            }
            CellValue::Number(n) => canonical_number(*n),
            CellValue::Date(dt) => canonical_datetime(dt),
            CellValue::Bool(b) => b.to_string(),
        }
    }

    /// Value equality after normalization. Format hints are ignored.
    pub fn same_value(&self, other: &Cell) -> bool {
        self.canonical() == other.canonical()
    }

    /// Text as it should appear in a plain-text export.
    pub fn display(&self) -> String {
        match &self.value {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => canonical_number(*n),
            CellValue::Date(dt) => canonical_datetime(dt),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
        }
    }

    /// Interpret the cell as a point in time.
    ///
    /// Date cells are taken as-is, numbers as Excel serials, and text is tried
    /// against the formats registries commonly export.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match &self.value {
            CellValue::Date(dt) => Some(*dt),
            CellValue::Number(n) => excel_serial_to_datetime(*n),
            CellValue::Text(s) => parse_datetime_text(s.trim()),
            CellValue::Empty | CellValue::Bool(_) => None,
        }
    }
}

pub const DATE_FORMAT: &str = "yyyy-mm-dd";
pub const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Trim, collapse internal whitespace, case-fold, drop control characters.
///
/// Dropping control characters keeps U+001F free for the composite key
/// separator.
pub fn normalize_text(s: &str) -> String {
    let cleaned: String = s.chars().filter(|c| !c.is_control() || c.is_whitespace()).collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Integers print without a fraction, everything else in shortest round-trip form.
pub fn canonical_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn canonical_datetime(dt: &NaiveDateTime) -> String {
    if dt.time() == NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Parse a plain decimal number (`-12`, `3.50`, `+0.5`).
///
/// Strings with a significant leading zero (`007`, `0401234567`) are not
/// numbers: they are identifiers or phone numbers and must keep their digits.
pub fn parse_plain_number(s: &str) -> Option<f64> {
    let body = s.strip_prefix('-').or_else(|| s.strip_prefix('+')).unwrap_or(s);
    if body.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if int_part.len() > 1 && int_part.starts_with('0') {
        return None;
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    s.parse().ok()
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

const DATETIME_TEXT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_TEXT_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y"];

fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    // Fractional seconds ("2024-05-01T08:30:00.123") are dropped.
    let s = match s.split_once('.') {
        Some((head, tail)) if head.len() >= 19 && tail.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => s,
    };
    for fmt in DATETIME_TEXT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_TEXT_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Parse an ISO `YYYY-MM-DD` date, the only textual date form the readers
/// promote to a date cell.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn excel_epoch() -> NaiveDateTime {
    // 1900 date system, including Excel's phantom 1900-02-29.
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

/// Largest serial Excel accepts (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !(1.0..=MAX_EXCEL_SERIAL + 1.0).contains(&serial) {
        return None;
    }
    let days = serial.floor() as i64;
    let seconds = ((serial - serial.floor()) * 86_400.0).round() as i64;
    Some(excel_epoch() + Duration::days(days) + Duration::seconds(seconds))
}

pub fn datetime_to_excel_serial(dt: &NaiveDateTime) -> f64 {
    let delta = *dt - excel_epoch();
    let days = delta.num_days() as f64;
    let secs = dt.num_seconds_from_midnight() as f64;
    days + secs / 86_400.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_folds() {
        assert_eq!(normalize_text("  Anna   VIRTANEN \t"), "anna virtanen");
        assert_eq!(normalize_text("Äiti"), "äiti");
        assert_eq!(normalize_text("a\u{1F}b"), "ab");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn numbers_canonicalize_across_representations() {
        assert_eq!(Cell::number(5.0).canonical(), "5");
        assert_eq!(Cell::text("5.0").canonical(), "5");
        assert_eq!(Cell::text(" 5 ").canonical(), "5");
        assert_eq!(Cell::number(2.5).canonical(), "2.5");
        assert!(Cell::number(5.0).same_value(&Cell::text("5")));
    }

    #[test]
    fn leading_zero_text_stays_text() {
        assert_eq!(parse_plain_number("0401234567"), None);
        assert_eq!(parse_plain_number("007"), None);
        assert_eq!(parse_plain_number("0"), Some(0.0));
        assert_eq!(parse_plain_number("0.25"), Some(0.25));
        assert_eq!(Cell::text("0401234567").canonical(), "0401234567");
    }

    #[test]
    fn plain_number_rejects_noise() {
        assert_eq!(parse_plain_number("1e5"), None);
        assert_eq!(parse_plain_number("12abc"), None);
        assert_eq!(parse_plain_number("5."), None);
        assert_eq!(parse_plain_number(".5"), None);
        assert_eq!(parse_plain_number("-"), None);
        assert_eq!(parse_plain_number("-3.25"), Some(-3.25));
    }

    #[test]
    fn date_cell_equals_iso_text() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(Cell::date(d).same_value(&Cell::text("2024-03-01")));
        assert_eq!(Cell::date(d).format.as_deref(), Some(DATE_FORMAT));
    }

    #[test]
    fn text_case_and_spacing_do_not_differ() {
        assert!(Cell::text("Bob  Smith").same_value(&Cell::text("bob smith")));
        assert!(!Cell::text("Bob").same_value(&Cell::text("Rob")));
    }

    #[test]
    fn format_hint_ignored_for_equality() {
        let a = Cell::number(3.0).with_format("0.00");
        let b = Cell::number(3.0);
        assert!(a.same_value(&b));
    }

    #[test]
    fn whitespace_text_is_empty() {
        assert!(Cell::text("   ").is_empty());
        assert!(Cell::empty().is_empty());
        assert!(!Cell::boolean(false).is_empty());
        assert_eq!(Cell::text(""), Cell::empty());
    }

    #[test]
    fn as_datetime_parses_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(Cell::text("2024-05-01 08:30:00").as_datetime(), Some(expected));
        assert_eq!(Cell::text("2024-05-01T08:30").as_datetime(), Some(expected));
        assert_eq!(Cell::text("1.5.2024 8:30").as_datetime(), Some(expected));
        assert_eq!(Cell::text("5/1/2024 08:30:00").as_datetime(), Some(expected));
        assert_eq!(Cell::text("2024-05-01T08:30:00.250").as_datetime(), Some(expected));
        assert_eq!(Cell::text("not a date").as_datetime(), None);
        assert_eq!(Cell::empty().as_datetime(), None);
    }

    #[test]
    fn excel_serial_roundtrip() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let serial = datetime_to_excel_serial(&dt);
        assert_eq!(serial, 45306.5);
        assert_eq!(excel_serial_to_datetime(serial), Some(dt));
        assert_eq!(excel_serial_to_datetime(0.0), None);
    }

    #[test]
    fn display_renders_typed_values() {
        assert_eq!(Cell::boolean(true).display(), "TRUE");
        assert_eq!(Cell::number(1234.0).display(), "1234");
        assert_eq!(Cell::text("Keep Case").display(), "Keep Case");
    }
}
