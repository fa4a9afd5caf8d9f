//! Value-shape type inference.
//!
//! Looks only at cell values, never at the column name. Unparsable values
//! simply fail the stricter shapes and end up as text.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use super::dictionary::DataType;
use super::normalize;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d{1,3}(?:[., ]\d{3})+|\d+)(?:[.,]\d+)?$").expect("number pattern")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z][0-9A-Za-z._-]*$").expect("identifier pattern"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Infer the data type of a column from its sampled values.
///
/// Blank values are skipped; a column with no non-blank value is text.
pub fn infer_data_type(values: &[String]) -> DataType {
    let present: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();

    if present.is_empty() {
        return DataType::Text;
    }

    if present.iter().all(|v| is_number(v)) {
        DataType::Number
    } else if present.iter().all(|v| is_date(v)) {
        DataType::Date
    } else if present.iter().all(|v| is_boolean(v)) {
        DataType::Boolean
    } else if present.iter().all(|v| is_identifier(v)) {
        DataType::Identifier
    } else {
        DataType::Text
    }
}

pub fn is_number(value: &str) -> bool {
    NUMBER.is_match(value)
}

pub fn is_date(value: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|f| NaiveDate::parse_from_str(value, f).is_ok())
        || DATETIME_FORMATS
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(value, f).is_ok())
}

pub fn is_boolean(value: &str) -> bool {
    matches!(
        normalize::fold(value).as_str(),
        "true" | "false" | "yes" | "no" | "si" | "0" | "1"
    )
}

/// Compact code with at least one letter and one digit, e.g. `CLI-0042`.
pub fn is_identifier(value: &str) -> bool {
    IDENTIFIER.is_match(value)
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| c.is_ascii_alphabetic())
}
