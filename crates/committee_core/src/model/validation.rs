//! Boundary parsing and field validation.
//!
//! The routing layer hands over already-typed primitives, but dates and
//! employee id lists still arrive as text. Everything here fails before any
//! state is touched.

use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Caller-visible input error. Nothing has been mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after trimming.
    BlankField(&'static str),
    /// Required field was asked to be cleared by a partial update.
    RequiredField(&'static str),
    /// Date text is not `YYYY-MM-DD`.
    InvalidDate(String),
    /// Employee id list contains a non-integer entry.
    InvalidEmployeeId(String),
    /// Committee number cannot be used as a file-name component.
    InvalidCommitteeNo(String),
    /// Numeric field is out of range.
    OutOfRange { field: &'static str, value: i64 },
    /// `from` date is after `to` date.
    InvalidDateRange { from: NaiveDate, to: NaiveDate },
    /// Update call carries no field, no membership change and no file.
    EmptyUpdate,
    /// Anything else the boundary rejects.
    Invalid(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "field `{field}` must not be blank"),
            Self::RequiredField(field) => write!(f, "field `{field}` is required and cannot be cleared"),
            Self::InvalidDate(value) => {
                write!(f, "invalid date `{value}`; expected YYYY-MM-DD")
            }
            Self::InvalidEmployeeId(value) => write!(f, "invalid employee id `{value}`"),
            Self::InvalidCommitteeNo(value) => write!(f, "invalid committee number `{value}`"),
            Self::OutOfRange { field, value } => {
                write!(f, "field `{field}` out of range: {value}")
            }
            Self::InvalidDateRange { from, to } => {
                write!(f, "start date {from} cannot be after end date {to}")
            }
            Self::EmptyUpdate => write!(f, "no fields provided for update"),
            Self::Invalid(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ValidationError {}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(trimmed.to_string()))
}

/// Parses an employee id list.
///
/// Accepts a JSON array (`[1,2,3]`) or a comma-separated list (`1, 2,3`).
/// Blank input is an explicit empty list, not "unspecified".
pub fn parse_employee_ids(raw: &str) -> Result<Vec<i64>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let values: Vec<serde_json::Value> = serde_json::from_str(trimmed)
            .map_err(|_| ValidationError::InvalidEmployeeId(trimmed.to_string()))?;
        return values
            .into_iter()
            .map(|value| {
                value
                    .as_i64()
                    .ok_or_else(|| ValidationError::InvalidEmployeeId(value.to_string()))
            })
            .collect();
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| ValidationError::InvalidEmployeeId(part.to_string()))
        })
        .collect()
}

/// Trims a required text field, rejecting blank values.
pub fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(trimmed.to_string())
}

/// Normalizes a committee number.
///
/// The number becomes part of the attachment file name, so separators,
/// parent-directory segments and control characters are rejected.
pub fn normalize_committee_no(value: &str) -> Result<String, ValidationError> {
    let trimmed = require_text("committee_no", value)?;
    let unsafe_name = trimmed.contains(['/', '\\'])
        || trimmed.contains("..")
        || trimmed.chars().any(char::is_control);
    if unsafe_name {
        return Err(ValidationError::InvalidCommitteeNo(trimmed));
    }
    Ok(trimmed)
}

/// Empty optional text collapses to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
