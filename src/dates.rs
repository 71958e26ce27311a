use crate::errors::AppError;
use chrono::{Local, NaiveDate};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical `YYYY-MM-DD` key used for every completion record.
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses a caller supplied date, accepting only the canonical zero-padded form.
pub fn parse_date_key(value: &str) -> Result<NaiveDate, AppError> {
    let value = value.trim();
    let date = NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| AppError::bad_request(format!("invalid date '{value}', expected YYYY-MM-DD")))?;

    // chrono accepts "2026-1-5", completion keys must not
    if date_key(date) != value {
        return Err(AppError::bad_request(format!(
            "invalid date '{value}', expected YYYY-MM-DD"
        )));
    }

    Ok(date)
}

/// Canonicalizes an optional date parameter, falling back to today.
pub fn resolve_date(value: Option<&str>) -> Result<NaiveDate, AppError> {
    match value {
        Some(raw) if !raw.trim().is_empty() => parse_date_key(raw),
        _ => Ok(today()),
    }
}
