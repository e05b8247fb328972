//! Coercion helpers for loosely typed input (spreadsheet cells, free text).
//!
//! None of these functions fail: unparseable input yields `None`, or `-1`
//! for [`to_int`].

use crate::types::Value;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, TimeZone};
use std::fmt::Display;

/// Server format for date fields.
pub const SERVER_DATE_FORMAT: &str = "%Y-%m-%d";

/// Server format for datetime fields.
pub const SERVER_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Day zero of spreadsheet serial dates.
pub const SPREADSHEET_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1900, 1, 1) {
    Some(date) => date,
    None => panic!("invalid spreadsheet epoch"),
};

/// Textual representation of any displayable value.
pub fn to_string<T: Display + ?Sized>(value: &T) -> String {
    value.to_string()
}

/// `"<type> -- <message>"` for an error value.
pub fn error_to_string<E: std::error::Error>(err: &E) -> String {
    format!("{} -- {}", std::any::type_name::<E>(), err)
}

/// One way of reading a date out of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStrategy {
    /// Day count relative to [`SPREADSHEET_EPOCH`].
    SpreadsheetSerial,
    /// `DD/MM/YYYY`
    DayMonthYear,
    /// `YYYY-MM-DD 00:00:00`
    MidnightTimestamp,
}

/// Order in which [`to_date`] tries the strategies.
pub const DATE_STRATEGIES: [DateStrategy; 3] = [
    DateStrategy::SpreadsheetSerial,
    DateStrategy::DayMonthYear,
    DateStrategy::MidnightTimestamp,
];

impl DateStrategy {
    /// Attempt this strategy alone.
    pub fn parse(&self, value: &str) -> Option<NaiveDate> {
        match self {
            DateStrategy::SpreadsheetSerial => {
                let serial = to_float(value)?;
                if !serial.is_finite() {
                    return None;
                }
                let days = serial.floor();
                if days.abs() > u32::MAX as f64 {
                    return None;
                }
                if days >= 0.0 {
                    SPREADSHEET_EPOCH.checked_add_days(Days::new(days as u64))
                } else {
                    SPREADSHEET_EPOCH.checked_sub_days(Days::new((-days) as u64))
                }
            }
            DateStrategy::DayMonthYear => NaiveDate::parse_from_str(value.trim(), "%d/%m/%Y").ok(),
            // the time part is matched literally, not parsed
            DateStrategy::MidnightTimestamp => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d 00:00:00").ok(),
        }
    }
}

/// Read a date, trying each of [`DATE_STRATEGIES`] in order.
pub fn to_date(value: &str) -> Option<NaiveDate> {
    DATE_STRATEGIES.iter().find_map(|strategy| strategy.parse(value))
}

/// Values that can be rendered in the exact text form the server expects.
pub trait ServerString {
    fn to_server_string(&self) -> String;
}

impl ServerString for NaiveDate {
    fn to_server_string(&self) -> String {
        self.format(SERVER_DATE_FORMAT).to_string()
    }
}

impl ServerString for NaiveDateTime {
    fn to_server_string(&self) -> String {
        self.format(SERVER_DATETIME_FORMAT).to_string()
    }
}

impl<Tz: TimeZone> ServerString for DateTime<Tz>
where
    Tz::Offset: Display,
{
    fn to_server_string(&self) -> String {
        self.naive_utc().to_server_string()
    }
}

impl ServerString for str {
    fn to_server_string(&self) -> String {
        self.to_string()
    }
}

impl ServerString for String {
    fn to_server_string(&self) -> String {
        self.clone()
    }
}

impl ServerString for Value {
    fn to_server_string(&self) -> String {
        match self {
            Value::DateTime(dt) => dt.to_server_string(),
            Value::String(s) => s.clone(),
            other => to_string(other),
        }
    }
}

/// Render a date or datetime in the server format, anything else as text.
pub fn date_to_server_string<T: ServerString + ?Sized>(value: &T) -> String {
    value.to_server_string()
}

/// Parse a float; `None` when the text is not a number.
pub fn to_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

/// Parse an integer. Missing, empty or unparseable input is `-1`.
///
/// Decimal text is truncated toward zero (`"12.7"` is `12`).
pub fn to_int(value: Option<&str>) -> i64 {
    let Some(text) = value else {
        return -1;
    };
    let text = text.trim();
    if text.is_empty() {
        return -1;
    }
    if let Ok(i) = text.parse::<i64>() {
        return i;
    }
    match to_float(text) {
        Some(f) if f.is_finite() && f.trunc() >= i64::MIN as f64 && f.trunc() < i64::MAX as f64 => f.trunc() as i64,
        _ => -1,
    }
}
