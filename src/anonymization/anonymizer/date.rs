//! Date anonymizer

use super::{expect_str, EmptyValuePolicy, FieldAnonymizer};
use crate::anonymization::crypto::numerize_key;
use crate::domain::{ObscuraError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate};
use serde_json::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reversible date shift
///
/// Moves an ISO date (`YYYY-MM-DD`) or an RFC 3339 timestamp forward by a
/// key-derived number of days in `1..=max_days_shift`.
#[derive(Debug, Clone)]
pub struct DateFieldAnonymizer {
    empty: EmptyValuePolicy,
    max_days_shift: u32,
}

impl Default for DateFieldAnonymizer {
    fn default() -> Self {
        Self {
            empty: EmptyValuePolicy::default(),
            max_days_shift: 365,
        }
    }
}

impl DateFieldAnonymizer {
    /// Creates a date anonymizer shifting by up to a year
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest shift in days
    pub fn max_days_shift(mut self, days: u32) -> Self {
        self.max_days_shift = days.max(1);
        self
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }

    fn days(&self, key: &str) -> Duration {
        let days = numerize_key(key) % u64::from(self.max_days_shift) + 1;
        Duration::days(days as i64)
    }

    fn shift_date(&self, date: NaiveDate, shift: Duration) -> Result<NaiveDate> {
        date.checked_add_signed(shift)
            .filter(|shifted| (0..=9999).contains(&shifted.year()))
            .ok_or_else(|| ObscuraError::invalid_value(self.name(), "date out of range"))
    }

    fn apply(&self, value: &Value, shift: Duration) -> Result<Value> {
        let text = expect_str(value, self.name())?;
        let not_a_date = || {
            ObscuraError::invalid_value(
                self.name(),
                format!("'{text}' is neither an ISO date nor an RFC 3339 timestamp"),
            )
        };

        // Whole-day shifts leave the time of day and the offset untouched, so
        // only the leading date is rewritten and the rest is kept verbatim.
        let rest = if DateTime::parse_from_rfc3339(text).is_ok() {
            text.get(10..).ok_or_else(not_a_date)?
        } else {
            ""
        };
        let date_part = text.get(..10).ok_or_else(not_a_date)?;
        let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT)
            .ok()
            .filter(|date| date.format(DATE_FORMAT).to_string() == date_part)
            .ok_or_else(not_a_date)?;
        if rest.is_empty() && date_part.len() != text.len() {
            return Err(not_a_date());
        }

        let shifted = self.shift_date(date, shift)?;
        Ok(Value::String(format!("{}{rest}", shifted.format(DATE_FORMAT))))
    }
}

impl FieldAnonymizer for DateFieldAnonymizer {
    fn name(&self) -> &'static str {
        "date"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn encrypt(&self, value: &Value, key: &str) -> Result<Value> {
        self.apply(value, self.days(key))
    }

    fn decrypt(&self, value: &Value, key: &str) -> Result<Value> {
        self.apply(value, -self.days(key))
    }
}
