//! Date normalization to the form's `DD/MM/YYYY` display format.

use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use std::fmt;

/// Substituted whenever a day value cannot be parsed.
pub const FALLBACK_DATE: &str = "01/01/2025";

const DISPLAY_FORMAT: &str = "%d/%m/%Y";

/// A `Day` cell as it arrives from an export: text from CSV, or a typed date from a workbook.
#[derive(Clone, Debug, PartialEq)]
pub enum DayValue {
    Text(String),
    DateTime(NaiveDateTime),
}

impl fmt::Display for DayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayValue::Text(s) => write!(f, "{}", s),
            DayValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Formats a day value as `DD/MM/YYYY`. Text is cut at the first space (drops time of day)
/// and parsed as `YYYY-MM-DD`; anything else yields [`FALLBACK_DATE`] and a warning.
pub fn normalize_date(day: &DayValue) -> String {
    match day {
        DayValue::DateTime(dt) => dt.format(DISPLAY_FORMAT).to_string(),
        DayValue::Text(s) => {
            let s = s.trim();
            let date_part = s.split(' ').next().unwrap_or(s);
            match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
                Ok(d) => d.format(DISPLAY_FORMAT).to_string(),
                Err(_) => {
                    warn!("could not convert date {:?}, using fallback {}", s, FALLBACK_DATE);
                    FALLBACK_DATE.to_string()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> DayValue {
        DayValue::Text(s.to_string())
    }

    #[test]
    fn test_normalize_date_plain() {
        assert_eq!(normalize_date(&text("2025-02-20")), "20/02/2025");
    }

    #[test]
    fn test_normalize_date_strips_time() {
        assert_eq!(normalize_date(&text("2025-02-20 00:00:00")), "20/02/2025");
        assert_eq!(normalize_date(&text("2024-12-31 17:45")), "31/12/2024");
    }

    #[test]
    fn test_normalize_date_fallback() {
        assert_eq!(normalize_date(&text("not-a-date")), FALLBACK_DATE);
        assert_eq!(normalize_date(&text("")), FALLBACK_DATE);
        assert_eq!(normalize_date(&text("20.02.2025")), FALLBACK_DATE);
        assert_eq!(normalize_date(&text("2025-02-30")), FALLBACK_DATE);
    }

    #[test]
    fn test_normalize_date_structured() {
        let dt = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        assert_eq!(normalize_date(&DayValue::DateTime(dt)), "07/03/2025");
    }

    #[test]
    fn test_day_value_display() {
        let dt = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(DayValue::DateTime(dt).to_string(), "2025-03-07 00:00:00");
        assert_eq!(text("x").to_string(), "x");
    }
}
