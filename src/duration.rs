//! Duration normalization: `H:MM:SS` strings to quarter-hour minutes and decimal hours.

use crate::error::{Error, Result};

/// Billing granularity in minutes.
pub const QUARTER_HOUR: u32 = 15;

/// Parses `H:MM:SS` (hours may exceed 24) into whole minutes; leftover seconds are truncated.
pub fn parse_minutes(s: &str) -> Result<u32> {
    let fields: Vec<&str> = s.trim().split(':').collect();
    let [h, m, sec] = fields.as_slice() else {
        return Err(Error::Format(s.to_string()));
    };
    let parse = |f: &str| f.trim().parse::<u32>().map_err(|_| Error::Format(s.to_string()));
    let (h, m, sec) = (parse(h)?, parse(m)?, parse(sec)?);
    h.checked_mul(60)
        .and_then(|hm| hm.checked_add(m))
        .and_then(|t| t.checked_add(sec / 60))
        .ok_or_else(|| Error::Format(s.to_string()))
}

/// Rounds up to the next multiple of 15; exact multiples (including 0) are unchanged.
pub fn round_to_quarter(minutes: u32) -> u32 {
    minutes.div_ceil(QUARTER_HOUR) * QUARTER_HOUR
}

/// Minutes to hours, rounded to two decimals (half away from zero).
///
/// Quarter-hour inputs always land on .00/.25/.50/.75, so no tie ever reaches the rounding step.
pub fn to_decimal_hours(minutes: u32) -> f64 {
    (minutes as f64 / 60.0 * 100.0).round() / 100.0
}

/// Renders hours for the form with at least one fractional digit (`2.0`, `1.5`, `0.25`).
pub fn format_hours(h: f64) -> String {
    if h.fract() == 0.0 {
        format!("{:.1}", h)
    } else {
        format!("{}", h)
    }
}

/// Full pipeline: `(rounded_minutes, decimal_hours)`.
pub fn normalize_duration(s: &str) -> Result<(u32, f64)> {
    let rounded = round_to_quarter(parse_minutes(s)?);
    Ok((rounded, to_decimal_hours(rounded)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_quarter_boundaries() {
        assert_eq!(round_to_quarter(0), 0);
        assert_eq!(round_to_quarter(14), 15);
        assert_eq!(round_to_quarter(15), 15);
        assert_eq!(round_to_quarter(16), 30);
        assert_eq!(round_to_quarter(1), 15);
    }

    #[test]
    fn test_round_to_quarter_never_rounds_down() {
        for m in 0..1000 {
            let r = round_to_quarter(m);
            assert!(r >= m);
            assert!(r - m < 15, "{} rounded to {}", m, r);
            assert_eq!(r % 15, 0);
        }
    }

    #[test]
    fn test_to_decimal_hours() {
        assert_eq!(to_decimal_hours(90), 1.5);
        assert_eq!(to_decimal_hours(15), 0.25);
        assert_eq!(to_decimal_hours(0), 0.0);
        assert_eq!(to_decimal_hours(510), 8.5);
        assert_eq!(to_decimal_hours(20), 0.33);
    }

    #[test]
    fn test_parse_minutes_truncates_seconds() {
        assert_eq!(parse_minutes("1:30:00").unwrap(), 90);
        assert_eq!(parse_minutes("0:14:59").unwrap(), 14);
        assert_eq!(parse_minutes("00:00:00").unwrap(), 0);
        assert_eq!(parse_minutes("26:00:00").unwrap(), 1560);
        assert_eq!(parse_minutes(" 0:01:120 ").unwrap(), 3);
    }

    #[test]
    fn test_parse_minutes_rejects_bad_shapes() {
        for bad in ["", "1:30", "1:30:00:00", "a:b:c", "1:-5:00", "1.5", "::"] {
            assert!(
                matches!(parse_minutes(bad), Err(Error::Format(_))),
                "expected FormatError for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_normalize_duration() {
        assert_eq!(normalize_duration("0:37:30").unwrap(), (45, 0.75));
        assert_eq!(normalize_duration("1:00:00").unwrap(), (60, 1.0));
        assert!(normalize_duration("soon").is_err());
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(2.0), "2.0");
        assert_eq!(format_hours(1.5), "1.5");
        assert_eq!(format_hours(0.25), "0.25");
        assert_eq!(format_hours(0.0), "0.0");
    }
}
