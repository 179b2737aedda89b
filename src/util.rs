// Utility helpers for cell parsing and display formatting.
//
// All the "dirty" CSV/spreadsheet value handling is centralized here so
// the rest of the code can assume clean, typed values.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

use crate::types::{DateCell, Fraction};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok()
}

/// Parse a rate cell into a `Fraction`.
///
/// The stored unit is a fraction of 1. A trailing `%` marks a cell that
/// already carries a whole percentage, so `"90%"` and `"0.9"` both parse
/// to the same fraction. Anything unparsable is `None`, which later
/// formats to an empty cell.
pub fn parse_fraction_safe(s: Option<&str>) -> Option<Fraction> {
    let raw = s?.trim();
    if let Some(stripped) = raw.strip_suffix('%') {
        return parse_f64_safe(Some(stripped)).map(|v| Fraction::new(v / 100.0));
    }
    parse_f64_safe(Some(raw)).map(Fraction::new)
}

/// Parse a date-column cell. Any value that fails to parse as a date is
/// the aggregate sentinel by contract, never an error. Timestamps are
/// truncated to calendar-day granularity.
///
/// Normalization is idempotent: re-parsing the display form of either
/// variant yields the same `DateCell`.
pub fn parse_date_cell(s: &str) -> DateCell {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return DateCell::Day(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return DateCell::Day(dt.date());
        }
    }
    DateCell::Total
}

/// Display form of a rate: `round(v*100)` with a trailing `%`.
/// Missing values format to an empty string. Out-of-range fractions are
/// scaled like any other (so 1.5 renders as `150%`).
pub fn format_fraction_pct(v: Option<Fraction>) -> String {
    match v {
        Some(f) => format!("{}%", f.as_percent().round() as i64),
        None => String::new(),
    }
}

pub fn mean(v: &[f64]) -> f64 {
    // Arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Format a floating-point value with a fixed number of decimal places
/// and locale-aware thousands separators (e.g., `1,234,567.89`).
pub fn format_number(n: f64, decimals: usize) -> String {
    let neg = n.is_sign_negative();
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    // `num-format` inserts the commas into the integer portion.
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    } else if decimals > 0 {
        res.push('.');
        res.push_str(&"0".repeat(decimals));
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Used for counts in console messages (e.g., `9,855 rows loaded`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_formats_as_rounded_percent() {
        assert_eq!(format_fraction_pct(Some(Fraction::new(0.9))), "90%");
        assert_eq!(format_fraction_pct(Some(Fraction::new(0.25))), "25%");
        assert_eq!(format_fraction_pct(Some(Fraction::new(0.0))), "0%");
        assert_eq!(format_fraction_pct(Some(Fraction::new(1.0))), "100%");
        assert_eq!(format_fraction_pct(None), "");
    }

    #[test]
    fn out_of_range_fraction_scales_unconditionally() {
        assert_eq!(format_fraction_pct(Some(Fraction::new(1.5))), "150%");
        assert_eq!(format_fraction_pct(Some(Fraction::new(-0.1))), "-10%");
    }

    #[test]
    fn percent_tagged_cell_parses_to_fraction() {
        assert_eq!(parse_fraction_safe(Some("90%")), Some(Fraction::new(0.9)));
        assert_eq!(parse_fraction_safe(Some("0.9")), Some(Fraction::new(0.9)));
        assert_eq!(parse_fraction_safe(Some("n/a")), None);
        assert_eq!(parse_fraction_safe(Some("")), None);
    }

    #[test]
    fn unparsable_date_is_the_total_sentinel() {
        assert_eq!(parse_date_cell("Total"), DateCell::Total);
        assert_eq!(parse_date_cell(""), DateCell::Total);
        assert_eq!(parse_date_cell("not a date"), DateCell::Total);
        assert_eq!(
            parse_date_cell("2024-01-01"),
            DateCell::Day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn timestamps_truncate_to_day() {
        assert_eq!(
            parse_date_cell("2024-01-01 13:45:00"),
            DateCell::Day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn date_normalization_is_idempotent() {
        for raw in ["2024-03-05", "Total", "garbage", "2024/03/05"] {
            let once = parse_date_cell(raw);
            let twice = parse_date_cell(&once.to_string());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn number_formatting_inserts_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-42.5, 2), "-42.50");
        assert_eq!(format_number(0.0, 0), "0");
    }
}
