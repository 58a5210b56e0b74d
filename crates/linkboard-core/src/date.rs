//! Date cell parsing.

use chrono::{NaiveDate, NaiveDateTime};

enum DateFormat {
    Date(&'static str),
    DateTime(&'static str),
}

/// Tried in this order; day-first formats must stay ahead of the ISO ones.
const DATE_FORMATS: [DateFormat; 5] = [
    DateFormat::Date("%d.%m.%Y"),
    DateFormat::Date("%Y-%m-%d"),
    DateFormat::Date("%d/%m/%Y"),
    DateFormat::DateTime("%Y-%m-%d %H:%M:%S"),
    DateFormat::DateTime("%d.%m.%Y %H:%M"),
];

const DATE_PREFIX_LEN: usize = 10;

impl DateFormat {
    fn parse(&self, input: &str) -> Option<NaiveDate> {
        match self {
            DateFormat::Date(fmt) => NaiveDate::parse_from_str(input, fmt).ok(),
            DateFormat::DateTime(fmt) => NaiveDateTime::parse_from_str(input, fmt)
                .ok()
                .map(|dt| dt.date()),
        }
    }
}

/// Parse a spreadsheet date cell. Values longer than ten characters are cut to
/// their ten-character prefix, which drops any time-of-day suffix.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = match trimmed.char_indices().nth(DATE_PREFIX_LEN) {
        Some((cut, _)) => &trimmed[..cut],
        None => trimmed,
    };
    DATE_FORMATS.iter().find_map(|format| format.parse(candidate))
}

/// `parse_date` for cells that may be absent altogether.
pub fn parse_date_cell(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(parse_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_each_supported_shape() {
        assert_eq!(parse_date("15.03.2024"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse_date("2024-03-15"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse_date("15/03/2024"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn time_suffix_is_truncated_away() {
        assert_eq!(parse_date("2024-03-15 10:00:00"), Some(ymd(2024, 3, 15)));
        assert_eq!(parse_date("15.03.2024 18:45"), Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(parse_date("  01.12.2025 "), Some(ymd(2025, 12, 1)));
    }

    #[test]
    fn rejects_garbage_and_blanks() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("31.02.2024"), None);
        assert_eq!(parse_date_cell(None), None);
    }

    #[test]
    fn non_ascii_input_does_not_panic_on_truncation() {
        assert_eq!(parse_date("сегодня вечером или завтра"), None);
    }

    #[test]
    fn day_first_wins_for_dotted_dates() {
        assert_eq!(parse_date("03.04.2024"), Some(ymd(2024, 4, 3)));
    }
}
