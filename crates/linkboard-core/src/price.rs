//! Currency-formatted price cells.

use lazy_static::lazy_static;
use regex::Regex;

/// Column cap of a Google Sheets grid (`A` through `ZZZ`).
pub const MAX_SHEET_COLUMNS: usize = 18_278;

lazy_static! {
    static ref CURRENCY_SIGNS: Regex = Regex::new(r"[$£€]").unwrap();
    static ref EURO_WORDS: Regex = Regex::new(r"(?i)\s*(euros?|euro|eur\.?)\s*").unwrap();
    static ref NON_NUMERIC: Regex = Regex::new(r"[^\d.]").unwrap();
    static ref SHEET_ID: Regex = Regex::new(r"/d/([a-zA-Z0-9_-]+)").unwrap();
}

/// Number inside a price cell such as `150$`, `$1,200`, `130EUR` or `£100`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let s = CURRENCY_SIGNS.replace_all(s, "");
    let s = EURO_WORDS.replace_all(&s, " ");
    let s = s.replace(',', "");
    let s = NON_NUMERIC.replace_all(s.trim(), "");
    if s.is_empty() {
        return None;
    }
    s.parse().ok()
}

/// Spreadsheet id out of a sheet URL; anything else is taken as the id itself.
pub fn extract_spreadsheet_id(url_or_id: &str) -> String {
    SHEET_ID
        .captures(url_or_id)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| url_or_id.trim().to_string())
}

/// Rows whose price column parses above `max_price` are dropped; the first row is
/// kept as the header. Short rows are padded out to the price column. Returns the
/// kept rows and the number removed.
pub fn partition_by_price(
    rows: Vec<Vec<String>>,
    price_col: usize,
    max_price: f64,
) -> (Vec<Vec<String>>, usize) {
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return (Vec::new(), 0);
    };
    let mut kept = vec![header];
    let mut removed = 0;
    for mut row in rows {
        if row.len() <= price_col && price_col < MAX_SHEET_COLUMNS {
            row.resize(price_col + 1, String::new());
        }
        match row.get(price_col).and_then(|cell| parse_price(cell)) {
            Some(price) if price > max_price => removed += 1,
            _ => kept.push(row),
        }
    }
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_price_shapes() {
        assert_eq!(parse_price("150$"), Some(150.0));
        assert_eq!(parse_price("$200.00"), Some(200.0));
        assert_eq!(parse_price("130EUR"), Some(130.0));
        assert_eq!(parse_price("130 euro"), Some(130.0));
        assert_eq!(parse_price("£100"), Some(100.0));
        assert_eq!(parse_price("$1,200"), Some(1200.0));
        assert_eq!(parse_price("200"), Some(200.0));
    }

    #[test]
    fn blank_or_wordy_cells_have_no_price() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("   "), None);
        assert_eq!(parse_price("free"), None);
        assert_eq!(parse_price("1.2.3"), None);
    }

    #[test]
    fn extracts_id_from_sheet_url() {
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/1RTU_DS-7rK5/edit#gid=0"),
            "1RTU_DS-7rK5"
        );
        assert_eq!(extract_spreadsheet_id("  1RTU_DS-7rK5 "), "1RTU_DS-7rK5");
    }

    #[test]
    fn partition_keeps_header_and_cheap_rows() {
        let rows = vec![
            vec!["Site".into(), "DR".into(), "Price".into()],
            vec!["a.com".into(), "50".into(), "$150".into()],
            vec!["b.com".into(), "70".into(), "$1,200".into()],
            vec!["c.com".into()],
            vec!["d.com".into(), "10".into(), "200".into()],
        ];
        let (kept, removed) = partition_by_price(rows, 2, 200.0);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0][2], "Price");
        assert_eq!(kept[2], vec!["c.com".to_string(), String::new(), String::new()]);
    }

    #[test]
    fn column_past_the_grid_keeps_rows_untouched() {
        let rows = vec![vec!["Site".into()], vec!["a.com".into(), "$900".into()]];
        let (kept, removed) = partition_by_price(rows.clone(), usize::MAX, 200.0);
        assert_eq!(removed, 0);
        assert_eq!(kept, rows);
    }

    #[test]
    fn partition_of_empty_sheet_is_empty() {
        assert_eq!(partition_by_price(Vec::new(), 2, 200.0), (Vec::new(), 0));
    }
}
