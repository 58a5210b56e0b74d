//! Delete overpriced rows from the first worksheet of a spreadsheet.

use linkboard_core::price::{partition_by_price, MAX_SHEET_COLUMNS};
use linkboard_storage::{sheet_range, SheetsClient, SheetsError};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_PRICE_COLUMN: usize = 2;
pub const DEFAULT_MAX_PRICE: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceFilterOptions {
    /// Zero-based column holding the price.
    pub price_col: usize,
    pub max_price: f64,
}

impl Default for PriceFilterOptions {
    fn default() -> Self {
        Self {
            price_col: DEFAULT_PRICE_COLUMN,
            max_price: DEFAULT_MAX_PRICE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceFilterOutcome {
    pub sheet: String,
    pub removed: usize,
    /// Rows left in the sheet, header included.
    pub kept: usize,
}

impl PriceFilterOutcome {
    pub fn changed(&self) -> bool {
        self.removed > 0
    }
}

#[derive(Debug, Error)]
pub enum PriceFilterError {
    #[error("spreadsheet {0} has no worksheets")]
    NoWorksheet(String),
    #[error("price column {0} is past the last sheet column ({max})", max = MAX_SHEET_COLUMNS)]
    ColumnOutOfRange(usize),
    #[error(transparent)]
    Sheets(#[from] SheetsError),
}

/// Keep the header and every row priced at or under the threshold. The sheet is
/// only cleared and rewritten when at least one row goes.
pub async fn filter_sheet_prices(
    client: &SheetsClient,
    spreadsheet_id: &str,
    options: PriceFilterOptions,
) -> Result<PriceFilterOutcome, PriceFilterError> {
    if options.price_col >= MAX_SHEET_COLUMNS {
        return Err(PriceFilterError::ColumnOutOfRange(options.price_col));
    }
    let meta = client.spreadsheet_meta(spreadsheet_id).await?;
    let sheet = meta
        .first_sheet()
        .ok_or_else(|| PriceFilterError::NoWorksheet(spreadsheet_id.to_string()))?
        .to_string();
    let whole = sheet_range(&sheet, None);

    let rows = client.get_values(spreadsheet_id, &whole).await?;
    let total = rows.len();
    let (kept, removed) = partition_by_price(rows, options.price_col, options.max_price);
    let outcome = PriceFilterOutcome {
        sheet,
        removed,
        kept: kept.len(),
    };
    if !outcome.changed() {
        info!(spreadsheet_id, sheet = %outcome.sheet, rows = total, "no rows over the price limit");
        return Ok(outcome);
    }

    client.clear(spreadsheet_id, &whole).await?;
    client
        .update_values(spreadsheet_id, &sheet_range(&outcome.sheet, Some("A1")), &kept)
        .await?;
    info!(
        spreadsheet_id,
        sheet = %outcome.sheet,
        removed = outcome.removed,
        kept = outcome.kept,
        max_price = options.max_price,
        "removed overpriced rows"
    );
    Ok(outcome)
}
