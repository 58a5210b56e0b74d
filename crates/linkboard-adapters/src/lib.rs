//! Row sources and placement loading.
//!
//! A [`RowSource`] hands back the raw cell grid of one configured sheet, either
//! from the Sheets API or from a CSV export on disk. The loader turns those
//! grids into canonical records and keeps count of what it had to skip.

pub mod import;
pub mod load;
pub mod price_filter;
pub mod source;

pub use import::{import_csv, normalize_header, records_from_table, HeaderColumns, ImportedRows};
pub use load::{load_sources, records_from_rows, LoadOutcome, LoadStats, SourceLoad};
pub use price_filter::{filter_sheet_prices, PriceFilterError, PriceFilterOptions, PriceFilterOutcome};
pub use source::{CsvDirRowSource, RowSource, SheetRowSource, SourceError};

pub const CRATE_NAME: &str = "linkboard-adapters";
