//! HTTP fetch, Google Sheets access and CSV table storage for linkboard.

pub mod auth;
pub mod credentials;
pub mod http;
pub mod sheets;
pub mod table;

pub use auth::{AccessToken, AuthError, ServiceAccountAuth, ServiceAccountKey, SHEETS_SCOPE};
pub use credentials::{CredentialSource, CredentialsConfig, CredentialsError, ServiceAccountInfo};
pub use http::{FetchError, FetchedResponse, HttpClientConfig, HttpFetcher, DEFAULT_USER_AGENT};
pub use sheets::{column_letter, is_access_error, sheet_range, SheetsClient, SheetsError, SpreadsheetMeta};
pub use table::{read_csv_rows, read_csv_table, write_atomic, CsvTable, TableError};

pub const CRATE_NAME: &str = "linkboard-storage";
