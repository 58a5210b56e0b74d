//! Minimal Google Sheets v4 values client.

use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("sheets request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sheets api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid sheets url: {0}")]
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetMeta {
    pub title: String,
    pub sheet_titles: Vec<String>,
}

impl SpreadsheetMeta {
    pub fn first_sheet(&self) -> Option<&str> {
        self.sheet_titles.first().map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    #[serde(default)]
    properties: Option<MetaProperties>,
    #[serde(default)]
    sheets: Vec<MetaSheet>,
}

#[derive(Debug, Deserialize)]
struct MetaProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct MetaSheet {
    properties: MetaProperties,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

/// 1-based column number to its A1 letter: 1 -> A, 27 -> AA.
pub fn column_letter(mut n: usize) -> String {
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    if out.is_empty() {
        return "A".to_string();
    }
    out.iter().rev().collect()
}

/// A1 range scoped to a worksheet; the name is quoted so spaces and Cyrillic survive.
pub fn sheet_range(sheet: &str, cells: Option<&str>) -> String {
    let quoted = format!("'{}'", sheet.replace('\'', "''"));
    match cells {
        Some(cells) => format!("{quoted}!{cells}"),
        None => quoted,
    }
}

fn cell_to_string(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl SheetsClient {
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Result<Self, SheetsError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            access_token: access_token.into(),
            base_url: SHEETS_API_BASE.to_string(),
        })
    }

    /// Point the client at another API root (a local stub in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, spreadsheet_id: &str, tail: &[&str]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| SheetsError::Url(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SheetsError::Url(self.base_url.clone()))?;
            segments.pop_if_empty().push(spreadsheet_id);
            for segment in tail {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SheetsError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub async fn spreadsheet_meta(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta, SheetsError> {
        let mut url = self.url(spreadsheet_id, &[])?;
        url.query_pairs_mut()
            .append_pair("fields", "properties.title,sheets.properties.title");
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let meta: MetaResponse = Self::check(resp).await?.json().await?;
        Ok(SpreadsheetMeta {
            title: meta.properties.map(|p| p.title).unwrap_or_default(),
            sheet_titles: meta.sheets.into_iter().map(|s| s.properties.title).collect(),
        })
    }

    /// All rows of `range` as strings; trailing empty cells are omitted by the API.
    pub async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.url(spreadsheet_id, &["values", range])?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let body: ValueRange = Self::check(resp).await?.json().await?;
        debug!(spreadsheet_id, range, rows = body.values.len(), "read sheet values");
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    pub async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<(), SheetsError> {
        let mut url = self.url(spreadsheet_id, &["values", range])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        let resp = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "range": range, "values": values }))
            .send()
            .await?;
        Self::check(resp).await?;
        debug!(spreadsheet_id, range, rows = values.len(), "updated sheet values");
        Ok(())
    }

    pub async fn clear(&self, spreadsheet_id: &str, range: &str) -> Result<(), SheetsError> {
        let clear_range = format!("{range}:clear");
        let url = self.url(spreadsheet_id, &["values", clear_range.as_str()])?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}

/// Whether an error means the sheet is missing or not shared with us.
pub fn is_access_error(err: &SheetsError) -> bool {
    matches!(
        err,
        SheetsError::Status { status, .. }
            if *status == StatusCode::FORBIDDEN.as_u16() || *status == StatusCode::NOT_FOUND.as_u16()
    )
}
