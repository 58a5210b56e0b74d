//! Batch anchor checks over CSV files and worksheets.
//!
//! Rows are checked one at a time in file order with a pause between page
//! fetches. Each row's verdict lands in its `Found` cell; every other column is
//! written back untouched.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use linkboard_core::{MatchResult, Verdict};
use linkboard_storage::{
    column_letter, read_csv_table, sheet_range, write_atomic, CsvTable, HttpClientConfig,
    HttpFetcher, SheetsClient,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::matcher::check_page;

pub const COL_PAGE_URL: &str = "Page URL";
pub const COL_TARGET_URL: &str = "Target URL";
pub const COL_EXACT_ANCHOR: &str = "Exact Anchor";
pub const COL_FOUND: &str = "Found";

pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);

const PAGE_PREFIX_CHARS: usize = 50;
const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorRow {
    pub page_url: String,
    pub target_url: String,
    pub anchor: String,
}

impl AnchorRow {
    fn from_table(table: &CsvTable, row: usize) -> Self {
        Self {
            page_url: table.get_named(row, COL_PAGE_URL).trim().to_string(),
            target_url: table.get_named(row, COL_TARGET_URL).trim().to_string(),
            anchor: table.get_named(row, COL_EXACT_ANCHOR).trim().to_string(),
        }
    }

    pub fn is_checkable(&self) -> bool {
        !self.page_url.is_empty() && !self.target_url.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Page or target URL missing; nothing was fetched.
    Skipped,
    Checked(MatchResult),
}

impl RowOutcome {
    pub fn verdict(&self) -> Verdict {
        match self {
            RowOutcome::Skipped => Verdict::Error,
            RowOutcome::Checked(result) => result.verdict(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub yes: usize,
    pub no: usize,
    pub error: usize,
}

impl BatchSummary {
    pub fn tally(outcomes: &[RowOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome.verdict() {
                Verdict::Yes => summary.yes += 1,
                Verdict::No => summary.no += 1,
                Verdict::Error => summary.error += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetBatchSummary {
    pub spreadsheet_title: String,
    pub sheet: String,
    /// A1 range the verdicts were written to; `None` when there were no rows.
    pub range: Option<String>,
    pub summary: BatchSummary,
}

fn page_prefix(url: &str) -> String {
    url.chars().take(PAGE_PREFIX_CHARS).collect()
}

#[derive(Debug, Clone)]
pub struct AnchorChecker {
    fetcher: HttpFetcher,
    delay: Duration,
}

impl AnchorChecker {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            delay: DEFAULT_REQUEST_DELAY,
        }
    }

    pub fn from_config(config: HttpClientConfig) -> Result<Self> {
        Ok(Self::new(HttpFetcher::new(config)?))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Check rows in order. The delay follows each fetched row except the last one.
    pub async fn check_rows(&self, rows: &[AnchorRow]) -> Vec<RowOutcome> {
        let total = rows.len();
        let mut outcomes = Vec::with_capacity(total);
        for (idx, row) in rows.iter().enumerate() {
            let n = idx + 1;
            if !row.is_checkable() {
                info!("[{n}/{total}] skipped: no {COL_PAGE_URL} or {COL_TARGET_URL}");
                outcomes.push(RowOutcome::Skipped);
                continue;
            }

            let result = check_page(&self.fetcher, &row.page_url, &row.target_url, &row.anchor).await;
            let prefix = page_prefix(&row.page_url);
            match result.detail() {
                Some(detail) => info!("[{n}/{total}] {prefix}... -> {} ({detail})", result.verdict()),
                None => info!("[{n}/{total}] {prefix}... -> {}", result.verdict()),
            }
            outcomes.push(RowOutcome::Checked(result));

            if !self.delay.is_zero() && n < total {
                tokio::time::sleep(self.delay).await;
            }
        }
        outcomes
    }

    /// Check a `Page URL, Target URL, Exact Anchor[, Found]` CSV file and write
    /// it back to `output` (the input itself when `None`).
    pub async fn check_csv_file(&self, input: &Path, output: Option<&Path>) -> Result<BatchSummary> {
        let mut table = read_csv_table(input)?;
        if table.rows.is_empty() {
            info!(path = %input.display(), "no rows to check");
            return Ok(BatchSummary::default());
        }
        let found_col = table.ensure_column(COL_FOUND);
        let rows = (0..table.rows.len())
            .map(|i| AnchorRow::from_table(&table, i))
            .collect::<Vec<_>>();

        let outcomes = self.check_rows(&rows).await;
        for (idx, outcome) in outcomes.iter().enumerate() {
            table.set(idx, found_col, outcome.verdict().as_str());
        }

        let output = output.unwrap_or(input);
        let mut bytes = UTF8_BOM.as_bytes().to_vec();
        bytes.extend(table.to_csv_bytes()?);
        write_atomic(output, &bytes)
            .await
            .with_context(|| format!("writing results to {}", output.display()))?;

        let summary = BatchSummary::tally(&outcomes);
        info!(path = %output.display(), yes = summary.yes, no = summary.no, error = summary.error, "anchor results written");
        Ok(summary)
    }

    /// Same check against a worksheet (the first one when `sheet` is `None`);
    /// the `Found` column is updated with a single range write.
    pub async fn check_sheet(
        &self,
        client: &SheetsClient,
        spreadsheet_id: &str,
        sheet: Option<&str>,
    ) -> Result<SheetBatchSummary> {
        let meta = client
            .spreadsheet_meta(spreadsheet_id)
            .await
            .with_context(|| format!("opening spreadsheet {spreadsheet_id}"))?;
        let sheet = match sheet {
            Some(name) => name.to_string(),
            None => meta
                .first_sheet()
                .ok_or_else(|| anyhow!("spreadsheet {spreadsheet_id} has no worksheets"))?
                .to_string(),
        };

        let values = client
            .get_values(spreadsheet_id, &sheet_range(&sheet, None))
            .await
            .with_context(|| format!("reading worksheet {sheet}"))?;
        let mut table = CsvTable::from_rows(values);
        if table.rows.is_empty() {
            info!(spreadsheet_id, sheet = %sheet, "no data rows (or header mismatch)");
            return Ok(SheetBatchSummary {
                spreadsheet_title: meta.title,
                sheet,
                range: None,
                summary: BatchSummary::default(),
            });
        }

        if table.column_index(COL_FOUND).is_none() {
            let col = table.ensure_column(COL_FOUND);
            let header_cell = format!("{}1", column_letter(col + 1));
            client
                .update_values(
                    spreadsheet_id,
                    &sheet_range(&sheet, Some(&header_cell)),
                    &[vec![COL_FOUND.to_string()]],
                )
                .await
                .context("adding Found header")?;
        }
        let letter = column_letter(table.ensure_column(COL_FOUND) + 1);

        let rows = (0..table.rows.len())
            .map(|i| AnchorRow::from_table(&table, i))
            .collect::<Vec<_>>();
        let outcomes = self.check_rows(&rows).await;
        let values = outcomes
            .iter()
            .map(|o| vec![o.verdict().as_str().to_string()])
            .collect::<Vec<_>>();

        let cells = format!("{letter}2:{letter}{}", values.len() + 1);
        let range = sheet_range(&sheet, Some(&cells));
        client
            .update_values(spreadsheet_id, &range, &values)
            .await
            .context("writing Found column")?;

        let summary = BatchSummary::tally(&outcomes);
        info!(title = %meta.title, sheet = %sheet, rows = summary.total, "Found column updated");
        Ok(SheetBatchSummary {
            spreadsheet_title: meta.title,
            sheet,
            range: Some(range),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path as AxumPath, State},
        http::StatusCode,
        response::{Html, Redirect},
        routing::get,
        Json, Router,
    };
    use serde_json::{json, Value as JsonValue};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };
    use std::time::Instant;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Server {
        page_hits: AtomicUsize,
        sheet: Mutex<Vec<Vec<String>>>,
        writes: Mutex<Vec<(String, JsonValue)>>,
    }

    type Shared = Arc<Server>;

    async fn page(State(server): State<Shared>) -> Html<&'static str> {
        server.page_hits.fetch_add(1, Ordering::SeqCst);
        Html(r#"<p><a href="/target/">Click   Here</a> <a href="/other">Other</a></p>"#)
    }

    async fn meta() -> Json<JsonValue> {
        Json(json!({"properties": {"title": "Anchors"}, "sheets": [{"properties": {"title": "Links"}}]}))
    }

    async fn read_sheet(State(server): State<Shared>) -> Json<JsonValue> {
        let rows = server.sheet.lock().unwrap().clone();
        Json(json!({ "values": rows }))
    }

    async fn write_sheet(
        State(server): State<Shared>,
        AxumPath((_id, range)): AxumPath<(String, String)>,
        Json(body): Json<JsonValue>,
    ) -> Json<JsonValue> {
        server.writes.lock().unwrap().push((range, body["values"].clone()));
        Json(json!({}))
    }

    async fn spawn(server: Shared) -> String {
        let app = Router::new()
            .route("/page", get(page))
            .route("/old", get(|| async { Redirect::permanent("/page") }))
            .route("/gone", get(|| async { (StatusCode::NOT_FOUND, "gone") }))
            .route("/v4/spreadsheets/{id}", get(meta))
            .route("/v4/spreadsheets/{id}/values/{range}", get(read_sheet).put(write_sheet))
            .with_state(server);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn checker() -> AnchorChecker {
        AnchorChecker::from_config(HttpClientConfig::default())
            .unwrap()
            .with_delay(Duration::ZERO)
    }

    fn row(page: &str, target: &str, anchor: &str) -> AnchorRow {
        AnchorRow {
            page_url: page.into(),
            target_url: target.into(),
            anchor: anchor.into(),
        }
    }

    #[tokio::test]
    async fn verdicts_cover_found_missing_and_errors() {
        let server = Shared::default();
        let base = spawn(server.clone()).await;
        let target = format!("{base}/target");

        let outcomes = checker()
            .check_rows(&[
                row(&format!("{base}/old"), &target, "Click Here"),
                row(&format!("{base}/page"), &target, "Click There"),
                row(&format!("{base}/gone"), &target, "Click Here"),
                row("", &target, "Click Here"),
                row(&format!("{base}/page"), "", "Click Here"),
            ])
            .await;

        let verdicts = outcomes.iter().map(RowOutcome::verdict).collect::<Vec<_>>();
        assert_eq!(
            verdicts,
            vec![Verdict::Yes, Verdict::No, Verdict::Error, Verdict::Error, Verdict::Error]
        );
        assert!(matches!(&outcomes[2], RowOutcome::Checked(MatchResult::FetchError(msg)) if !msg.is_empty()));
        assert_eq!(outcomes[3], RowOutcome::Skipped);
        // redirect target plus the second row; skipped rows never fetch
        assert_eq!(server.page_hits.load(Ordering::SeqCst), 2);
        assert_eq!(
            BatchSummary::tally(&outcomes),
            BatchSummary { total: 5, yes: 1, no: 1, error: 3 }
        );
    }

    #[tokio::test]
    async fn delay_only_separates_fetches() {
        let server = Shared::default();
        let base = spawn(server).await;
        let page = format!("{base}/page");
        let target = format!("{base}/target");
        let checker = checker().with_delay(Duration::from_millis(400));

        let started = Instant::now();
        checker
            .check_rows(&[row(&page, &target, "Click Here"), row(&page, &target, "Click Here")])
            .await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(800), "{elapsed:?}");
    }

    #[tokio::test]
    async fn csv_file_gets_found_column_and_keeps_other_columns() {
        let server = Shared::default();
        let base = spawn(server).await;
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("anchors.csv");
        let output = dir.path().join("checked.csv");
        std::fs::write(
            &input,
            format!(
                "\u{feff}Page URL,Target URL,Exact Anchor,Notes\n\
                 {base}/page,{base}/target,Click Here,first\n\
                 ,{base}/target,Click Here,\"no page, skipped\"\n"
            ),
        )
        .unwrap();

        let summary = checker().check_csv_file(&input, Some(&output)).await.unwrap();
        assert_eq!(summary, BatchSummary { total: 2, yes: 1, no: 0, error: 1 });

        let table = read_csv_table(&output).unwrap();
        assert_eq!(table.headers, vec!["Page URL", "Target URL", "Exact Anchor", "Notes", "Found"]);
        assert_eq!(table.get_named(0, "Found"), "Yes");
        assert_eq!(table.get_named(0, "Notes"), "first");
        assert_eq!(table.get_named(1, "Found"), "Error");
        assert_eq!(table.get_named(1, "Notes"), "no page, skipped");
        assert!(std::fs::read(&output).unwrap().starts_with(UTF8_BOM.as_bytes()));
        // input untouched when an output path is given
        assert!(!std::fs::read_to_string(&input).unwrap().contains("Found"));
    }

    #[tokio::test]
    async fn header_only_csv_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("anchors.csv");
        std::fs::write(&input, "Page URL,Target URL,Exact Anchor\n").unwrap();
        let summary = checker().check_csv_file(&input, None).await.unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(std::fs::read_to_string(&input).unwrap(), "Page URL,Target URL,Exact Anchor\n");
    }

    #[tokio::test]
    async fn sheet_gets_found_header_and_verdict_range() {
        let server = Shared::default();
        let base = spawn(server.clone()).await;
        *server.sheet.lock().unwrap() = vec![
            vec!["Page URL".into(), "Target URL".into(), "Exact Anchor".into()],
            vec![format!("{base}/page"), format!("{base}/target"), "Click Here".into()],
            vec![format!("{base}/page"), format!("{base}/other/"), "Nope".into()],
        ];
        let client = SheetsClient::new("tok", Duration::from_secs(5))
            .unwrap()
            .with_base_url(format!("{base}/v4/spreadsheets"));

        let result = checker().check_sheet(&client, "sheet-1", None).await.unwrap();
        assert_eq!(result.spreadsheet_title, "Anchors");
        assert_eq!(result.sheet, "Links");
        assert_eq!(result.range.as_deref(), Some("'Links'!D2:D3"));
        assert_eq!(result.summary, BatchSummary { total: 2, yes: 1, no: 1, error: 0 });

        let writes = server.writes.lock().unwrap();
        assert_eq!(writes[0].0, "'Links'!D1");
        assert_eq!(writes[0].1, json!([["Found"]]));
        assert_eq!(writes[1].0, "'Links'!D2:D3");
        assert_eq!(writes[1].1, json!([["Yes"], ["No"]]));
    }
}
