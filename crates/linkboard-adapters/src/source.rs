use std::path::{Path, PathBuf};

use async_trait::async_trait;
use linkboard_core::SourceConfig;
use linkboard_storage::{read_csv_rows, sheet_range, SheetsClient, SheetsError, TableError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Sheets(#[from] SheetsError),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Where the raw cells of a configured source come from.
#[async_trait]
pub trait RowSource: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Every row of the source, header row first.
    async fn read_rows(&self, cfg: &SourceConfig) -> Result<Vec<Vec<String>>, SourceError>;
}

/// Reads each source's worksheet through the Sheets API.
#[derive(Debug, Clone)]
pub struct SheetRowSource {
    client: SheetsClient,
}

impl SheetRowSource {
    pub fn new(client: SheetsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RowSource for SheetRowSource {
    fn kind(&self) -> &'static str {
        "google-sheets"
    }

    async fn read_rows(&self, cfg: &SourceConfig) -> Result<Vec<Vec<String>>, SourceError> {
        let range = sheet_range(&cfg.sheet, None);
        Ok(self.client.get_values(&cfg.spreadsheet_id, &range).await?)
    }
}

/// Reads `<dir>/<source name>.csv`; a missing file is an empty source.
#[derive(Debug, Clone)]
pub struct CsvDirRowSource {
    dir: PathBuf,
}

impl CsvDirRowSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, cfg: &SourceConfig) -> PathBuf {
        self.dir.join(format!("{}.csv", cfg.name))
    }
}

#[async_trait]
impl RowSource for CsvDirRowSource {
    fn kind(&self) -> &'static str {
        "csv-dir"
    }

    async fn read_rows(&self, cfg: &SourceConfig) -> Result<Vec<Vec<String>>, SourceError> {
        let path = self.path_for(cfg);
        if !path.exists() {
            debug!(source = %cfg.name, path = %path.display(), "no csv export for source");
            return Ok(Vec::new());
        }
        Ok(read_csv_rows(&path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkboard_core::SourceTable;
    use tempfile::tempdir;

    #[tokio::test]
    async fn csv_dir_source_reads_named_export_and_tolerates_absence() {
        let dir = tempdir().unwrap();
        let table = SourceTable::builtin();
        let international = &table.sources()[3];
        std::fs::write(
            dir.path().join("International.csv"),
            "Date,Project,Version,Linkbuilder,Status,Date of posting\n,Acme,v2,Ann,Готово,15.03.2024\n",
        )
        .unwrap();

        let source = CsvDirRowSource::new(dir.path());
        let rows = source.read_rows(international).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][3], "Ann");

        let missing = source.read_rows(&table.sources()[0]).await.unwrap();
        assert!(missing.is_empty());
        assert_eq!(source.kind(), "csv-dir");
    }
}
