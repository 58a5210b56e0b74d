//! CSV-backed record sets with in-place write-back.

use std::borrow::Cow;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use encoding_rs::WINDOWS_1251;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing csv {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Header row plus data rows, every cell kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// First row becomes the header. Empty input gives an empty table.
    pub fn from_rows(mut rows: Vec<Vec<String>>) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let headers = rows.remove(0);
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Index of `name`, appending the column when it is missing.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        }
    }

    pub fn get(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Lookup by header name; missing column or short row read as empty.
    pub fn get_named(&self, row: usize, name: &str) -> &str {
        match self.column_index(name) {
            Some(col) => self.get(row, col),
            None => "",
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) {
        let Some(cells) = self.rows.get_mut(row) else {
            return;
        };
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.into();
    }

    pub fn to_csv_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
        writer.write_record(&self.headers).context("writing csv header")?;
        for row in &self.rows {
            let mut padded = row.clone();
            if padded.len() < self.headers.len() {
                padded.resize(self.headers.len(), String::new());
            }
            writer.write_record(&padded).context("writing csv row")?;
        }
        writer.into_inner().context("flushing csv writer")
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, TableError> {
    let mut file = std::fs::File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }
    Ok(bytes)
}

/// UTF-8 when valid, otherwise cp1251 (what Excel writes for Cyrillic exports).
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            debug!("csv is not utf-8; decoding as windows-1251");
            WINDOWS_1251.decode_without_bom_handling(bytes).0
        }
    }
}

/// Every row of a CSV file, header included, without interpreting it.
pub fn read_csv_rows(path: impl AsRef<Path>) -> Result<Vec<Vec<String>>, TableError> {
    let path = path.as_ref();
    let bytes = read_bytes(path)?;
    let text = decode_text(&bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(record.iter().map(ToString::to_string).collect());
    }
    Ok(rows)
}

pub fn read_csv_table(path: impl AsRef<Path>) -> Result<CsvTable, TableError> {
    Ok(CsvTable::from_rows(read_csv_rows(path)?))
}

/// Write through a temp file in the same directory, then rename over `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .await
        .with_context(|| format!("creating directory {}", parent.display()))?;

    let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
    let mut file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&temp_path)
        .await
        .with_context(|| format!("opening temp file {}", temp_path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;
    file.flush()
        .await
        .with_context(|| format!("flushing temp file {}", temp_path.display()))?;
    drop(file);

    if let Err(err) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err).with_context(|| {
            format!(
                "renaming temp file {} -> {}",
                temp_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_bom_prefixed_file_with_ragged_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("anchors.csv");
        std::fs::write(
            &path,
            "\u{feff}Page URL,Target URL,Exact Anchor\nhttps://a.com,https://t.com,Click\nhttps://b.com\n",
        )
        .unwrap();
        let table = read_csv_table(&path).unwrap();
        assert_eq!(table.headers, vec!["Page URL", "Target URL", "Exact Anchor"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.get_named(0, "Exact Anchor"), "Click");
        assert_eq!(table.get_named(1, "Target URL"), "");
        assert_eq!(table.get_named(0, "Missing"), "");
    }

    #[test]
    fn cp1251_export_is_decoded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.csv");
        // "Статус,Проект\nГотово,Acme\n" as written by Excel on a Russian locale
        let mut bytes = vec![0xD1, 0xF2, 0xE0, 0xF2, 0xF3, 0xF1, b','];
        bytes.extend([0xCF, 0xF0, 0xEE, 0xE5, 0xEA, 0xF2, b'\n']);
        bytes.extend([0xC3, 0xEE, 0xF2, 0xEE, 0xE2, 0xEE, b',']);
        bytes.extend(b"Acme\n");
        std::fs::write(&path, bytes).unwrap();

        let rows = read_csv_rows(&path).unwrap();
        assert_eq!(rows[0], vec!["Статус", "Проект"]);
        assert_eq!(rows[1], vec!["Готово", "Acme"]);
    }

    #[test]
    fn valid_utf8_is_not_reinterpreted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("utf8.csv");
        std::fs::write(&path, "Статус\nГотово\n").unwrap();
        assert_eq!(read_csv_rows(&path).unwrap()[1], vec!["Готово"]);
    }

    #[test]
    fn ensure_column_appends_once() {
        let mut table = CsvTable::from_rows(vec![
            vec!["a".into(), "b".into()],
            vec!["1".into(), "2".into()],
        ]);
        let found = table.ensure_column("Found");
        assert_eq!(found, 2);
        assert_eq!(table.ensure_column("Found"), 2);
        table.set(0, found, "Yes");
        assert_eq!(table.rows[0], vec!["1", "2", "Yes"]);
        table.set(5, found, "ignored");
        assert_eq!(table.rows.len(), 1);
    }

    #[tokio::test]
    async fn atomic_write_replaces_content_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "old").unwrap();

        let mut table = CsvTable::new(vec!["x".into(), "y".into()], vec![vec!["1".into()]]);
        table.set(0, 1, "two, with comma");
        write_atomic(&path, &table.to_csv_bytes().unwrap()).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "x,y\n1,\"two, with comma\"\n");
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = read_csv_rows(dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, TableError::Io { .. }));
    }
}
