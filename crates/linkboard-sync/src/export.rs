//! Parquet snapshots of a run plus a sha256 manifest.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{ArrayRef, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use linkboard_adapters::SourceLoad;
use linkboard_core::{CanonicalRecord, KeyCount};
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::snapshot::DashboardSnapshot;

pub const SNAPSHOTS_DIR: &str = "snapshots";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetManifest {
    pub schema_version: u32,
    pub files: Vec<ParquetManifestFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetManifestFile {
    pub name: String,
    /// Relative to the run directory.
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

/// Write `snapshots/*.parquet` under `reports_dir` and return the manifest path.
pub async fn export_parquet_snapshots(
    reports_dir: &Path,
    placements: &[CanonicalRecord],
    snapshot: &DashboardSnapshot,
) -> Result<PathBuf> {
    let snapshot_dir = reports_dir.join(SNAPSHOTS_DIR);
    fs::create_dir_all(&snapshot_dir)
        .await
        .with_context(|| format!("creating {}", snapshot_dir.display()))?;

    let placements_path = snapshot_dir.join("placements.parquet");
    let employees_path = snapshot_dir.join("by_employee.parquet");
    let projects_path = snapshot_dir.join("by_project.parquet");
    let sources_path = snapshot_dir.join("sources.parquet");

    write_placements_parquet(&placements_path, placements)?;
    write_counts_parquet(&employees_path, "employee", &snapshot.by_employee)?;
    write_counts_parquet(&projects_path, "project", &snapshot.by_project)?;
    write_sources_parquet(&sources_path, &snapshot.sources)?;

    let manifest = ParquetManifest {
        schema_version: 1,
        files: vec![
            manifest_entry("placements", reports_dir, &placements_path)?,
            manifest_entry("by_employee", reports_dir, &employees_path)?,
            manifest_entry("by_project", reports_dir, &projects_path)?,
            manifest_entry("sources", reports_dir, &sources_path)?,
        ],
    };

    let manifest_path = snapshot_dir.join(MANIFEST_FILE);
    let bytes = serde_json::to_vec_pretty(&manifest).context("serializing parquet manifest")?;
    fs::write(&manifest_path, bytes)
        .await
        .with_context(|| format!("writing {}", manifest_path.display()))?;
    Ok(manifest_path)
}

fn write_parquet(path: &Path, batch: RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing record batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

fn utf8(values: impl Iterator<Item = String>) -> ArrayRef {
    Arc::new(StringArray::from(values.collect::<Vec<_>>()))
}

fn write_placements_parquet(path: &Path, records: &[CanonicalRecord]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("employee", DataType::Utf8, false),
        ArrowField::new("project", DataType::Utf8, false),
        ArrowField::new("date", DataType::Utf8, false),
        ArrowField::new("source", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            utf8(records.iter().map(|r| r.employee.clone())),
            utf8(records.iter().map(|r| r.project.clone())),
            utf8(records.iter().map(|r| r.date.to_string())),
            utf8(records.iter().map(|r| r.source.clone())),
        ],
    )
    .context("building placements record batch")?;
    write_parquet(path, batch)
}

fn write_counts_parquet(path: &Path, key: &str, counts: &[KeyCount]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        ArrowField::new(key, DataType::Utf8, false),
        ArrowField::new("count", DataType::UInt64, false),
    ]));
    let values = UInt64Array::from(counts.iter().map(|c| c.count as u64).collect::<Vec<_>>());
    let batch = RecordBatch::try_new(
        schema,
        vec![utf8(counts.iter().map(|c| c.key.clone())), Arc::new(values)],
    )
    .with_context(|| format!("building {key} counts record batch"))?;
    write_parquet(path, batch)
}

fn write_sources_parquet(path: &Path, sources: &[SourceLoad]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("name", DataType::Utf8, false),
        ArrowField::new("rows", DataType::UInt64, false),
        ArrowField::new("loaded", DataType::UInt64, false),
        ArrowField::new("rejected", DataType::UInt64, false),
        ArrowField::new("undated", DataType::UInt64, false),
        ArrowField::new("error", DataType::Utf8, true),
    ]));
    let counts = |f: fn(&SourceLoad) -> usize| -> ArrayRef {
        Arc::new(UInt64Array::from(
            sources.iter().map(|s| f(s) as u64).collect::<Vec<_>>(),
        ))
    };
    let errors = StringArray::from(sources.iter().map(|s| s.error.as_deref()).collect::<Vec<_>>());

    let batch = RecordBatch::try_new(
        schema,
        vec![
            utf8(sources.iter().map(|s| s.name.clone())),
            counts(|s| s.stats.rows),
            counts(|s| s.stats.loaded),
            counts(|s| s.stats.rejected),
            counts(|s| s.stats.undated),
            Arc::new(errors),
        ],
    )
    .context("building sources record batch")?;
    write_parquet(path, batch)
}

fn manifest_entry(name: &str, reports_dir: &Path, path: &Path) -> Result<ParquetManifestFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = hex::encode(hasher.finalize());
    let rel = path
        .strip_prefix(reports_dir)
        .unwrap_or(path)
        .display()
        .to_string();
    Ok(ParquetManifestFile {
        name: name.to_string(),
        path: rel,
        sha256,
        bytes: bytes.len() as u64,
    })
}
