//! Sync pipeline: load placements, snapshot a period and write run reports.

pub mod config;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod snapshot;

pub use config::{load_source_table, SourceRegistry, SyncConfig, SOURCES_FILE};
pub use export::{export_parquet_snapshots, ParquetManifest, ParquetManifestFile, MANIFEST_FILE, SNAPSHOTS_DIR};
pub use pipeline::{
    run_sync_once_from_env, DataOrigin, LoadedPlacements, RunRecord, SyncPipeline, SyncRunSummary,
    DAILY_BRIEF_FILE, PLACEMENTS_FILE,
};
pub use report::{recent_runs, report_daily_markdown, report_runs_csv, RunDigest};
pub use snapshot::{DashboardSnapshot, DataNotice, SheetLink, SnapshotQuery, DEFAULT_RECENT_LIMIT};

pub const CRATE_NAME: &str = "linkboard-sync";
