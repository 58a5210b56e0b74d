//! Load placements, compute the period snapshot and write the run reports.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use linkboard_adapters::{
    import_csv, load_sources, CsvDirRowSource, LoadOutcome, SheetRowSource, SourceLoad,
};
use linkboard_core::{filter_by_period, CanonicalRecord, DateRange, Period, SourceTable, ACCEPTED_STATUS};
use linkboard_storage::CredentialsError;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{load_source_table, SyncConfig};
use crate::export::{export_parquet_snapshots, SNAPSHOTS_DIR};
use crate::snapshot::{DashboardSnapshot, SheetLink, SnapshotQuery};

pub const DAILY_BRIEF_FILE: &str = "daily_brief.md";
pub const PLACEMENTS_FILE: &str = "placements.json";

/// Where the loaded records came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DataOrigin {
    GoogleSheets,
    CsvExports { dir: String },
    Uploads { files: Vec<String> },
}

impl std::fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataOrigin::GoogleSheets => f.write_str("Google Sheets"),
            DataOrigin::CsvExports { dir } => write!(f, "CSV exports in {dir}"),
            DataOrigin::Uploads { files } => write!(f, "imported CSV ({})", files.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedPlacements {
    pub origin: DataOrigin,
    pub outcome: LoadOutcome,
    /// Set when the Sheets credentials were missing and CSV exports were used.
    pub guidance: Option<String>,
    pub share_email: Option<String>,
    pub sheet_links: Vec<SheetLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub range: DateRange,
    pub origin: DataOrigin,
    pub sources: Vec<SourceLoad>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub range: DateRange,
    pub origin: DataOrigin,
    pub loaded_records: usize,
    pub period_records: usize,
    pub failed_sources: usize,
    pub reports_dir: String,
    pub parquet_manifest: String,
}

pub struct SyncPipeline {
    config: SyncConfig,
    sources: Option<SourceTable>,
    uploads: Vec<PathBuf>,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            sources: None,
            uploads: Vec::new(),
        }
    }

    /// Use this table instead of `sources.yaml` or the built-in one.
    pub fn with_sources(mut self, sources: SourceTable) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Read these header-addressed CSV files instead of the configured sources.
    pub fn with_uploads(mut self, files: Vec<PathBuf>) -> Self {
        self.uploads = files;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn source_table(&self) -> Result<SourceTable> {
        match &self.sources {
            Some(table) => Ok(table.clone()),
            None => load_source_table(&self.config.workspace_root).await,
        }
    }

    pub async fn load(&self) -> Result<LoadedPlacements> {
        let table = self.source_table().await?;
        let sheet_links = table.sources().iter().map(SheetLink::for_source).collect();
        let share_email = self.config.credentials.service_account_email();

        if !self.uploads.is_empty() {
            let outcome = import_uploads(&self.uploads)?;
            return Ok(LoadedPlacements {
                origin: DataOrigin::Uploads {
                    files: self.uploads.iter().map(|p| p.display().to_string()).collect(),
                },
                outcome,
                guidance: None,
                share_email,
                sheet_links,
            });
        }

        let (origin, outcome, guidance) = match self.config.credentials.sheets_client(self.config.http_timeout()).await {
            Ok(client) => {
                let outcome = load_sources(&SheetRowSource::new(client), &table, None).await;
                (DataOrigin::GoogleSheets, outcome, None)
            }
            Err(CredentialsError::Missing { guidance }) => {
                let dir = &self.config.data_dir;
                warn!(dir = %dir.display(), "Google Sheets credentials missing; reading CSV exports");
                let outcome = load_sources(&CsvDirRowSource::new(dir), &table, None).await;
                let origin = DataOrigin::CsvExports {
                    dir: dir.display().to_string(),
                };
                (origin, outcome, Some(guidance))
            }
            Err(err) => return Err(err).context("building Sheets client"),
        };

        let totals = outcome.totals();
        info!(
            origin = %origin,
            records = outcome.records.len(),
            rejected = totals.rejected,
            undated = totals.undated,
            "placements loaded"
        );
        Ok(LoadedPlacements {
            origin,
            outcome,
            guidance,
            share_email,
            sheet_links,
        })
    }

    pub async fn snapshot(&self, query: &SnapshotQuery, today: NaiveDate) -> Result<DashboardSnapshot> {
        let loaded = self.load().await?;
        Ok(DashboardSnapshot::build(&loaded, query, today)?)
    }

    pub async fn run_once(&self, period: Period) -> Result<SyncRunSummary> {
        self.run_once_at(period, Local::now().date_naive()).await
    }

    /// `run_once` with an explicit "today" for period resolution.
    pub async fn run_once_at(&self, period: Period, today: NaiveDate) -> Result<SyncRunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let loaded = self.load().await?;
        let query = SnapshotQuery {
            period,
            ..SnapshotQuery::default()
        };
        let snapshot = DashboardSnapshot::build(&loaded, &query, today)?;
        let in_period = filter_by_period(&loaded.outcome.records, &snapshot.range);
        let finished_at = Utc::now();

        let run = RunRecord {
            run_id,
            started_at,
            finished_at,
            range: snapshot.range,
            origin: loaded.origin.clone(),
            sources: loaded.outcome.sources.clone(),
        };
        let reports_dir = self.write_reports(&run, &snapshot, &in_period).await?;
        let manifest_path = export_parquet_snapshots(&reports_dir, &in_period, &snapshot).await?;

        let summary = SyncRunSummary {
            run_id,
            started_at,
            finished_at,
            range: snapshot.range,
            origin: loaded.origin,
            loaded_records: snapshot.total_records,
            period_records: snapshot.period_records,
            failed_sources: loaded.outcome.failed_sources().count(),
            reports_dir: reports_dir.display().to_string(),
            parquet_manifest: manifest_path.display().to_string(),
        };
        info!(run_id = %summary.run_id, period_records = summary.period_records, "sync run finished");
        Ok(summary)
    }

    async fn write_reports(
        &self,
        run: &RunRecord,
        snapshot: &DashboardSnapshot,
        in_period: &[CanonicalRecord],
    ) -> Result<PathBuf> {
        let reports_dir = self.config.reports_dir.join(run.run_id.to_string());
        fs::create_dir_all(reports_dir.join(SNAPSHOTS_DIR))
            .await
            .with_context(|| format!("creating {}", reports_dir.display()))?;

        fs::write(reports_dir.join(DAILY_BRIEF_FILE), daily_brief(run, snapshot))
            .await
            .context("writing daily_brief.md")?;

        let placements = serde_json::to_vec_pretty(&serde_json::json!({
            "run": run,
            "snapshot": snapshot,
            "placements": in_period,
        }))
        .context("serializing placements")?;
        fs::write(reports_dir.join(PLACEMENTS_FILE), placements)
            .await
            .context("writing placements.json")?;

        Ok(reports_dir)
    }
}

fn import_uploads(files: &[PathBuf]) -> Result<LoadOutcome> {
    let accepted = vec![ACCEPTED_STATUS.to_string()];
    let mut outcome = LoadOutcome::default();
    for path in files {
        let name = upload_name(path);
        let imported = import_csv(path, &name, Some(&accepted))
            .with_context(|| format!("importing {}", path.display()))?;
        let stats = imported.stats;
        info!(source = %name, loaded = stats.loaded, donors = imported.donors.len(), "csv imported");
        outcome.records.extend(imported.records);
        outcome.donors.extend(imported.donors);
        outcome.sources.push(SourceLoad {
            name,
            stats,
            error: None,
        });
    }
    Ok(outcome)
}

fn upload_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn daily_brief(run: &RunRecord, snapshot: &DashboardSnapshot) -> String {
    let list = |counts: &[linkboard_core::KeyCount]| {
        if counts.is_empty() {
            return "- none".to_string();
        }
        counts
            .iter()
            .map(|c| format!("- {}: {}", c.key, c.count))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let sources = run
        .sources
        .iter()
        .map(|s| match &s.error {
            Some(err) => format!("- {}: failed ({err})", s.name),
            None => format!(
                "- {}: {} loaded, {} rejected, {} undated",
                s.name, s.stats.loaded, s.stats.rejected, s.stats.undated
            ),
        })
        .collect::<Vec<_>>()
        .join("\n");
    let notice = snapshot
        .notice
        .as_ref()
        .map(|n| format!("\n> {}\n", n.message.replace('\n', "\n> ")))
        .unwrap_or_default();

    format!(
        "# Link Placement Daily Brief\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- Data: {}\n- {}\n- Loaded records: {}\n{notice}\n## By Employee\n{}\n\n## By Project\n{}\n\n## Sources\n{}\n",
        run.run_id,
        run.started_at,
        run.finished_at,
        run.origin,
        snapshot.caption(),
        snapshot.total_records,
        list(&snapshot.by_employee),
        list(&snapshot.by_project),
        sources,
    )
}

pub async fn run_sync_once_from_env(period: Period) -> Result<SyncRunSummary> {
    SyncPipeline::new(SyncConfig::from_env()).run_once(period).await
}
