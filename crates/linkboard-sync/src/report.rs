//! Summaries over past runs in `reports/`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::export::{MANIFEST_FILE, SNAPSHOTS_DIR};
use crate::pipeline::{RunRecord, DAILY_BRIEF_FILE, PLACEMENTS_FILE};

/// One past run, read back from its `placements.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunDigest {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub period: String,
    pub origin: String,
    pub period_records: usize,
    pub total_records: usize,
    pub failed_sources: usize,
    #[serde(skip)]
    pub dir: PathBuf,
}

#[derive(Deserialize)]
struct StoredRun {
    run: RunRecord,
    snapshot: StoredSnapshot,
}

#[derive(Deserialize)]
struct StoredSnapshot {
    total_records: usize,
    period_records: usize,
}

/// Newest `runs` runs under `<root>/reports`, newest first. Runs whose
/// `placements.json` cannot be read are logged and left out.
pub fn recent_runs(runs: usize, workspace_root: Option<PathBuf>) -> Result<Vec<RunDigest>> {
    let root = workspace_root.unwrap_or_else(|| PathBuf::from("."));
    let reports_root = root.join("reports");
    if !reports_root.exists() {
        return Ok(Vec::new());
    }

    let mut digests = Vec::new();
    for entry in std::fs::read_dir(&reports_root)
        .with_context(|| format!("reading {}", reports_root.display()))?
    {
        let entry = entry.with_context(|| format!("reading {}", reports_root.display()))?;
        let dir = entry.path();
        let placements = dir.join(PLACEMENTS_FILE);
        if !dir.is_dir() || !placements.exists() {
            continue;
        }
        match read_digest(&dir, &placements) {
            Ok(digest) => digests.push(digest),
            Err(err) => warn!(dir = %dir.display(), error = %format!("{err:#}"), "skipping unreadable run"),
        }
    }
    digests.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    digests.truncate(runs.max(1));
    Ok(digests)
}

fn read_digest(dir: &Path, placements: &Path) -> Result<RunDigest> {
    let text = std::fs::read_to_string(placements)
        .with_context(|| format!("reading {}", placements.display()))?;
    let stored: StoredRun =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", placements.display()))?;
    Ok(RunDigest {
        run_id: stored.run.run_id.to_string(),
        started_at: stored.run.started_at,
        period: stored.run.range.to_string(),
        origin: stored.run.origin.to_string(),
        period_records: stored.snapshot.period_records,
        total_records: stored.snapshot.total_records,
        failed_sources: stored.run.sources.iter().filter(|s| s.error.is_some()).count(),
        dir: dir.to_path_buf(),
    })
}

pub fn report_daily_markdown(runs: usize, workspace_root: Option<PathBuf>) -> Result<String> {
    let digests = recent_runs(runs, workspace_root)?;

    let mut lines = vec!["# Link Placement Runs".to_string(), String::new()];
    if digests.is_empty() {
        lines.push("No runs recorded yet.".to_string());
    }
    for run in digests {
        let daily_path = run.dir.join(DAILY_BRIEF_FILE);
        let manifest_path = run.dir.join(SNAPSHOTS_DIR).join(MANIFEST_FILE);

        lines.push(format!("## Run `{}`", run.run_id));
        lines.push(format!("- started: {}", run.started_at));
        lines.push(format!("- period: {}", run.period));
        lines.push(format!("- data: {}", run.origin));
        lines.push(format!("- records in period: {}", run.period_records));
        lines.push(format!("- records loaded: {}", run.total_records));
        if run.failed_sources > 0 {
            lines.push(format!("- failed sources: {}", run.failed_sources));
        }
        if daily_path.exists() {
            lines.push(format!("- daily brief: `{}`", daily_path.display()));
        }
        if manifest_path.exists() {
            lines.push(format!("- parquet manifest: `{}`", manifest_path.display()));
        }
        lines.push(String::new());
    }

    Ok(lines.join("\n"))
}

/// Same runs as `report_daily_markdown`, one CSV row each.
pub fn report_runs_csv(runs: usize, workspace_root: Option<PathBuf>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for run in recent_runs(runs, workspace_root)? {
        writer.serialize(&run).context("writing run row")?;
    }
    let bytes = writer.into_inner().context("flushing csv")?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}
