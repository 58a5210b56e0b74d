//! Raw cell grids to canonical records.

use linkboard_core::{normalize_row, CanonicalRecord, DonorRecord, SourceConfig, SourceTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::source::RowSource;

/// What happened to the data rows of one or more sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    pub rows: usize,
    pub loaded: usize,
    pub rejected: usize,
    pub undated: usize,
}

impl LoadStats {
    pub fn merge(&mut self, other: LoadStats) {
        self.rows += other.rows;
        self.loaded += other.loaded;
        self.rejected += other.rejected;
        self.undated += other.undated;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLoad {
    pub name: String,
    pub stats: LoadStats,
    /// Set when the source could not be read at all.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub records: Vec<CanonicalRecord>,
    pub sources: Vec<SourceLoad>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub donors: Vec<DonorRecord>,
}

impl LoadOutcome {
    pub fn totals(&self) -> LoadStats {
        let mut total = LoadStats::default();
        for source in &self.sources {
            total.merge(source.stats);
        }
        total
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceLoad> {
        self.sources.iter().filter(|s| s.error.is_some())
    }
}

/// Normalize every row after the header. A grid with fewer than two rows has no data.
pub fn records_from_rows(rows: &[Vec<String>], cfg: &SourceConfig) -> (Vec<CanonicalRecord>, LoadStats) {
    let mut stats = LoadStats::default();
    let mut records = Vec::new();
    for row in rows.iter().skip(1) {
        stats.rows += 1;
        match normalize_row(row, cfg) {
            Ok(raw) => match raw.into_record() {
                Some(record) => {
                    stats.loaded += 1;
                    records.push(record);
                }
                None => stats.undated += 1,
            },
            Err(rejection) => {
                debug!(source = %cfg.name, %rejection, "row rejected");
                stats.rejected += 1;
            }
        }
    }
    (records, stats)
}

/// Load the selected sources one after another. A source that fails to read is
/// recorded in the outcome and the rest still load.
pub async fn load_sources(
    source: &dyn RowSource,
    table: &SourceTable,
    which: Option<&[usize]>,
) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    for cfg in table.select(which) {
        match source.read_rows(cfg).await {
            Ok(rows) => {
                let (records, stats) = records_from_rows(&rows, cfg);
                info!(
                    source = %cfg.name,
                    kind = source.kind(),
                    loaded = stats.loaded,
                    rejected = stats.rejected,
                    undated = stats.undated,
                    "source loaded"
                );
                outcome.records.extend(records);
                outcome.sources.push(SourceLoad {
                    name: cfg.name.clone(),
                    stats,
                    error: None,
                });
            }
            Err(err) => {
                warn!(source = %cfg.name, kind = source.kind(), error = %err, "source failed to load");
                outcome.sources.push(SourceLoad {
                    name: cfg.name.clone(),
                    stats: LoadStats::default(),
                    error: Some(err.to_string()),
                });
            }
        }
    }
    outcome
}
