//! Core domain model for link-placement tracking.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod date;
pub mod normalize;
pub mod period;
pub mod price;
mod sources;

pub use aggregate::{
    count_by_employee, count_by_project, cross_tab, cross_tab_with_donors, filter_by_period,
    last_placements, CrossTab, KeyCount,
};
pub use date::parse_date;
pub use normalize::{normalize_row, RowRejection};
pub use period::{DateRange, Period};

pub const CRATE_NAME: &str = "linkboard-core";

/// Stand-in for a blank employee or project cell.
pub const PLACEHOLDER: &str = "—";

/// Status value the production sheets use for a finished placement.
pub const ACCEPTED_STATUS: &str = "Готово";

/// A placement as it comes out of the row normalizer; the date may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPlacement {
    pub employee: String,
    pub project: String,
    pub date: Option<NaiveDate>,
    pub source: String,
}

impl RawPlacement {
    /// Promote into the aggregation table. Undated placements have no place there.
    pub fn into_record(self) -> Option<CanonicalRecord> {
        let date = self.date?;
        Some(CanonicalRecord {
            employee: self.employee,
            project: self.project,
            date,
            source: self.source,
        })
    }
}

/// Canonical placement entry consumed by every aggregate and view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub employee: String,
    pub project: String,
    pub date: NaiveDate,
    pub source: String,
}

/// Donor site of one accepted placement, feeding the unique-donor column of
/// the matrix. Only header-addressed exports with a donor column carry these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorRecord {
    pub employee: String,
    pub donor: String,
    pub date: NaiveDate,
}

/// Positional description of one input sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub spreadsheet_id: String,
    pub sheet: String,
    pub name: String,
    #[serde(default)]
    pub status_col: Option<usize>,
    pub project_col: usize,
    pub version_col: usize,
    pub employee_col: usize,
    pub date_col: usize,
    #[serde(default)]
    pub status_ok: Option<Vec<String>>,
}

impl SourceConfig {
    /// Accepted statuses when the source filters on status at all.
    pub fn status_filter(&self) -> Option<(usize, &[String])> {
        let col = self.status_col?;
        match self.status_ok.as_deref() {
            Some(ok) if !ok.is_empty() => Some((col, ok)),
            _ => None,
        }
    }
}

/// Immutable list of configured sources handed to loaders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTable {
    sources: Vec<SourceConfig>,
}

impl SourceTable {
    pub fn new(sources: Vec<SourceConfig>) -> Self {
        Self { sources }
    }

    /// The four production sheets.
    pub fn builtin() -> Self {
        Self::new(sources::builtin_sources())
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources picked by index; `None` selects all. Out-of-range indices are ignored.
    pub fn select(&self, which: Option<&[usize]>) -> Vec<&SourceConfig> {
        match which {
            None => self.sources.iter().collect(),
            Some(indices) => indices
                .iter()
                .filter_map(|&i| self.sources.get(i))
                .collect(),
        }
    }
}

/// Outcome of checking one page for an anchor link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    Found,
    NotFound(String),
    FetchError(String),
}

impl MatchResult {
    pub fn verdict(&self) -> Verdict {
        match self {
            MatchResult::Found => Verdict::Yes,
            MatchResult::NotFound(_) => Verdict::No,
            MatchResult::FetchError(_) => Verdict::Error,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            MatchResult::Found => None,
            MatchResult::NotFound(reason) => Some(reason),
            MatchResult::FetchError(message) => Some(message),
        }
    }
}

/// Value written into the `Found` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Yes,
    No,
    Error,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Yes => "Yes",
            Verdict::No => "No",
            Verdict::Error => "Error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
