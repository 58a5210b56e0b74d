//! Everything the dashboard shows for one period, computed in one pass.

use chrono::{DateTime, NaiveDate, Utc};
use linkboard_adapters::SourceLoad;
use linkboard_core::period::PeriodError;
use linkboard_core::{
    count_by_employee, count_by_project, cross_tab, cross_tab_with_donors, filter_by_period,
    last_placements, CanonicalRecord, DonorRecord, CrossTab, DateRange, KeyCount, Period, SourceConfig,
};
use serde::{Deserialize, Serialize};

use crate::pipeline::{DataOrigin, LoadedPlacements};

pub const DEFAULT_RECENT_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotQuery {
    pub period: Period,
    /// Narrow the recent-placements list to one employee.
    pub employee: Option<String>,
    pub project: Option<String>,
    pub recent_limit: usize,
}

impl Default for SnapshotQuery {
    fn default() -> Self {
        Self {
            period: Period::default(),
            employee: None,
            project: None,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLink {
    pub name: String,
    pub url: String,
}

impl SheetLink {
    pub fn for_source(cfg: &SourceConfig) -> Self {
        Self {
            name: format!("{} ({})", cfg.name, cfg.sheet),
            url: format!("https://docs.google.com/spreadsheets/d/{}/edit", cfg.spreadsheet_id),
        }
    }
}

/// Shown instead of the views when nothing at all was loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataNotice {
    pub message: String,
    pub share_email: Option<String>,
    pub sheet_links: Vec<SheetLink>,
}

impl DataNotice {
    pub fn for_empty_load(loaded: &LoadedPlacements) -> Self {
        let message = match (&loaded.guidance, &loaded.share_email) {
            (Some(guidance), _) => format!("No data loaded.\n{guidance}"),
            (None, Some(email)) => format!(
                "No data. Share each source spreadsheet with {email} (Viewer) and reload."
            ),
            (None, None) => "No data. Put service_account.json in the project root, \
                             set GOOGLE_SHEETS_ACCESS_TOKEN, or import a CSV export."
                .to_string(),
        };
        Self {
            message,
            share_email: loaded.share_email.clone(),
            sheet_links: loaded.sheet_links.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub range: DateRange,
    pub origin: DataOrigin,
    /// Records loaded before the period filter.
    pub total_records: usize,
    pub period_records: usize,
    pub by_employee: Vec<KeyCount>,
    pub by_project: Vec<KeyCount>,
    pub matrix: CrossTab,
    pub recent: Vec<CanonicalRecord>,
    pub sources: Vec<SourceLoad>,
    pub notice: Option<DataNotice>,
}

impl DashboardSnapshot {
    pub fn build(
        loaded: &LoadedPlacements,
        query: &SnapshotQuery,
        today: NaiveDate,
    ) -> Result<Self, PeriodError> {
        let range = query.period.resolve(today)?;
        let all = &loaded.outcome.records;
        let in_period = filter_by_period(all, &range);
        let notice = all.is_empty().then(|| DataNotice::for_empty_load(loaded));
        let matrix = if loaded.outcome.donors.is_empty() {
            cross_tab(&in_period)
        } else {
            let donors = loaded
                .outcome
                .donors
                .iter()
                .filter(|d| range.contains(d.date))
                .cloned()
                .collect::<Vec<DonorRecord>>();
            cross_tab_with_donors(&in_period, &donors)
        };

        Ok(Self {
            generated_at: Utc::now(),
            range,
            origin: loaded.origin.clone(),
            total_records: all.len(),
            period_records: in_period.len(),
            by_employee: count_by_employee(&in_period),
            by_project: count_by_project(&in_period),
            matrix,
            recent: last_placements(
                &in_period,
                query.recent_limit,
                query.employee.as_deref(),
                query.project.as_deref(),
            ),
            sources: loaded.outcome.sources.clone(),
            notice,
        })
    }

    pub fn caption(&self) -> String {
        format!("Period: {}. Records: {}", self.range, self.period_records)
    }

    /// Data exists but none of it falls in the period.
    pub fn is_period_empty(&self) -> bool {
        self.notice.is_none() && self.period_records == 0
    }
}
