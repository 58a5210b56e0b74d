//! Row normalization: raw spreadsheet cells to placements.

use thiserror::Error;

use crate::date::parse_date;
use crate::{RawPlacement, SourceConfig, PLACEHOLDER};

/// Why a row did not produce a placement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("row has no column {index}")]
    MissingColumn { index: usize },
    #[error("row has neither employee nor project")]
    Empty,
    #[error("status {0:?} is not accepted")]
    Status(String),
}

fn cell(row: &[String], index: usize) -> Result<&str, RowRejection> {
    row.get(index)
        .map(|value| value.trim())
        .ok_or(RowRejection::MissingColumn { index })
}

/// `"{project} {version}"` when a version is present.
pub fn project_label(project: &str, version: &str) -> String {
    let label = if version.is_empty() {
        project.to_string()
    } else {
        format!("{project} {version}").trim().to_string()
    };
    or_placeholder(label)
}

pub(crate) fn or_placeholder(value: String) -> String {
    if value.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        value
    }
}

/// Map one positional row onto a placement using the source's column layout.
pub fn normalize_row(row: &[String], cfg: &SourceConfig) -> Result<RawPlacement, RowRejection> {
    let employee = cell(row, cfg.employee_col)?;
    let project = cell(row, cfg.project_col)?;
    let version = cell(row, cfg.version_col)?;
    let date = cell(row, cfg.date_col)?;

    if employee.is_empty() && project.is_empty() {
        return Err(RowRejection::Empty);
    }

    if let Some((status_col, accepted)) = cfg.status_filter() {
        let status = cell(row, status_col)?;
        if !accepted.iter().any(|ok| ok == status) {
            return Err(RowRejection::Status(status.to_string()));
        }
    }

    Ok(RawPlacement {
        employee: or_placeholder(employee.to_string()),
        project: project_label(project, version),
        date: parse_date(date),
        source: cfg.name.clone(),
    })
}
