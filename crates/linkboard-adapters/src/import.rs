//! Header-addressed CSV exports.
//!
//! Uploaded exports do not share the positional layout of the production
//! sheets, so columns are located by name. Sheets exports tend to carry line
//! breaks inside header cells, which is why names are normalized first.

use std::path::Path;

use linkboard_core::normalize::project_label;
use linkboard_core::{parse_date, CanonicalRecord, DonorRecord, RawPlacement, PLACEHOLDER};
use linkboard_storage::{read_csv_table, CsvTable, TableError};
use tracing::{debug, warn};

use crate::load::LoadStats;

const EMPLOYEE_HEADERS: &[&str] = &["Линкбилдер", "Linkbuilder", "Сотрудник"];
const PROJECT_HEADERS: &[&str] = &["Проект", "Project"];
const VERSION_HEADERS: &[&str] = &["Версия", "Версия проекта"];
const DATE_HEADERS: &[&str] = &["Дата публикации", "Date of posting", "Date", "Дата"];
const STATUS_HEADERS: &[&str] = &["Status", "Статус"];
const DONOR_HEADERS: &[&str] = &["Донор", "Donor", "Сайт донора", "Donor site"];

pub fn normalize_header(header: &str) -> String {
    header.replace("\r\n", " ").replace('\n', " ").trim().to_string()
}

/// Column positions found in a header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderColumns {
    pub employee: Option<usize>,
    pub project: Option<usize>,
    pub version: Option<usize>,
    pub date: Option<usize>,
    pub status: Option<usize>,
    pub donor: Option<usize>,
}

impl HeaderColumns {
    pub fn locate(headers: &[String]) -> Self {
        let normalized = headers.iter().map(|h| normalize_header(h)).collect::<Vec<_>>();
        let find = |candidates: &[&str]| {
            candidates
                .iter()
                .find_map(|c| normalized.iter().position(|h| h.as_str() == *c))
        };
        Self {
            employee: find(EMPLOYEE_HEADERS),
            project: find(PROJECT_HEADERS),
            version: find(VERSION_HEADERS),
            date: find(DATE_HEADERS),
            status: find(STATUS_HEADERS),
            donor: find(DONOR_HEADERS),
        }
    }
}

/// Output of one header-addressed import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedRows {
    pub records: Vec<CanonicalRecord>,
    /// One per loaded record with a non-empty donor cell.
    pub donors: Vec<DonorRecord>,
    pub stats: LoadStats,
}

/// Records from a header-addressed table. Without an employee or date column
/// there is nothing to load. `status_ok` filters only when the table has a
/// status column.
pub fn records_from_table(table: &CsvTable, source_name: &str, status_ok: Option<&[String]>) -> ImportedRows {
    let columns = HeaderColumns::locate(&table.headers);
    let mut out = ImportedRows::default();
    let (Some(employee_col), Some(date_col)) = (columns.employee, columns.date) else {
        warn!(source = source_name, "export has no employee or date column");
        return out;
    };
    let stats = &mut out.stats;
    let status_filter = match (status_ok, columns.status) {
        (Some(ok), Some(col)) if !ok.is_empty() => Some((col, ok)),
        (Some(ok), None) if !ok.is_empty() => {
            debug!(source = source_name, "no status column; status filter skipped");
            None
        }
        _ => None,
    };

    let opt_cell = move |row: usize, col: Option<usize>| col.map_or("", |c| table.get(row, c).trim());
    for idx in 0..table.rows.len() {
        stats.rows += 1;
        let employee = table.get(idx, employee_col).trim();
        let project = opt_cell(idx, columns.project);
        if employee.is_empty() && project.is_empty() {
            stats.rejected += 1;
            continue;
        }
        if let Some((col, ok)) = status_filter {
            let status = table.get(idx, col).trim();
            if !ok.iter().any(|s| s == status) {
                stats.rejected += 1;
                continue;
            }
        }
        let raw = RawPlacement {
            employee: if employee.is_empty() {
                PLACEHOLDER.to_string()
            } else {
                employee.to_string()
            },
            project: project_label(project, opt_cell(idx, columns.version)),
            date: parse_date(table.get(idx, date_col)),
            source: source_name.to_string(),
        };
        match raw.into_record() {
            Some(record) => {
                stats.loaded += 1;
                let donor = opt_cell(idx, columns.donor);
                if !donor.is_empty() {
                    out.donors.push(DonorRecord {
                        employee: record.employee.clone(),
                        donor: donor.to_string(),
                        date: record.date,
                    });
                }
                out.records.push(record);
            }
            None => stats.undated += 1,
        }
    }
    out
}

pub fn import_csv(
    path: impl AsRef<Path>,
    source_name: &str,
    status_ok: Option<&[String]>,
) -> Result<ImportedRows, TableError> {
    let table = read_csv_table(path)?;
    Ok(records_from_table(&table, source_name, status_ok))
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkboard_core::ACCEPTED_STATUS;
    use tempfile::tempdir;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn headers_with_line_breaks_are_matched() {
        let cols = HeaderColumns::locate(&strings(&[
            "Статус",
            "Дата\nпубликации",
            " Проект ",
            "Версия проекта",
            "Linkbuilder",
        ]));
        assert_eq!(
            cols,
            HeaderColumns {
                employee: Some(4),
                project: Some(2),
                version: Some(3),
                date: Some(1),
                status: Some(0),
                donor: None,
            }
        );
    }

    #[test]
    fn candidate_order_decides_between_two_date_columns() {
        let cols = HeaderColumns::locate(&strings(&["Date", "Date of posting", "Сотрудник"]));
        assert_eq!(cols.date, Some(1));
        assert_eq!(cols.employee, Some(2));
    }

    #[test]
    fn missing_date_column_loads_nothing() {
        let table = CsvTable::from_rows(vec![strings(&["Linkbuilder", "Project"]), strings(&["Ann", "Acme"])]);
        let imported = records_from_table(&table, "upload", None);
        assert!(imported.records.is_empty());
        assert_eq!(imported.stats.rows, 0);
    }

    #[test]
    fn imports_export_with_status_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export.csv");
        std::fs::write(
            &path,
            "Status,Project,Версия,Linkbuilder,\"Date\nof posting\"\n\
             Готово,Acme,v2,Ann,15.03.2024\n\
             Draft,Acme,,Bob,15.03.2024\n\
             Готово,,,,15.03.2024\n\
             Готово,Beta,,,2024-03-20\n\
             Готово,Beta,,Ann,\n",
        )
        .unwrap();

        let ok = vec![ACCEPTED_STATUS.to_string()];
        let ImportedRows { records, donors, stats } = import_csv(&path, "upload", Some(&ok)).unwrap();
        assert!(donors.is_empty());
        assert_eq!(
            stats,
            LoadStats {
                rows: 5,
                loaded: 2,
                rejected: 2,
                undated: 1
            }
        );
        assert_eq!(records[0].project, "Acme v2");
        assert_eq!(records[1].employee, PLACEHOLDER);
        assert!(records.iter().all(|r| r.source == "upload"));

        let unfiltered = import_csv(&path, "upload", None).unwrap();
        assert_eq!(unfiltered.records.len(), 3);
    }

    #[test]
    fn donor_column_follows_accepted_rows() {
        let table = CsvTable::from_rows(vec![
            strings(&["Статус", "Проект", "Линкбилдер", "Донор", "Дата публикации"]),
            strings(&["Готово", "Acme", "Ann", "site-a.ru", "01.03.2024"]),
            strings(&["Готово", "Acme", "Ann", "", "02.03.2024"]),
            strings(&["Черновик", "Acme", "Bob", "site-b.ru", "02.03.2024"]),
            strings(&["Готово", "Beta", "Bob", "site-c.ru", ""]),
        ]);
        let ok = vec![ACCEPTED_STATUS.to_string()];
        let imported = records_from_table(&table, "upload", Some(&ok));
        assert_eq!(imported.records.len(), 2);
        assert_eq!(imported.donors.len(), 1);
        assert_eq!(imported.donors[0].employee, "Ann");
        assert_eq!(imported.donors[0].donor, "site-a.ru");
        assert_eq!(imported.donors[0].date, imported.records[0].date);
    }
}
