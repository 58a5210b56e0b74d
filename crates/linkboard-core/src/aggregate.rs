//! Group-by and pivot views over the placement table.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::period::DateRange;
use crate::{CanonicalRecord, DonorRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCount {
    pub key: String,
    pub count: usize,
}

fn count_by<F>(records: &[CanonicalRecord], key: F) -> Vec<KeyCount>
where
    F: Fn(&CanonicalRecord) -> &str,
{
    let mut counts = BTreeMap::<&str, usize>::new();
    for record in records {
        *counts.entry(key(record)).or_default() += 1;
    }
    let mut out = counts
        .into_iter()
        .map(|(key, count)| KeyCount {
            key: key.to_string(),
            count,
        })
        .collect::<Vec<_>>();
    // stable: equal counts stay in key order
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

/// Placements per employee, busiest first.
pub fn count_by_employee(records: &[CanonicalRecord]) -> Vec<KeyCount> {
    count_by(records, |r| r.employee.as_str())
}

/// Placements per project label, busiest first.
pub fn count_by_project(records: &[CanonicalRecord]) -> Vec<KeyCount> {
    count_by(records, |r| r.project.as_str())
}

/// Employee × project matrix with a per-row total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CrossTab {
    pub employees: Vec<String>,
    pub projects: Vec<String>,
    /// `cells[row][col]`, rows follow `employees`, columns follow `projects`.
    pub cells: Vec<Vec<usize>>,
    pub totals: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_donors: Option<Vec<usize>>,
}

impl CrossTab {
    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }

    pub fn cell(&self, employee: &str, project: &str) -> Option<usize> {
        let row = self.employees.iter().position(|e| e == employee)?;
        let col = self.projects.iter().position(|p| p == project)?;
        Some(self.cells[row][col])
    }

    pub fn total(&self, employee: &str) -> Option<usize> {
        let row = self.employees.iter().position(|e| e == employee)?;
        Some(self.totals[row])
    }
}

pub fn cross_tab(records: &[CanonicalRecord]) -> CrossTab {
    let employees = records
        .iter()
        .map(|r| r.employee.as_str())
        .collect::<BTreeSet<_>>();
    let projects = records
        .iter()
        .map(|r| r.project.as_str())
        .collect::<BTreeSet<_>>();

    let row_of = employees
        .iter()
        .enumerate()
        .map(|(i, e)| (*e, i))
        .collect::<HashMap<_, _>>();
    let col_of = projects
        .iter()
        .enumerate()
        .map(|(i, p)| (*p, i))
        .collect::<HashMap<_, _>>();

    let mut cells = vec![vec![0usize; projects.len()]; employees.len()];
    for record in records {
        cells[row_of[record.employee.as_str()]][col_of[record.project.as_str()]] += 1;
    }
    let totals = cells.iter().map(|row| row.iter().sum()).collect();

    CrossTab {
        employees: employees.into_iter().map(ToString::to_string).collect(),
        projects: projects.into_iter().map(ToString::to_string).collect(),
        cells,
        totals,
        unique_donors: None,
    }
}

/// `cross_tab` plus the number of distinct non-empty donors per employee.
pub fn cross_tab_with_donors(records: &[CanonicalRecord], donors: &[DonorRecord]) -> CrossTab {
    let mut per_employee = HashMap::<&str, BTreeSet<&str>>::new();
    for d in donors {
        let donor = d.donor.trim();
        if donor.is_empty() {
            continue;
        }
        per_employee
            .entry(d.employee.as_str())
            .or_default()
            .insert(donor);
    }

    let mut table = cross_tab(records);
    table.unique_donors = Some(
        table
            .employees
            .iter()
            .map(|e| per_employee.get(e.as_str()).map_or(0, BTreeSet::len))
            .collect(),
    );
    table
}

/// Newest `n` placements, optionally narrowed to one employee and/or project.
pub fn last_placements(
    records: &[CanonicalRecord],
    n: usize,
    employee: Option<&str>,
    project: Option<&str>,
) -> Vec<CanonicalRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted
        .into_iter()
        .filter(|r| employee.map_or(true, |e| r.employee == e))
        .filter(|r| project.map_or(true, |p| r.project == p))
        .take(n)
        .collect()
}

/// Records dated inside the inclusive range.
pub fn filter_by_period(records: &[CanonicalRecord], range: &DateRange) -> Vec<CanonicalRecord> {
    records
        .iter()
        .filter(|r| range.contains(r.date))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    fn rec(employee: &str, project: &str, day: u32) -> CanonicalRecord {
        CanonicalRecord {
            employee: employee.into(),
            project: project.into(),
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            source: "test".into(),
        }
    }

    fn sample() -> Vec<CanonicalRecord> {
        vec![
            rec("Anna", "Alpha", 1),
            rec("Boris", "Alpha", 2),
            rec("Anna", "Beta", 3),
            rec("Anna", "Alpha", 4),
            rec("Clara", "Gamma", 5),
        ]
    }

    #[test]
    fn counts_sort_descending_and_sum_to_input() {
        let by_emp = count_by_employee(&sample());
        assert_eq!(by_emp[0], KeyCount { key: "Anna".into(), count: 3 });
        assert_eq!(by_emp.iter().map(|k| k.count).sum::<usize>(), 5);
        // ties in key order
        assert_eq!(by_emp[1].key, "Boris");
        assert_eq!(by_emp[2].key, "Clara");

        let by_proj = count_by_project(&sample());
        assert_eq!(by_proj[0], KeyCount { key: "Alpha".into(), count: 3 });
        assert_eq!(by_proj.iter().map(|k| k.count).sum::<usize>(), 5);
    }

    #[test]
    fn empty_input_yields_empty_views() {
        assert!(count_by_employee(&[]).is_empty());
        assert!(count_by_project(&[]).is_empty());
        assert!(cross_tab(&[]).is_empty());
        assert!(last_placements(&[], 10, None, None).is_empty());
    }

    #[test]
    fn cross_tab_fills_zeros_and_totals_rows() {
        let records = sample();
        let table = cross_tab(&records);
        assert_eq!(table.employees, vec!["Anna", "Boris", "Clara"]);
        assert_eq!(table.projects, vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(table.cell("Anna", "Alpha"), Some(2));
        assert_eq!(table.cell("Boris", "Gamma"), Some(0));

        for entry in count_by_employee(&records) {
            assert_eq!(table.total(&entry.key), Some(entry.count));
        }
        assert!(table.unique_donors.is_none());
    }

    #[test]
    fn donor_column_counts_distinct_non_empty_values() {
        let donor = |employee: &str, donor: &str| DonorRecord {
            employee: employee.into(),
            donor: donor.into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        };
        let donors = vec![
            donor("Anna", "site-a.com"),
            donor("Anna", "site-a.com"),
            donor("Anna", "site-b.com"),
            donor("Boris", "  "),
            donor("Zed", "site-z.com"),
        ];
        let table = cross_tab_with_donors(&sample(), &donors);
        assert_eq!(table.unique_donors, Some(vec![2, 0, 0]));
    }

    #[test]
    fn last_placements_sorts_then_filters_then_truncates() {
        let records = sample();
        let newest = last_placements(&records, 2, None, None);
        assert_eq!(newest.iter().map(|r| r.date.day()).collect::<Vec<_>>(), vec![5, 4]);

        let anna_alpha = last_placements(&records, 10, Some("Anna"), Some("Alpha"));
        assert_eq!(anna_alpha.len(), 2);
        assert!(anna_alpha[0].date > anna_alpha[1].date);

        assert!(last_placements(&records, 10, Some("Nobody"), None).is_empty());
    }

    #[test]
    fn period_filter_is_inclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 2),
            NaiveDate::from_ymd_opt(2024, 3, 4),
        );
        let kept = filter_by_period(&sample(), &range);
        assert_eq!(kept.len(), 3);

        let open_start = DateRange::new(None, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(filter_by_period(&sample(), &open_start).len(), 1);

        assert_eq!(filter_by_period(&sample(), &DateRange::unbounded()).len(), 5);
    }
}
