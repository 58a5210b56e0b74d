use crate::{SourceConfig, ACCEPTED_STATUS};

fn accepted() -> Option<Vec<String>> {
    Some(vec![ACCEPTED_STATUS.to_string()])
}

pub(crate) fn builtin_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            spreadsheet_id: "1DaiRFqU2d_85cXr0fDmyhzIY4V9fm0zxh4KraZMOFnw".into(),
            sheet: "СНГ Outreach".into(),
            name: "MR Anchors".into(),
            status_col: Some(1),
            project_col: 3,
            version_col: 4,
            employee_col: 5,
            date_col: 8,
            status_ok: accepted(),
        },
        SourceConfig {
            spreadsheet_id: "1v_cheF0k0UCl9CniUWu-pTTYbl0CIOjE0BH0rzW3HXE".into(),
            sheet: "Размещенные ссылки".into(),
            name: "Основная РФ и СНГ".into(),
            status_col: None,
            project_col: 1,
            version_col: 2,
            employee_col: 3,
            date_col: 6,
            status_ok: None,
        },
        SourceConfig {
            spreadsheet_id: "1S5lk-ya4iWwq5znY_vebAuTqloyTlWTcsNuXydZXT00".into(),
            sheet: "Outreach".into(),
            name: "TelecomAsia".into(),
            status_col: Some(4),
            project_col: 1,
            version_col: 2,
            employee_col: 3,
            date_col: 5,
            status_ok: accepted(),
        },
        SourceConfig {
            spreadsheet_id: "1yj3eWqTpjxZFU0e9yg5A6TIh79N-s9g1Zmz3U-Q_54E".into(),
            sheet: "Posted links".into(),
            name: "International".into(),
            status_col: Some(4),
            project_col: 1,
            version_col: 2,
            employee_col: 3,
            date_col: 5,
            status_ok: accepted(),
        },
    ]
}
