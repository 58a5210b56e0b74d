//! Axum + Askama dashboard over the placement snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Local, NaiveDate};
use linkboard_core::{KeyCount, Period};
use linkboard_sync::{DashboardSnapshot, LoadedPlacements, SheetLink, SnapshotQuery, SyncConfig, SyncPipeline};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const CRATE_NAME: &str = "linkboard-web";

pub const DEFAULT_RECENT: usize = 30;
pub const MAX_EMPLOYEE_BARS: usize = 30;
pub const MAX_PROJECT_BARS: usize = 25;
pub const MAX_SHARE_SLICES: usize = 15;
/// One page view fires four requests; they all share a single load.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

struct CachedLoad {
    at: Instant,
    loaded: Arc<LoadedPlacements>,
}

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<SyncPipeline>,
    /// Fixed "today" for period resolution; the local date when unset.
    today: Option<NaiveDate>,
    cache: Arc<Mutex<Option<CachedLoad>>>,
    cache_ttl: Duration,
}

impl AppState {
    pub fn new(pipeline: SyncPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            today: None,
            cache: Arc::new(Mutex::new(None)),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// `Duration::ZERO` reloads the sources on every request.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// The lock is held across the load so concurrent requests wait for one load.
    async fn loaded(&self) -> anyhow::Result<Arc<LoadedPlacements>> {
        let mut cache = self.cache.lock().await;
        if let Some(hit) = cache.as_ref().filter(|c| c.at.elapsed() < self.cache_ttl) {
            debug!(age_ms = hit.at.elapsed().as_millis() as u64, "serving cached load");
            return Ok(Arc::clone(&hit.loaded));
        }
        let loaded = Arc::new(self.pipeline.load().await?);
        *cache = Some(CachedLoad {
            at: Instant::now(),
            loaded: Arc::clone(&loaded),
        });
        Ok(loaded)
    }
}

/// Query string shared by the page, the charts and the JSON endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub period: Option<String>,
    /// Kept as text: the form submits empty fields.
    pub year: Option<String>,
    pub month: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub employee: Option<String>,
    pub project: Option<String>,
    pub n: Option<String>,
}

impl DashboardQuery {
    pub fn to_snapshot_query(&self) -> Result<SnapshotQuery, String> {
        let period = match self.period.as_deref().map(str::trim).unwrap_or("week") {
            "" | "week" => Period::Week,
            "month" => match (parse_number(self.year.as_deref())?, parse_number(self.month.as_deref())?) {
                (Some(year), Some(month)) => Period::Month { year, month },
                _ => Period::CurrentMonth,
            },
            "custom" => Period::Custom {
                from: parse_bound(self.from.as_deref())?,
                to: parse_bound(self.to.as_deref())?,
            },
            other => return Err(format!("unknown period {other:?}")),
        };
        Ok(SnapshotQuery {
            period,
            employee: non_blank(self.employee.as_deref()),
            project: non_blank(self.project.as_deref()),
            recent_limit: self.recent_limit(),
        })
    }

    pub fn recent_limit(&self) -> usize {
        self.n
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_RECENT)
            .clamp(10, 100)
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Result<Option<T>, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| format!("invalid number {v:?}")),
    }
}

fn parse_bound(value: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("invalid date {v:?}, expected YYYY-MM-DD")),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

struct MatrixRow {
    employee: String,
    cells: Vec<usize>,
    total: usize,
    donors: Option<usize>,
}

struct RecentRow {
    date: String,
    employee: String,
    project: String,
    source: String,
}

struct NoticeView {
    lines: Vec<String>,
    share_email: Option<String>,
    sheet_links: Vec<SheetLink>,
}

struct SourceRow {
    name: String,
    rows: usize,
    loaded: usize,
    rejected: usize,
    undated: usize,
    error: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    period: String,
    year: String,
    month: String,
    from: String,
    to: String,
    employee: String,
    project: String,
    n: usize,
    caption: String,
    origin: String,
    period_empty: bool,
    notice: Option<NoticeView>,
    by_employee: Vec<KeyCount>,
    by_project: Vec<KeyCount>,
    matrix_projects: Vec<String>,
    matrix_rows: Vec<MatrixRow>,
    show_donors: bool,
    recent: Vec<RecentRow>,
    sources: Vec<SourceRow>,
}

impl DashboardTemplate {
    fn new(query: &DashboardQuery, snapshot: DashboardSnapshot) -> Self {
        let echo = |v: &Option<String>| v.clone().unwrap_or_default();
        let donors = snapshot.matrix.unique_donors.as_deref();
        let matrix_rows = snapshot
            .matrix
            .employees
            .iter()
            .zip(&snapshot.matrix.cells)
            .zip(&snapshot.matrix.totals)
            .enumerate()
            .map(|(row, ((employee, cells), total))| MatrixRow {
                employee: employee.clone(),
                cells: cells.clone(),
                total: *total,
                donors: donors.and_then(|d| d.get(row).copied()),
            })
            .collect();
        let show_donors = donors.is_some();
        let recent = snapshot
            .recent
            .iter()
            .map(|r| RecentRow {
                date: r.date.format("%d.%m.%Y").to_string(),
                employee: r.employee.clone(),
                project: r.project.clone(),
                source: r.source.clone(),
            })
            .collect();
        let sources = snapshot
            .sources
            .iter()
            .map(|s| SourceRow {
                name: s.name.clone(),
                rows: s.stats.rows,
                loaded: s.stats.loaded,
                rejected: s.stats.rejected,
                undated: s.stats.undated,
                error: s.error.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            period: query.period.clone().unwrap_or_else(|| "week".into()),
            year: echo(&query.year),
            month: echo(&query.month),
            from: echo(&query.from),
            to: echo(&query.to),
            employee: echo(&query.employee),
            project: echo(&query.project),
            n: query.recent_limit(),
            caption: snapshot.caption(),
            origin: snapshot.origin.to_string(),
            period_empty: snapshot.is_period_empty(),
            notice: snapshot.notice.as_ref().map(|n| NoticeView {
                lines: n.message.lines().map(ToString::to_string).collect(),
                share_email: n.share_email.clone(),
                sheet_links: n.sheet_links.clone(),
            }),
            by_employee: snapshot.by_employee,
            by_project: snapshot.by_project,
            matrix_projects: snapshot.matrix.projects,
            matrix_rows,
            show_donors,
            recent,
            sources,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/charts/employees", get(employees_chart_handler))
        .route("/charts/projects", get(projects_chart_handler))
        .route("/charts/projects/share", get(projects_share_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("LINKBOARD_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    serve(AppState::new(SyncPipeline::new(SyncConfig::from_env())), port).await
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "dashboard listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn load_snapshot(state: &AppState, query: &DashboardQuery) -> Result<DashboardSnapshot, Response> {
    let snapshot_query = query.to_snapshot_query().map_err(bad_request)?;
    let loaded = state.loaded().await.map_err(server_error)?;
    DashboardSnapshot::build(&loaded, &snapshot_query, state.today()).map_err(|err| bad_request(err.to_string()))
}

async fn index_handler(State(state): State<Arc<AppState>>, Query(query): Query<DashboardQuery>) -> Response {
    match load_snapshot(&state, &query).await {
        Ok(snapshot) => render_html(DashboardTemplate::new(&query, snapshot)),
        Err(resp) => resp,
    }
}

async fn employees_chart_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    match load_snapshot(&state, &query).await {
        Ok(snapshot) => Json(bar_figure(
            &snapshot.by_employee,
            MAX_EMPLOYEE_BARS,
            "Placements by employee",
            "#0ea5e9",
        ))
        .into_response(),
        Err(resp) => resp,
    }
}

async fn projects_chart_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    match load_snapshot(&state, &query).await {
        Ok(snapshot) => Json(bar_figure(
            &snapshot.by_project,
            MAX_PROJECT_BARS,
            "Placements by project",
            "#22c55e",
        ))
        .into_response(),
        Err(resp) => resp,
    }
}

async fn projects_share_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    match load_snapshot(&state, &query).await {
        Ok(snapshot) => {
            let top = &snapshot.by_project[..snapshot.by_project.len().min(MAX_SHARE_SLICES)];
            Json(serde_json::json!({
                "data": [{
                    "type": "pie",
                    "labels": top.iter().map(|c| c.key.clone()).collect::<Vec<_>>(),
                    "values": top.iter().map(|c| c.count).collect::<Vec<_>>(),
                    "hole": 0.4
                }],
                "layout": {
                    "title": "Share by project"
                }
            }))
            .into_response()
        }
        Err(resp) => resp,
    }
}

async fn snapshot_handler(State(state): State<Arc<AppState>>, Query(query): Query<DashboardQuery>) -> Response {
    match load_snapshot(&state, &query).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(resp) => resp,
    }
}

fn bar_figure(counts: &[KeyCount], limit: usize, title: &str, color: &str) -> serde_json::Value {
    let top = &counts[..counts.len().min(limit)];
    serde_json::json!({
        "data": [{
            "type": "bar",
            "x": top.iter().map(|c| c.key.clone()).collect::<Vec<_>>(),
            "y": top.iter().map(|c| c.count).collect::<Vec<_>>(),
            "marker": {"color": color}
        }],
        "layout": {
            "title": title,
            "paper_bgcolor": "#ffffff",
            "plot_bgcolor": "#f8fafc"
        }
    })
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Html(format!("Bad request: {message}"))).into_response()
}

fn server_error(err: anyhow::Error) -> Response {
    warn!(error = %err, "dashboard request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {err:#}")),
    )
        .into_response()
}
