// src/server.rs
use axum::{
    extract::{Query, State},
    http::StatusCode as AxumStatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api_client::{ApiClient, ApiClientError};
use crate::attendance::{AttendanceEvaluator, StatusVerdict, REFERENCE_TZ};
use crate::calendar::{parse_reference_date, WeekId, WeekParseError};
use crate::config::AppConfig;
use crate::grid::{day_grid, week_grid, EmployeeSummary, GridFilter, PresenceGrid, ViewMode};
use crate::models::{Producer, Shift};
use crate::poller::PollerHandle;
use crate::render::{escape_html, html_grid};
use crate::session::{Role, Session, ADMIN_HOME, PRODUCER_HOME};
use crate::snapshot::{FetchReport, FetchStatus, SnapshotStore};

pub const STATUS_ROUTE: &str = "/status";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("Attendance API client error")]
    Api(#[from] ApiClientError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("No active session")]
    NotLoggedIn,
    #[error("Forbidden for role {0}")]
    Forbidden(Role),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<WeekParseError> for AppError {
    fn from(err: WeekParseError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Error occurred: {:?}", self);
        let (status_code, error_message) = match &self {
            AppError::Config(_) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error.".to_string(),
            ),
            AppError::TlsConfig(_) => (
                AxumStatusCode::INTERNAL_SERVER_ERROR,
                "Server TLS configuration error.".to_string(),
            ),
            AppError::Api(api_err) => match api_err {
                ApiClientError::Unauthorized { .. } => (
                    AxumStatusCode::UNAUTHORIZED,
                    "The attendance API rejected the session. Please log in again.".to_string(),
                ),
                ApiClientError::TwoFactorRequired => (
                    AxumStatusCode::UNAUTHORIZED,
                    "Two-factor authentication is not supported.".to_string(),
                ),
                ApiClientError::ApiError { status, message } => (
                    AxumStatusCode::BAD_GATEWAY,
                    format!("Attendance API error ({}): {}", status, message),
                ),
                _ => (
                    AxumStatusCode::BAD_GATEWAY,
                    "Failed to communicate with the attendance API.".to_string(),
                ),
            },
            AppError::BadRequest(message) => (AxumStatusCode::BAD_REQUEST, message.clone()),
            AppError::NotLoggedIn => (
                AxumStatusCode::UNAUTHORIZED,
                "No active session. Configure credentials and restart the service.".to_string(),
            ),
            AppError::Forbidden(role) => (
                AxumStatusCode::FORBIDDEN,
                format!("This view is not available to role {}.", role),
            ),
            AppError::NotFound(what) => (AxumStatusCode::NOT_FOUND, format!("{} not found.", what)),
        };

        (
            status_code,
            Html(format!("<h1>Error</h1><p>{}</p>", escape_html(&error_message))),
        )
            .into_response()
    }
}

// --- Shared state ---

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub client: Arc<ApiClient>,
    pub store: Arc<SnapshotStore>,
    pub evaluator: AttendanceEvaluator,
    pub poller: Option<Arc<PollerHandle>>,
}

impl AppState {
    async fn require_session(&self) -> Result<Session, AppError> {
        self.client.session().await.ok_or(AppError::NotLoggedIn)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route(ADMIN_HOME, get(handle_admin_dashboard))
        .route(PRODUCER_HOME, get(handle_producer_dashboard))
        .route(STATUS_ROUTE, get(handle_status))
        .route("/api/presence/day", get(handle_presence_day))
        .route("/api/presence/week", get(handle_presence_week))
        .route("/api/evaluate", get(handle_evaluate))
        .route("/api/segments", get(handle_segments))
        .route("/api/shifts", get(handle_shifts))
        .route("/api/producers", get(handle_producers))
        .route("/api/refresh", post(handle_refresh))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Query handling ---

#[derive(Debug, Default, Deserialize)]
pub struct GridQuery {
    #[serde(default)]
    pub view: Option<ViewMode>,
    pub date: Option<String>,
    pub week: Option<String>,
    pub search: Option<String>,
    pub shift: Option<String>,
    pub segment: Option<String>,
}

impl GridQuery {
    fn reference_date(&self, evaluator: &AttendanceEvaluator) -> Result<NaiveDate, AppError> {
        match self.date.as_deref().filter(|d| !d.is_empty()) {
            Some(raw) => Ok(parse_reference_date(raw)?),
            None => Ok(evaluator.today()),
        }
    }

    fn week(&self, reference_date: NaiveDate) -> Result<WeekId, AppError> {
        match self.week.as_deref().filter(|w| !w.is_empty()) {
            Some(raw) => Ok(raw.parse()?),
            None => Ok(WeekId::containing(reference_date)),
        }
    }

    fn filter(&self, session: &Session) -> GridFilter {
        let filter = GridFilter {
            search: self.search.clone(),
            shift: self.shift.clone(),
            segment: self.segment.clone(),
        };
        if session.role.is_segment_scoped() {
            filter.without_segment()
        } else {
            filter
        }
    }
}

async fn build_grid(
    state: &AppState,
    session: &Session,
    query: &GridQuery,
    view: ViewMode,
) -> Result<PresenceGrid, AppError> {
    let snapshot = state.store.current().await;
    let date = query.reference_date(&state.evaluator)?;
    let filter = query.filter(session);
    let scope = session.scope();

    let grid = match view {
        ViewMode::Day => day_grid(
            &state.evaluator,
            &snapshot.employees,
            &snapshot.scans,
            date,
            &filter,
            &scope,
        ),
        ViewMode::Week => week_grid(
            &state.evaluator,
            &snapshot.employees,
            &snapshot.scans,
            query.week(date)?,
            date,
            &filter,
            &scope,
        ),
    };
    Ok(grid)
}

// --- Handlers ---

async fn handle_root(State(state): State<AppState>) -> Redirect {
    match state.client.session().await {
        Some(session) => Redirect::temporary(session.home_route()),
        None => Redirect::temporary(STATUS_ROUTE),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    role: Option<Role>,
    snapshot: FetchReport,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let role = state.client.session().await.map(|s| s.role);
    Json(HealthResponse {
        status: "ok",
        role,
        snapshot: state.store.status().await,
    })
}

fn dashboard_page(session: &Session, grid: &PresenceGrid, query: &GridQuery, report: &FetchReport) -> String {
    let scope_line = match &session.segment {
        Some(segment) if session.role.is_segment_scoped() => {
            format!("<p>Segment: {}</p>", escape_html(segment))
        }
        _ => String::new(),
    };
    let view = query.view.unwrap_or_default();
    let other_view = match view {
        ViewMode::Day => ("week", "Vue semaine"),
        ViewMode::Week => ("day", "Vue jour"),
    };
    format!(
        "<h1>Présence bus</h1><p>Connecté: {} ({})</p>{}\
         <p>Dernière mise à jour: {}</p>\
         <p><a href='?view={}'>{}</a> | <a href='{}'>Statut</a></p><hr>{}",
        escape_html(session.display_name()),
        session.role,
        scope_line,
        report
            .last_updated
            .map(|t| t.with_timezone(&REFERENCE_TZ).format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "jamais".to_string()),
        other_view.0,
        other_view.1,
        STATUS_ROUTE,
        html_grid(grid)
    )
}

async fn render_dashboard(state: &AppState, session: &Session, query: &GridQuery) -> Result<Html<String>, AppError> {
    let grid = build_grid(state, session, query, query.view.unwrap_or_default()).await?;
    let report = state.store.status().await;
    Ok(Html(dashboard_page(session, &grid, query, &report)))
}

async fn handle_admin_dashboard(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
) -> Result<Response, AppError> {
    info!("Handling {} request...", ADMIN_HOME);
    let session = match state.client.session().await {
        Some(session) => session,
        None => return Ok(Redirect::temporary(STATUS_ROUTE).into_response()),
    };
    if session.role != Role::Admin {
        return Ok(Redirect::temporary(session.home_route()).into_response());
    }
    Ok(render_dashboard(&state, &session, &query).await?.into_response())
}

async fn handle_producer_dashboard(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
) -> Result<Response, AppError> {
    info!("Handling {} request...", PRODUCER_HOME);
    let session = match state.client.session().await {
        Some(session) => session,
        None => return Ok(Redirect::temporary(STATUS_ROUTE).into_response()),
    };
    if !session.role.is_segment_scoped() {
        return Ok(Redirect::temporary(session.home_route()).into_response());
    }
    Ok(render_dashboard(&state, &session, &query).await?.into_response())
}

async fn handle_presence_day(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
) -> Result<Json<PresenceGrid>, AppError> {
    let session = state.require_session().await?;
    Ok(Json(build_grid(&state, &session, &query, ViewMode::Day).await?))
}

async fn handle_presence_week(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
) -> Result<Json<PresenceGrid>, AppError> {
    let session = state.require_session().await?;
    Ok(Json(build_grid(&state, &session, &query, ViewMode::Week).await?))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateQuery {
    pub token: String,
    pub date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateResponse {
    date: NaiveDate,
    employee: Option<EmployeeSummary>,
    verdict: StatusVerdict,
}

async fn handle_evaluate(
    State(state): State<AppState>,
    Query(query): Query<EvaluateQuery>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let session = state.require_session().await?;
    let snapshot = state.store.current().await;
    let scope = session.scope();
    let date = match query.date.as_deref().filter(|d| !d.is_empty()) {
        Some(raw) => parse_reference_date(raw)?,
        None => state.evaluator.today(),
    };

    let employee = snapshot
        .employees
        .iter()
        .filter(|e| scope.admits(e))
        .find(|e| !e.nfc_token.is_empty() && e.nfc_token == query.token);
    let verdict = state
        .evaluator
        .evaluate(employee, Some(snapshot.scans.as_slice()), Some(date));

    Ok(Json(EvaluateResponse {
        date,
        employee: employee.map(EmployeeSummary::from),
        verdict,
    }))
}

async fn handle_segments(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let session = state.require_session().await?;
    if session.role.is_segment_scoped() {
        return Ok(Json(session.segment.into_iter().collect()));
    }
    let snapshot = state.store.current().await;
    Ok(Json(snapshot.segments.clone()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShiftOption {
    key: String,
    #[serde(flatten)]
    shift: Shift,
}

async fn handle_shifts(State(state): State<AppState>) -> Result<Json<Vec<ShiftOption>>, AppError> {
    state.require_session().await?;
    let snapshot = state.store.current().await;
    Ok(Json(
        snapshot
            .shifts
            .iter()
            .map(|shift| ShiftOption {
                key: shift.schedule_key(),
                shift: shift.clone(),
            })
            .collect(),
    ))
}

async fn handle_producers(State(state): State<AppState>) -> Result<Json<Vec<Producer>>, AppError> {
    let session = state.require_session().await?;
    if session.role != Role::Admin {
        return Err(AppError::Forbidden(session.role));
    }
    Ok(Json(state.client.fetch_producers().await?))
}

async fn handle_refresh(State(state): State<AppState>) -> Result<(AxumStatusCode, Json<serde_json::Value>), AppError> {
    state.require_session().await?;
    match &state.poller {
        Some(poller) if !poller.is_cancelled() => {
            info!("Manual refresh requested");
            poller.refresh();
            Ok((
                AxumStatusCode::ACCEPTED,
                Json(serde_json::json!({ "status": "refresh scheduled" })),
            ))
        }
        _ => Err(AppError::NotFound("Running poller".to_string())),
    }
}

async fn handle_status(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    info!("Handling /status request...");
    let report = state.store.status().await;
    let session_line = match state.client.session().await {
        Some(session) => format!(
            "Session: {} ({}), segment={}, polling every {}s, home=<a href='{}'>{}</a>",
            escape_html(session.display_name()),
            session.role,
            escape_html(session.segment.as_deref().unwrap_or("-")),
            session.poll_interval(&state.config).as_secs(),
            session.home_route(),
            session.home_route()
        ),
        None => "Session: none. Set PRESENCE_API_EMAIL/PRESENCE_API_PASSWORD or PRESENCE_API_TOKEN.".to_string(),
    };
    let fetch_line = match &report.status {
        FetchStatus::Loading => "Fetch status: loading".to_string(),
        FetchStatus::Connected => "Fetch status: connected".to_string(),
        FetchStatus::Error(message) => {
            format!("Fetch status: error ({})", escape_html(message))
        }
    };
    let api_up = state.client.check_api_status().await;

    let html_body = format!(
        "<h1>Server Status</h1><p>Current Time (Server): {}</p><p>{}</p><hr>\
         <p>{}</p>\
         <p>Last update: {}</p>\
         <p>Employees: {} | Scans: {}</p>\
         <p>Attendance API reachable: {}</p>",
        chrono::Utc::now()
            .with_timezone(&REFERENCE_TZ)
            .to_rfc3339(),
        session_line,
        fetch_line,
        report
            .last_updated
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string()),
        report.employee_count,
        report.scan_count,
        api_up
    );
    Ok(Html(html_body))
}
