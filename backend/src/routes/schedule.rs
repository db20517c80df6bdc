use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;

use crate::db::models::{
    DashboardData, GenerationRequest, GenerationResult, ScheduleEntry, ScheduleEntryForm,
    TakeoverForm, WeekView, DATE_FORMAT,
};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Days shown by `GET /` when no range is given.
const DEFAULT_RANGE_DAYS: i64 = 28;
const DEFAULT_UPCOMING_DAYS: i64 = 14;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_entries))
        .route("/upcoming", get(upcoming))
        .route("/week/:date", get(week))
        .route("/dashboard", get(dashboard))
        .route("/takeover", post(takeover))
        .route("/entries/:id", get(get_entry).put(update_entry))
        .route(
            "/entries/:id/override",
            post(create_override).delete(remove_override),
        )
}

/// `POST /generate`, kept separate so it can carry its own rate limit.
pub fn generate_router() -> Router<Arc<AppState>> {
    Router::new().route("/generate", post(generate))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
}

fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        AppError::BadRequest(format!("{} must be a date in YYYY-MM-DD format", field))
    })
}

async fn list_entries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<Vec<ScheduleEntry>>> {
    let from = match query.from.as_deref() {
        Some(v) => parse_date("from", v)?,
        None => state.schedule.today(),
    };
    let to = match query.to.as_deref() {
        Some(v) => parse_date("to", v)?,
        None => from + Duration::days(DEFAULT_RANGE_DAYS - 1),
    };
    Ok(Json(state.schedule.entries_in_range(from, to).await?))
}

async fn upcoming(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UpcomingQuery>,
) -> AppResult<Json<Vec<ScheduleEntry>>> {
    let days = query.days.unwrap_or(DEFAULT_UPCOMING_DAYS);
    Ok(Json(state.schedule.upcoming_entries(days).await?))
}

async fn week(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> AppResult<Json<WeekView>> {
    let start = parse_date("date", &date)?;
    Ok(Json(state.schedule.week_view(start).await?))
}

async fn dashboard(State(state): State<Arc<AppState>>) -> AppResult<Json<DashboardData>> {
    Ok(Json(state.schedule.dashboard().await?))
}

/// A missing or blank body asks for a forced run. Anything else must be a
/// JSON `GenerationRequest`.
fn parse_generation_request(headers: &HeaderMap, body: &[u8]) -> AppResult<GenerationRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(GenerationRequest { force: true });
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("application/json"));
    if !is_json {
        return Err(AppError::BadRequest(
            "request body must be sent as application/json".to_string(),
        ));
    }

    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid generation request: {}", e)))
}

async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<GenerationResult>> {
    let request = parse_generation_request(&headers, &body)?;
    let result = state.generator.generate(request.force).await?;
    Ok(Json(result))
}

async fn takeover(
    State(state): State<Arc<AppState>>,
    Json(form): Json<TakeoverForm>,
) -> AppResult<(StatusCode, Json<ScheduleEntry>)> {
    let entry = state.schedule.takeover(&form).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<ScheduleEntry>> {
    Ok(Json(state.schedule.get_entry(id).await?))
}

async fn update_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(form): Json<ScheduleEntryForm>,
) -> AppResult<Json<ScheduleEntry>> {
    Ok(Json(state.schedule.update_entry(id, &form).await?))
}

async fn create_override(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(form): Json<ScheduleEntryForm>,
) -> AppResult<(StatusCode, Json<ScheduleEntry>)> {
    let entry = state.schedule.create_manual_override(id, &form).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn remove_override(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<ScheduleEntry>> {
    Ok(Json(state.schedule.remove_manual_override(id).await?))
}
