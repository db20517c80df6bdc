use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{WorkingHours, WorkingHoursForm};
use crate::error::AppResult;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_hours).put(update_all))
        .route("/:day", get(get_day).put(update_day))
}

#[derive(Debug, Serialize)]
pub struct WorkingHoursResponse {
    #[serde(flatten)]
    pub hours: WorkingHours,
    pub day_name: &'static str,
}

impl From<WorkingHours> for WorkingHoursResponse {
    fn from(hours: WorkingHours) -> Self {
        let day_name = hours.day_name();
        Self { hours, day_name }
    }
}

/// Body of `PUT /:day`; the day comes from the path.
#[derive(Debug, Deserialize)]
pub struct UpdateDayRequest {
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    pub active: bool,
}

async fn list_hours(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<WorkingHoursResponse>>> {
    let hours = state.hours.list_working_hours().await?;
    Ok(Json(hours.into_iter().map(Into::into).collect()))
}

async fn update_all(
    State(state): State<Arc<AppState>>,
    Json(forms): Json<Vec<WorkingHoursForm>>,
) -> AppResult<Json<Vec<WorkingHoursResponse>>> {
    let updated = state.hours.update_all(&forms).await?;
    Ok(Json(updated.into_iter().map(Into::into).collect()))
}

async fn get_day(
    State(state): State<Arc<AppState>>,
    Path(day): Path<i64>,
) -> AppResult<Json<WorkingHoursResponse>> {
    Ok(Json(state.hours.get_by_day(day).await?.into()))
}

async fn update_day(
    State(state): State<Arc<AppState>>,
    Path(day): Path<i64>,
    Json(req): Json<UpdateDayRequest>,
) -> AppResult<Json<WorkingHoursResponse>> {
    let form = WorkingHoursForm {
        day_of_week: day,
        start_time: req.start_time,
        end_time: req.end_time,
        active: req.active,
    };
    Ok(Json(state.hours.update_day(day, &form).await?.into()))
}
