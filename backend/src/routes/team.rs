use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::models::{TeamMember, TeamMemberForm};
use crate::error::AppResult;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_members).post(create_member))
        .route(
            "/:id",
            get(get_member).put(update_member).delete(delete_member),
        )
        .route("/:id/activate", post(activate_member))
        .route("/:id/deactivate", post(deactivate_member))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Only members currently in rotation, in rotation order.
    #[serde(default)]
    pub active: bool,
}

async fn list_members(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<TeamMember>>> {
    let members = if query.active {
        state.team.active_members().await?
    } else {
        state.team.list_members().await?
    };
    Ok(Json(members))
}

async fn create_member(
    State(state): State<Arc<AppState>>,
    Json(form): Json<TeamMemberForm>,
) -> AppResult<(StatusCode, Json<TeamMember>)> {
    let member = state.team.create_member(&form).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn get_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<TeamMember>> {
    Ok(Json(state.team.get_member(id).await?))
}

async fn update_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(form): Json<TeamMemberForm>,
) -> AppResult<Json<TeamMember>> {
    Ok(Json(state.team.update_member(id, &form).await?))
}

async fn delete_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.team.delete_member(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn activate_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<TeamMember>> {
    Ok(Json(state.team.activate_member(id).await?))
}

async fn deactivate_member(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<TeamMember>> {
    Ok(Json(state.team.deactivate_member(id).await?))
}
