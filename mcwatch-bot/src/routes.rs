use crate::error::AppError;
use crate::helpers::now;
use crate::validation;
use crate::{AppState, DEFAULT_TOP_LIMIT};

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_macros::debug_handler;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub(crate) struct TopQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
pub(crate) struct RankedPlayer {
    name: String,
    total_time: u64,
    last_seen: Option<i64>,
    online: bool,
}

#[derive(Serialize)]
pub(crate) struct PlayerResponse {
    name: String,
    total_time: u64,
    last_seen: Option<i64>,
    current_session: Option<i64>,
    online: bool,
}

#[debug_handler]
pub(crate) async fn top_players(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = validation::validate_limit(query.limit.unwrap_or(DEFAULT_TOP_LIMIT))?;

    let ranked: Vec<RankedPlayer> = state
        .tracker
        .top_players(limit)
        .await
        .into_iter()
        .map(|(name, record)| RankedPlayer {
            online: record.is_online(),
            name,
            total_time: record.total_time,
            last_seen: record.last_seen,
        })
        .collect();

    Ok(Json(ranked))
}

#[debug_handler]
pub(crate) async fn player(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    validation::validate_player_lookup(&name)?;

    let info = state
        .tracker
        .player_info(&name, now())
        .await
        .ok_or_else(|| AppError::PlayerNotFound(name.clone()))?;

    Ok(Json(PlayerResponse {
        online: info.current_session.is_some(),
        name,
        total_time: info.total_time,
        last_seen: info.last_seen,
        current_session: info.current_session,
    }))
}
