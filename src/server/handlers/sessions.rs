use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::chat::{validate_query, QueryRequest};
use crate::core::errors::ApiError;
use crate::state::AppState;
use crate::tutor::ChatTurn;

pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.history.create_session(&state.run_token).await?;
    Ok(Json(json!({ "session": session })))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Loading first applies the run-token rule, so the info reflects it.
    let turns = state.history.load_turns(&session_id, &state.run_token).await?;
    let session = state
        .history
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    Ok(Json(json!({ "session": session, "turns": turns })))
}

/// Runs the orchestrator on the query and records the turn, whatever the
/// outcome.
pub async fn submit_turn(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = validate_query(&payload.query, state.settings.max_input_length)?;
    let answer = state.orchestrator.answer(&query).await;
    let turn = ChatTurn::new(query, answer);

    state
        .history
        .append_turn(&session_id, &state.run_token, &turn)
        .await?;

    Ok(Json(json!({ "turn": turn })))
}

pub async fn clear_turns(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if state.history.get_session(&session_id).await?.is_none() {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    let cleared = state.history.clear_turns(&session_id).await?;
    Ok(Json(json!({ "status": "cleared", "turns_removed": cleared })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.history.delete_session(&session_id).await? {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    Ok(Json(json!({ "status": "deleted" })))
}
