use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let indexed_chunks = state.rag_store.count().await?;
    let sessions = state.history.session_count().await.unwrap_or(0);
    let provider_healthy = state.llm.health_check().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0);

    Ok(Json(json!({
        "indexed_chunks": indexed_chunks,
        "sessions": sessions,
        "llm": {
            "provider": state.llm.provider_name(),
            "model": state.settings.llm.model,
            "healthy": provider_healthy,
        },
        "run_started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime_secs,
    })))
}
