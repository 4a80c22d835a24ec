use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Trims the query and enforces the configured length ceiling.
pub fn validate_query(raw: &str, max_input_length: usize) -> Result<String, ApiError> {
    let query = raw.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".to_string()));
    }

    let length = query.chars().count();
    if length > max_input_length {
        return Err(ApiError::BadRequest(format!(
            "Query is {} characters long; the limit is {}",
            length, max_input_length
        )));
    }

    Ok(query.to_string())
}

/// Answers a single query without touching session history.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = validate_query(&payload.query, state.settings.max_input_length)?;
    let answer = state.orchestrator.answer(&query).await;
    Ok(Json(answer))
}
