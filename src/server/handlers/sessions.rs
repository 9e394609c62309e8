use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.chain.history().sessions().await?;
    Ok(Json(json!({ "sessions": sessions })))
}

pub async fn get_session_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.chain.history().messages(&session_id).await?;

    let formatted: Vec<Value> = messages
        .into_iter()
        .map(|msg| {
            json!({
                "role": msg.role,
                "content": msg.content,
                "timestamp": msg.created_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(Json(json!({ "messages": formatted })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.chain.history().clear(&session_id).await? {
        return Err(ApiError::NotFound(format!("Session not found: {}", session_id)));
    }
    Ok(Json(json!({ "success": true })))
}
