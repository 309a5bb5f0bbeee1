//! `/api/ai` routes.

use crate::app::SharedState;
use crate::error::ApiError;
use axum::extract::State;
use axum::Json;
use mindmate_core::Error;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// POST /api/ai/chat. A missing or blank message never reaches the gateway.
pub async fn chat(State(state): State<SharedState>, Json(body): Json<ChatBody>) -> Result<Json<Value>, ApiError> {
    let message = body
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| state.reject(Error::invalid_input("Message is required")))?;
    let reply = state.ai.chat(&message).await.map_err(|e| state.reject(e))?;
    Ok(Json(json!({ "response": reply })))
}

pub async fn test_route() -> Json<Value> {
    Json(json!({
        "message": "AI routes are working",
        "endpoint": "/api/ai/chat",
        "method": "POST",
    }))
}
