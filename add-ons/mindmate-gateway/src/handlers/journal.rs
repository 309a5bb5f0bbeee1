//! `/api/journal` routes.

use crate::app::SharedState;
use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mindmate_core::{validate_content, Classification, Error, JournalEntry, JournalPatch};
use serde::Deserialize;
use serde_json::{json, Value};

// Fields are optional so a missing field reaches validation and yields our 400.
#[derive(Debug, Default, Deserialize)]
pub struct CreateEntryBody {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeBody {
    #[serde(default)]
    pub text: Option<String>,
}

pub async fn create_entry(
    State(state): State<SharedState>,
    Json(body): Json<CreateEntryBody>,
) -> Result<(StatusCode, Json<JournalEntry>), ApiError> {
    let content = body.content.unwrap_or_default();
    validate_content(&content).map_err(|e| state.reject(e))?;
    let entry = state.store.create(&content).await.map_err(|e| state.reject(e))?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_entries(State(state): State<SharedState>) -> Result<Json<Vec<JournalEntry>>, ApiError> {
    let entries = state.store.list().await.map_err(|e| state.reject(e))?;
    Ok(Json(entries))
}

/// Classify without persisting.
pub async fn analyze(
    State(state): State<SharedState>,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<Classification>, ApiError> {
    let text = body
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| state.reject(Error::invalid_input("Text is required")))?;
    Ok(Json(state.store.analyze(&text)))
}

pub async fn get_entry(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<JournalEntry>, ApiError> {
    let entry = state.store.get(&id).await.map_err(|e| state.reject(e))?;
    Ok(Json(entry))
}

pub async fn update_entry(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(patch): Json<JournalPatch>,
) -> Result<Json<JournalEntry>, ApiError> {
    let entry = state.store.update(&id, patch).await.map_err(|e| state.reject(e))?;
    Ok(Json(entry))
}

pub async fn delete_entry(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let removed = state.store.delete(&id).await.map_err(|e| state.reject(e))?;
    Ok(Json(json!({ "message": "Deleted successfully", "id": removed.id })))
}
