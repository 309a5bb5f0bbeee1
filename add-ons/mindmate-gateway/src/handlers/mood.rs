//! `/api/mood` routes. Direct mood tags, separate from journal entries.

use crate::app::SharedState;
use crate::error::ApiError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use mindmate_core::MoodRecord;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct RecordMoodBody {
    #[serde(default)]
    pub mood: Option<String>,
}

pub async fn record_mood(
    State(state): State<SharedState>,
    Json(body): Json<RecordMoodBody>,
) -> Result<(StatusCode, Json<MoodRecord>), ApiError> {
    let mood = body.mood.unwrap_or_default();
    let record = state.store.record_mood(&mood).await.map_err(|e| state.reject(e))?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_moods(State(state): State<SharedState>) -> Result<Json<Vec<MoodRecord>>, ApiError> {
    let records = state.store.list_moods().await.map_err(|e| state.reject(e))?;
    Ok(Json(records))
}
