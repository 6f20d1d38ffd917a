use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::error::AppError;
use crate::models::{FormData, Submission};
use crate::state::SharedState;

pub async fn list(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let snapshot = state.engine.snapshot();
    Json(json!({
        "submissions": snapshot.submissions,
        "syncing": snapshot.syncing,
        "ready": state.engine.is_ready(),
        "degraded": state.engine.is_degraded(),
        "online": state.engine.network().is_online(),
    }))
}

pub async fn create(
    State(state): State<SharedState>,
    Json(form_data): Json<FormData>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    let submission = state.engine.add(form_data).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Submission>, AppError> {
    let submission = state
        .engine
        .get(&id)
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;
    Ok(Json(submission))
}

pub async fn update_form_data(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(form_data): Json<FormData>,
) -> Result<Json<Submission>, AppError> {
    let submission = state.engine.update_form_data(&id, form_data).await?;
    Ok(Json(submission))
}

pub async fn retry(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Submission>, AppError> {
    let submission = state.engine.retry(&id).await?;
    Ok(Json(submission))
}
