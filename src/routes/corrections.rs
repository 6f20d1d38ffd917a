use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::corrections::{self, Correction, CorrectionError, CorrectionRequest};
use crate::error::AppError;
use crate::models::Submission;
use crate::state::SharedState;

/// Ask the correction service about every pending or failed entry.
pub async fn analyze(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let service = state
        .corrections
        .as_ref()
        .ok_or(CorrectionError::Disabled)?;

    let entries = state.engine.unsent();
    if entries.is_empty() {
        return Ok(Json(json!({ "corrections": [] })));
    }

    let ids: Vec<String> = entries.iter().map(|s| s.id.clone()).collect();
    let request = CorrectionRequest {
        form_name: service.form_name.clone(),
        form_data_entries: entries.into_iter().map(|s| s.form_data).collect(),
    };

    let proposals = service.provider.suggest(&request).await?;
    let resolved = corrections::resolve(&ids, proposals);
    Ok(Json(json!({ "corrections": resolved })))
}

pub async fn accept(
    State(state): State<SharedState>,
    Json(correction): Json<Correction>,
) -> Result<Json<Submission>, AppError> {
    let submission = state.engine.accept_correction(&correction).await?;
    Ok(Json(submission))
}
