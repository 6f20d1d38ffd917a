use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::corrections::CorrectionError;
use crate::models::SubmissionStatus;
use crate::queue::TransitionError;

#[derive(Debug)]
pub enum StorageError {
    /// The backend could not be brought up. Non-fatal: the queue runs degraded.
    Init(String),
    NotInitialized,
    Database(sqlx::Error),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Init(msg) => write!(f, "Storage initialization failed: {msg}"),
            StorageError::NotInitialized => write!(f, "Storage is not initialized"),
            StorageError::Database(err) => write!(f, "Database error: {err}"),
            StorageError::Io(err) => write!(f, "Storage I/O error: {err}"),
            StorageError::Serialization(err) => write!(f, "Serialization error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Database(err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err)
    }
}

#[derive(Debug)]
pub enum QueueError {
    NotReady,
    NotFound(String),
    Duplicate(String),
    InvalidState { id: String, status: SubmissionStatus },
    Storage(StorageError),
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::NotReady => write!(f, "Storage not ready, try again shortly"),
            QueueError::NotFound(id) => write!(f, "Submission {id} not found"),
            QueueError::Duplicate(id) => write!(f, "Submission {id} already queued"),
            QueueError::InvalidState { id, status } => {
                write!(f, "Submission {id} is {status}")
            }
            QueueError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for QueueError {}

impl From<StorageError> for QueueError {
    fn from(err: StorageError) -> Self {
        QueueError::Storage(err)
    }
}

impl From<TransitionError> for QueueError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::DuplicateId(id) => QueueError::Duplicate(id),
            TransitionError::Terminal(id) => QueueError::InvalidState {
                id,
                status: SubmissionStatus::Sent,
            },
            // The engine never issues SyncStart outside of a run.
            TransitionError::SyncInProgress => QueueError::NotReady,
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    BadGateway(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::Unavailable(msg) => write!(f, "Unavailable: {msg}"),
            AppError::BadGateway(msg) => write!(f, "Bad Gateway: {msg}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::BadGateway(msg) => {
                tracing::warn!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(_) => AppError::NotFound(err.to_string()),
            QueueError::Duplicate(_) | QueueError::InvalidState { .. } => {
                AppError::Conflict(err.to_string())
            }
            QueueError::NotReady => AppError::Unavailable(err.to_string()),
            QueueError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                AppError::Unavailable("Could not save the submission, try again".to_string())
            }
        }
    }
}

impl From<CorrectionError> for AppError {
    fn from(err: CorrectionError) -> Self {
        match err {
            CorrectionError::Disabled => AppError::Unavailable(err.to_string()),
            _ => AppError::BadGateway(err.to_string()),
        }
    }
}
