use std::path::PathBuf;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::GenerationError;

/// Application-level error type.
///
/// Extraction anomalies never reach this type: an unreadable backend
/// response degrades to an empty competency list. Everything here aborts
/// the run (CLI) or the request (HTTP).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing resource: {}", .path.display())]
    MissingResource { path: PathBuf },

    #[error("Malformed input in {}{}: {reason}", .path.display(), record_suffix(.index))]
    MalformedInput {
        path: PathBuf,
        index: Option<usize>,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Generation backend error: {0}")]
    Generation(#[from] GenerationError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn malformed(path: impl Into<PathBuf>, index: Option<usize>, reason: impl ToString) -> Self {
        AppError::MalformedInput {
            path: path.into(),
            index,
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

fn record_suffix(index: &Option<usize>) -> String {
    index.map(|i| format!(" (record {i})")).unwrap_or_default()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::MissingResource { .. } => {
                (StatusCode::NOT_FOUND, "MISSING_RESOURCE", self.to_string())
            }
            AppError::MalformedInput { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "MALFORMED_INPUT",
                self.to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Generation(e) => {
                tracing::error!("Generation error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "GENERATION_ERROR",
                    "The generation backend failed".to_string(),
                )
            }
            AppError::Io { .. } => {
                tracing::error!("I/O error: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "IO_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_input_names_file_and_record() {
        let err = AppError::malformed("data/vacancies.json", Some(4), "missing field `id`");
        assert_eq!(
            err.to_string(),
            "Malformed input in data/vacancies.json (record 4): missing field `id`"
        );
        let err = AppError::malformed("w.json", None, "expected a JSON array");
        assert_eq!(err.to_string(), "Malformed input in w.json: expected a JSON array");
    }

    #[test]
    fn test_status_codes() {
        let missing = AppError::MissingResource { path: "x.json".into() }.into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let invalid = AppError::Validation("top_n must be positive".into()).into_response();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        let backend = AppError::from(GenerationError::EmptyContent).into_response();
        assert_eq!(backend.status(), StatusCode::BAD_GATEWAY);
    }
}
