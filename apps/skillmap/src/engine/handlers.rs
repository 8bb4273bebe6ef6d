//! Axum route handlers exposing the engine over HTTP.
//!
//! Nothing here touches the generation backend or the data directory: every
//! handler is a pure function of its request body.

use axum::{
    extract::{FromRequest, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::extractor::{extract, extract_object};
use crate::engine::matrix::Whitelist;
use crate::engine::normalizer::{normalize, normalize_strings};
use crate::errors::AppError;
use crate::models::{CompetencyRecord, RawCompetency};
use crate::pipeline::matrix_run::{compute, MatrixArtifacts};
use crate::state::AppState;

/// JSON body whose rejections surface as `AppError::Validation`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub raw: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    /// Entries exactly as recovered from the text.
    pub competencies: Vec<String>,
    pub normalized: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct NormalizeRequest {
    pub competencies: Vec<RawCompetency>,
}

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub competencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MatrixRequest {
    #[serde(default)]
    pub vacancies: Vec<CompetencyRecord>,
    #[serde(default)]
    pub projects: Vec<CompetencyRecord>,
    pub whitelist: Option<Vec<String>>,
    pub top_n: Option<usize>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/extract
pub async fn handle_extract(
    ApiJson(request): ApiJson<ExtractRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    if request.raw.trim().is_empty() {
        return Err(AppError::Validation("raw cannot be empty".to_string()));
    }

    let competencies = extract(&request.raw);
    let normalized = normalize_strings(&competencies);

    Ok(Json(ExtractResponse {
        competencies,
        normalized,
    }))
}

/// POST /api/v1/extract-object
///
/// Always answers with a JSON value; prose comes back as `{"summary": ...}`.
pub async fn handle_extract_object(
    ApiJson(request): ApiJson<ExtractRequest>,
) -> Result<Json<Value>, AppError> {
    if request.raw.trim().is_empty() {
        return Err(AppError::Validation("raw cannot be empty".to_string()));
    }
    Ok(Json(extract_object(&request.raw)))
}

/// POST /api/v1/normalize
pub async fn handle_normalize(
    ApiJson(request): ApiJson<NormalizeRequest>,
) -> Result<Json<NormalizeResponse>, AppError> {
    Ok(Json(NormalizeResponse {
        competencies: normalize(&request.competencies),
    }))
}

/// POST /api/v1/matrix
///
/// Runs aggregation, matrix building and summarizing over inline records.
/// `top_n` defaults to the configured value.
pub async fn handle_matrix(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MatrixRequest>,
) -> Result<Json<MatrixArtifacts>, AppError> {
    if request.vacancies.is_empty() && request.projects.is_empty() {
        return Err(AppError::Validation(
            "vacancies and projects cannot both be empty".to_string(),
        ));
    }

    let top_n = request.top_n.unwrap_or(state.config.top_n);
    if top_n == 0 {
        return Err(AppError::Validation("top_n must be positive".to_string()));
    }

    let whitelist = request.whitelist.map(Whitelist::new);
    let artifacts = compute(
        &request.vacancies,
        &request.projects,
        whitelist.as_ref(),
        top_n,
    );

    tracing::info!(
        rows = artifacts.report.rows.len(),
        industries = artifacts.report.summaries.len(),
        "matrix computed over request body"
    );
    Ok(Json(artifacts))
}
