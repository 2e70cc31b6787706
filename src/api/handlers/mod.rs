use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diagnostic::{
    AttemptHistory, DiagnosticError, DiagnosticService, MISSING_ANSWER_FIELDS,
};
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Map a diagnostic error to its HTTP response.
///
/// Client errors carry their message. Storage failures are logged in full
/// server-side and reach the client only as a generic message.
fn api_error(e: DiagnosticError) -> ApiError {
    let status = match &e {
        DiagnosticError::Validation(_) | DiagnosticError::AlreadyComplete(_) => {
            StatusCode::BAD_REQUEST
        }
        DiagnosticError::NotFound => StatusCode::NOT_FOUND,
        DiagnosticError::Conflict => StatusCode::CONFLICT,
        DiagnosticError::Storage(inner) => {
            tracing::error!("Internal error: {:#}", inner);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Internal server error".to_string(),
                }),
            );
        }
    };

    tracing::warn!("Rejected request: {}", e);
    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Diagnostic sessions
// ============================================================

pub async fn start_session(
    State(service): State<DiagnosticService>,
    Query(query): Query<StartQuery>,
) -> Result<Json<StartResponse>, ApiError> {
    service
        .start(
            query.concept.as_deref().unwrap_or_default(),
            query.user_id.as_deref().unwrap_or_default(),
        )
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn answer_question(
    State(service): State<DiagnosticService>,
    payload: Result<Json<AnswerInput>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    // A body that is absent or does not decode carries no usable fields.
    let Json(input) = payload.map_err(|rejection| {
        tracing::debug!("Rejected answer body: {}", rejection.body_text());
        api_error(DiagnosticError::Validation(
            MISSING_ANSWER_FIELDS.to_string(),
        ))
    })?;

    service.answer(input).await.map(Json).map_err(api_error)
}

pub async fn get_session(
    State(service): State<DiagnosticService>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlaySession>, ApiError> {
    service.session(id).map(Json).map_err(api_error)
}

/// Latest diagnostic results per target concept for a user.
pub async fn playground_attempts(
    State(service): State<DiagnosticService>,
    Path(user_id): Path<String>,
) -> Result<Json<AttemptHistory>, ApiError> {
    service.history(&user_id).map(Json).map_err(api_error)
}

// ============================================================
// Concepts
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrerequisitesResponse {
    pub concept: String,
    pub prerequisites: Vec<String>,
}

pub async fn list_concepts(State(service): State<DiagnosticService>) -> Json<Vec<String>> {
    Json(service.index().concepts().to_vec())
}

pub async fn concept_prerequisites(
    State(service): State<DiagnosticService>,
    Path(concept): Path<String>,
) -> Json<PrerequisitesResponse> {
    let prerequisites = service.prerequisites(&concept);
    Json(PrerequisitesResponse {
        concept,
        prerequisites,
    })
}
