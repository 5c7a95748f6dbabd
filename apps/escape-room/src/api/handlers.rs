//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Every failure answers `{error}`: validation problems with 400, unknown
//! sessions with 404 and anything else with a generic 500 whose cause is
//! logged here and never sent to the client.

use super::{
    AppState,
    types::{
        CreateSessionRequest, ErrorResponse, HealthResponse, MessageResponse, SessionJson,
        StageCompletionJson, StageRequest, StageTarget, StatsResponse, StatsUpdateRequest,
        UpdateSessionRequest,
    },
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use escape_core::{EscapeError, GameStats, SessionId, SessionStore, refresh_stats};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "Game session not found".to_string(),
        }
    }

    fn internal(context: &str, error: &EscapeError) -> Self {
        tracing::error!(error = %error, "{context}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: context.to_string(),
        }
    }

    /// Map a core error; storage failures are reported under `context`.
    fn from_core(context: &str, error: EscapeError) -> Self {
        match error {
            EscapeError::Validation(msg) => Self::bad_request(msg),
            EscapeError::InvalidStage(id) => {
                Self::bad_request(format!("stageId must be between 1 and 6, got {id}"))
            }
            EscapeError::SessionNotFound(_) => Self::not_found(),
            other => Self::internal(context, &other),
        }
    }

    fn json(rejection: &JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// A path id that is not a number can never match a session.
fn parse_id(raw: &str) -> Option<SessionId> {
    raw.parse().ok()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// SESSION HANDLERS
// =============================================================================

/// List every session, newest first.
pub async fn list_sessions_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SessionJson>>> {
    let store = state.store.read().await;
    let records = store
        .list_sessions()
        .map_err(|e| ApiError::from_core("Failed to fetch game sessions", e))?;
    Ok(Json(records.iter().map(SessionJson::from).collect()))
}

/// Create a session.
pub async fn create_session_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SessionJson>)> {
    let Json(request) = payload.map_err(|e| ApiError::json(&e))?;
    let new = request
        .to_new_session()
        .map_err(|e| ApiError::from_core("Failed to create game session", e))?;

    let mut store = state.store.write().await;
    let record = store
        .create_session(&new, Utc::now())
        .map_err(|e| ApiError::from_core("Failed to create game session", e))?;
    tracing::info!(
        session = %record.session.id,
        total_time = record.session.total_time,
        "game session created"
    );
    Ok((StatusCode::CREATED, Json(SessionJson::from(&record))))
}

/// Fetch one session with its timer and stages.
pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<SessionJson>> {
    let id = parse_id(&raw_id).ok_or_else(ApiError::not_found)?;
    let store = state.store.read().await;
    let record = store
        .get_session(id)
        .map_err(|e| ApiError::from_core("Failed to fetch game session", e))?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(SessionJson::from(&record)))
}

/// Apply a partial update to a session.
pub async fn update_session_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateSessionRequest>, JsonRejection>,
) -> ApiResult<Json<SessionJson>> {
    let id = parse_id(&raw_id).ok_or_else(ApiError::not_found)?;
    let Json(request) = payload.map_err(|e| ApiError::json(&e))?;
    let update = request
        .to_update()
        .map_err(|e| ApiError::from_core("Failed to update game session", e))?;

    let mut store = state.store.write().await;
    let record = store
        .update_session(id, &update, Utc::now())
        .map_err(|e| ApiError::from_core("Failed to update game session", e))?;
    tracing::debug!(session = %id, completed = record.session.is_completed, "game session updated");
    Ok(Json(SessionJson::from(&record)))
}

/// Delete a session with its timer and stages.
///
/// An unknown id is reported as a server error, not 404.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let context = "Failed to delete game session";
    let Some(id) = parse_id(&raw_id) else {
        return Err(ApiError::internal(
            context,
            &EscapeError::Validation(format!("invalid session id '{raw_id}'")),
        ));
    };

    let mut store = state.store.write().await;
    store
        .delete_session(id)
        .map_err(|e| ApiError::internal(context, &e))?;
    tracing::info!(session = %id, "game session deleted");
    Ok(Json(MessageResponse {
        message: "Game session deleted successfully".to_string(),
    }))
}

// =============================================================================
// STAGE HANDLER
// =============================================================================

/// Insert or update the completion record for one stage of a session.
pub async fn stage_handler(
    State(state): State<AppState>,
    payload: Result<Json<StageRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StageCompletionJson>)> {
    let context = "Failed to save stage completion";
    let Json(request) = payload.map_err(|e| ApiError::json(&e))?;
    let input = match request
        .to_input()
        .map_err(|e| ApiError::from_core(context, e))?
    {
        StageTarget::Valid(input) => input,
        StageTarget::UnknownSession => return Err(ApiError::not_found()),
    };

    let mut store = state.store.write().await;
    let stage = store
        .upsert_stage_completion(&input, Utc::now())
        .map_err(|e| ApiError::from_core(context, e))?;
    tracing::debug!(
        session = %stage.game_session_id,
        stage = stage.stage_id,
        completed = stage.completed,
        "stage completion saved"
    );
    Ok((StatusCode::CREATED, Json(StageCompletionJson::from(&stage))))
}

// =============================================================================
// STATISTICS HANDLERS
// =============================================================================

/// Recompute statistics from every session, persist and return them.
pub async fn get_stats_handler(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let mut store = state.store.write().await;
    let stats = refresh_stats(&mut *store, Utc::now())
        .map_err(|e| ApiError::from_core("Failed to fetch game statistics", e))?;
    Ok(Json(StatsResponse::from(&stats)))
}

/// Overwrite individual statistics fields, creating the row if needed.
pub async fn update_stats_handler(
    State(state): State<AppState>,
    payload: Result<Json<StatsUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<StatsResponse>> {
    let context = "Failed to update game statistics";
    let Json(request) = payload.map_err(|e| ApiError::json(&e))?;
    let update = request
        .to_update()
        .map_err(|e| ApiError::from_core(context, e))?;

    let now = Utc::now();
    let mut store = state.store.write().await;
    let mut stats = store
        .load_stats()
        .map_err(|e| ApiError::from_core(context, e))?
        .unwrap_or_else(|| GameStats::empty(now));
    update.apply_to(&mut stats);
    stats.updated_at = now;
    store
        .save_stats(&stats)
        .map_err(|e| ApiError::from_core(context, e))?;
    Ok(Json(StatsResponse::from(&stats)))
}
