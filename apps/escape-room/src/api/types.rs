//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Field names are camelCase on the wire. Scores travel as decimal points
//! and average time as decimal minutes; both are converted to the core's
//! integer representation here and nowhere else.

use chrono::{DateTime, Utc};
use escape_core::primitives::DEFAULT_TOTAL_SECONDS;
use escape_core::{
    CustomTimer, EscapeError, GameSession, GameStats, NewSession, Points, SessionId, SessionRecord,
    SessionUpdate, StageCompletion, StageCompletionInput, StageKind, StatsUpdate,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR / MESSAGE RESPONSES
// =============================================================================

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// =============================================================================
// ID REFERENCES
// =============================================================================

/// A session id as sent by clients: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdRef {
    Number(u64),
    Text(String),
}

impl IdRef {
    /// The numeric id, or `None` if the text is not a number.
    #[must_use]
    pub fn resolve(&self) -> Option<SessionId> {
        match self {
            IdRef::Number(n) => Some(SessionId(*n)),
            IdRef::Text(s) => s.parse().ok(),
        }
    }
}

// =============================================================================
// SESSION REQUESTS
// =============================================================================

/// `POST /game-sessions` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub player_name: Option<String>,
    pub course: Option<String>,
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_timer_duration: Option<u32>,
}

impl CreateSessionRequest {
    /// Validate and apply defaults.
    ///
    /// Missing or zero `totalTime` means 45 minutes; missing or zero
    /// `timeRemaining` means the full `totalTime`.
    pub fn to_new_session(&self) -> Result<NewSession, EscapeError> {
        let missing: Vec<&str> = [
            ("playerName", &self.player_name),
            ("course", &self.course),
            ("module", &self.module),
        ]
        .into_iter()
        .filter(|(_, v)| v.as_deref().is_none_or(|s| s.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(EscapeError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let total_time = self
            .total_time
            .filter(|&t| t > 0)
            .unwrap_or(DEFAULT_TOTAL_SECONDS);
        let time_remaining = self.time_remaining.filter(|&t| t > 0).unwrap_or(total_time);
        let new = NewSession {
            player_name: self.player_name.clone().unwrap_or_default(),
            course: self.course.clone().unwrap_or_default(),
            module: self.module.clone().unwrap_or_default(),
            total_time,
            time_remaining,
            custom_timer_duration: self.custom_timer_duration,
        };
        new.validate()?;
        Ok(new)
    }
}

impl From<&NewSession> for CreateSessionRequest {
    fn from(new: &NewSession) -> Self {
        Self {
            player_name: Some(new.player_name.clone()),
            course: Some(new.course.clone()),
            module: Some(new.module.clone()),
            total_time: Some(new.total_time),
            time_remaining: Some(new.time_remaining),
            custom_timer_duration: new.custom_timer_duration,
        }
    }
}

/// `PUT /game-sessions/{id}` body. Absent fields stay untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<u32>,
}

impl UpdateSessionRequest {
    pub fn to_update(&self) -> Result<SessionUpdate, EscapeError> {
        let score = self.score.map(Points::try_from_f64).transpose()?;
        if score.is_some_and(|s| s < Points::ZERO) {
            return Err(EscapeError::Validation(
                "score must not be negative".to_string(),
            ));
        }
        Ok(SessionUpdate {
            score,
            hints_used: self.hints_used,
            is_completed: self.is_completed,
            end_time: self.end_time,
            time_remaining: self.time_remaining,
        })
    }
}

impl From<&SessionUpdate> for UpdateSessionRequest {
    fn from(update: &SessionUpdate) -> Self {
        Self {
            score: update.score.map(Points::as_f64),
            hints_used: update.hints_used,
            is_completed: update.is_completed,
            end_time: update.end_time,
            time_remaining: update.time_remaining,
        }
    }
}

// =============================================================================
// SESSION RESPONSES
// =============================================================================

/// A custom timer as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTimerJson {
    pub id: u64,
    pub duration: u32,
    pub game_session_id: u64,
}

impl CustomTimerJson {
    fn new(timer: &CustomTimer, owner: SessionId) -> Self {
        Self {
            id: timer.id.0,
            duration: timer.duration,
            game_session_id: owner.0,
        }
    }
}

/// A stage completion as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCompletionJson {
    pub id: u64,
    pub game_session_id: u64,
    pub stage_id: u8,
    pub stage_title: String,
    pub stage_type: StageKind,
    pub completed: bool,
    pub time_spent: u32,
    pub hints_used: u32,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&StageCompletion> for StageCompletionJson {
    fn from(stage: &StageCompletion) -> Self {
        Self {
            id: stage.id.0,
            game_session_id: stage.game_session_id.0,
            stage_id: stage.stage_id,
            stage_title: stage.stage_title.clone(),
            stage_type: stage.stage_type,
            completed: stage.completed,
            time_spent: stage.time_spent,
            hints_used: stage.hints_used,
            completed_at: stage.completed_at,
        }
    }
}

/// A session with its timer and stages as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionJson {
    pub id: u64,
    pub player_name: String,
    pub course: String,
    pub module: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_time: u32,
    pub time_remaining: u32,
    pub score: f64,
    pub hints_used: u32,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub custom_timer: Option<CustomTimerJson>,
    pub stages: Vec<StageCompletionJson>,
}

impl SessionJson {
    fn from_session(session: &GameSession) -> Self {
        Self {
            id: session.id.0,
            player_name: session.player_name.clone(),
            course: session.course.clone(),
            module: session.module.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            total_time: session.total_time,
            time_remaining: session.time_remaining,
            score: session.score.as_f64(),
            hints_used: session.hints_used,
            is_completed: session.is_completed,
            created_at: session.created_at,
            updated_at: session.updated_at,
            custom_timer: None,
            stages: Vec::new(),
        }
    }
}

impl From<&SessionRecord> for SessionJson {
    fn from(record: &SessionRecord) -> Self {
        Self {
            custom_timer: record
                .custom_timer
                .as_ref()
                .map(|t| CustomTimerJson::new(t, record.session.id)),
            stages: record.stages.iter().map(StageCompletionJson::from).collect(),
            ..Self::from_session(&record.session)
        }
    }
}

impl SessionJson {
    /// Convert back into the core session (timer and stages dropped).
    pub fn to_session(&self) -> Result<GameSession, EscapeError> {
        Ok(GameSession {
            id: SessionId(self.id),
            player_name: self.player_name.clone(),
            course: self.course.clone(),
            module: self.module.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            total_time: self.total_time,
            time_remaining: self.time_remaining,
            score: Points::try_from_f64(self.score)?,
            hints_used: self.hints_used,
            is_completed: self.is_completed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// =============================================================================
// STAGE REQUEST
// =============================================================================

/// `POST /stages` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRequest {
    pub game_session_id: Option<IdRef>,
    pub stage_id: Option<u8>,
    pub stage_title: Option<String>,
    pub stage_type: Option<String>,
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints_used: Option<u32>,
}

/// Outcome of validating a stage request.
#[derive(Debug)]
pub enum StageTarget {
    /// A well-formed request.
    Valid(StageCompletionInput),
    /// Well-formed, but the session id can never exist (non-numeric).
    UnknownSession,
}

impl StageRequest {
    pub fn to_input(&self) -> Result<StageTarget, EscapeError> {
        let mut missing = Vec::new();
        if self.game_session_id.is_none() {
            missing.push("gameSessionId");
        }
        if self.stage_id.is_none() {
            missing.push("stageId");
        }
        if self.stage_title.as_deref().is_none_or(|s| s.trim().is_empty()) {
            missing.push("stageTitle");
        }
        if self.stage_type.is_none() {
            missing.push("stageType");
        }
        if self.completed.is_none() {
            missing.push("completed");
        }
        if !missing.is_empty() {
            return Err(EscapeError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        let (Some(session), Some(stage_id), Some(title), Some(kind), Some(completed)) = (
            &self.game_session_id,
            self.stage_id,
            &self.stage_title,
            &self.stage_type,
            self.completed,
        ) else {
            return Err(EscapeError::Validation("Missing required fields".to_string()));
        };

        let stage_type: StageKind = kind.parse()?;
        let Some(game_session_id) = session.resolve() else {
            return Ok(StageTarget::UnknownSession);
        };
        let input = StageCompletionInput {
            game_session_id,
            stage_id,
            stage_title: title.trim().to_string(),
            stage_type,
            completed,
            time_spent: self.time_spent.unwrap_or(0),
            hints_used: self.hints_used.unwrap_or(0),
        };
        input.validate()?;
        Ok(StageTarget::Valid(input))
    }
}

impl From<&StageCompletionInput> for StageRequest {
    fn from(input: &StageCompletionInput) -> Self {
        Self {
            game_session_id: Some(IdRef::Number(input.game_session_id.0)),
            stage_id: Some(input.stage_id),
            stage_title: Some(input.stage_title.clone()),
            stage_type: Some(input.stage_type.as_str().to_string()),
            completed: Some(input.completed),
            time_spent: Some(input.time_spent),
            hints_used: Some(input.hints_used),
        }
    }
}

impl StageCompletionJson {
    /// Convert back into the core record.
    pub fn to_stage(&self) -> StageCompletion {
        StageCompletion {
            id: escape_core::StageCompletionId(self.id),
            game_session_id: SessionId(self.game_session_id),
            stage_id: self.stage_id,
            stage_title: self.stage_title.clone(),
            stage_type: self.stage_type,
            completed: self.completed,
            time_spent: self.time_spent,
            hints_used: self.hints_used,
            completed_at: self.completed_at,
        }
    }
}

// =============================================================================
// STATISTICS
// =============================================================================

/// The statistics row as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_games: u64,
    pub completed_games: u64,
    pub average_score: f64,
    /// Minutes.
    pub average_time: f64,
    pub total_hints_used: u64,
    pub updated_at: DateTime<Utc>,
}

impl From<&GameStats> for StatsResponse {
    #[allow(clippy::float_arithmetic)]
    fn from(stats: &GameStats) -> Self {
        Self {
            total_games: stats.total_games,
            completed_games: stats.completed_games,
            average_score: stats.average_score.as_f64(),
            average_time: stats.average_time_millis as f64 / 60_000.0,
            total_hints_used: stats.total_hints_used,
            updated_at: stats.updated_at,
        }
    }
}

/// `POST /game-stats` body. Absent fields stay untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsUpdateRequest {
    pub total_games: Option<u64>,
    pub completed_games: Option<u64>,
    pub average_score: Option<f64>,
    /// Minutes.
    pub average_time: Option<f64>,
    pub total_hints_used: Option<u64>,
}

impl StatsUpdateRequest {
    #[allow(clippy::float_arithmetic)]
    pub fn to_update(&self) -> Result<StatsUpdate, EscapeError> {
        let average_score = self.average_score.map(Points::try_from_f64).transpose()?;
        let average_time_millis = match self.average_time {
            Some(minutes) if !minutes.is_finite() || minutes < 0.0 => {
                return Err(EscapeError::Validation(
                    "averageTime must be a non-negative number".to_string(),
                ));
            }
            Some(minutes) => Some((minutes * 60_000.0).round() as u64),
            None => None,
        };
        Ok(StatsUpdate {
            total_games: self.total_games,
            completed_games: self.completed_games,
            average_score,
            average_time_millis,
            total_hints_used: self.total_hints_used,
        })
    }
}
