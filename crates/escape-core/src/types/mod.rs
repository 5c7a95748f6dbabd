//! # Core Type Definitions
//!
//! This module contains the data model of the escape room:
//! - Record identifiers (`SessionId`, `StageCompletionId`, `TimerId`)
//! - Scores (`Points`, integer millipoints)
//! - Persisted records (`GameSession`, `StageCompletion`, `CustomTimer`, `GameStats`)
//! - Write requests (`NewSession`, `SessionUpdate`, `StageCompletionInput`, `StatsUpdate`)
//! - Error types (`EscapeError`)
//!
//! ## Arithmetic
//!
//! Scores never use floating point inside the core. `Points` wraps a count of
//! millipoints and only converts to `f64` at the JSON boundary.

use crate::primitives::{MAX_LABEL_LENGTH, MAX_STAGE_TITLE_LENGTH, MILLIPOINTS_PER_POINT, STAGE_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a persisted game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// Identifier of a persisted stage completion record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageCompletionId(pub u64);

/// Identifier of a custom timer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = EscapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(SessionId)
            .map_err(|_| EscapeError::Validation(format!("Invalid session id '{}'", s)))
    }
}

// =============================================================================
// POINTS
// =============================================================================

/// A score, stored as integer millipoints.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Points(pub i64);

impl Points {
    /// Zero points.
    pub const ZERO: Points = Points(0);

    /// Create from a raw millipoint count.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Create from a whole number of points.
    #[must_use]
    pub const fn from_whole(points: i64) -> Self {
        Self(points.saturating_mul(MILLIPOINTS_PER_POINT))
    }

    /// Raw millipoint count.
    #[must_use]
    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Add using saturating arithmetic.
    #[must_use]
    pub const fn saturating_add(self, other: Points) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Decimal points for the JSON surface.
    #[allow(clippy::float_arithmetic)]
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / MILLIPOINTS_PER_POINT as f64
    }

    /// Parse decimal points coming from the JSON surface.
    ///
    /// Non-finite values are rejected; the result is rounded to the nearest
    /// millipoint.
    #[allow(clippy::float_arithmetic)]
    pub fn try_from_f64(points: f64) -> Result<Self, EscapeError> {
        if !points.is_finite() {
            return Err(EscapeError::Validation(
                "score must be a finite number".to_string(),
            ));
        }
        Ok(Self((points * MILLIPOINTS_PER_POINT as f64).round() as i64))
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MILLIPOINTS_PER_POINT;
        let frac = (self.0 % MILLIPOINTS_PER_POINT).unsigned_abs();
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            let digits = format!("{:03}", frac);
            write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
        }
    }
}

// =============================================================================
// STAGE KIND
// =============================================================================

/// The six puzzle kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Reformat a minified JavaScript snippet.
    CodeFormat,
    /// Pick the debugging tool among several applications.
    DebugClick,
    /// Produce the integer sequence 0..=1000.
    NumberGenerator,
    /// Convert JSON records to CSV.
    DataPort,
    /// Position five boxes with CSS.
    CssPuzzle,
    /// Fill in a boolean truth table.
    LogicGate,
}

impl StageKind {
    /// All kinds in catalog order.
    pub const ALL: [StageKind; STAGE_COUNT] = [
        StageKind::CodeFormat,
        StageKind::DebugClick,
        StageKind::NumberGenerator,
        StageKind::DataPort,
        StageKind::CssPuzzle,
        StageKind::LogicGate,
    ];

    /// Wire name (kebab-case).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::CodeFormat => "code-format",
            StageKind::DebugClick => "debug-click",
            StageKind::NumberGenerator => "number-generator",
            StageKind::DataPort => "data-port",
            StageKind::CssPuzzle => "css-puzzle",
            StageKind::LogicGate => "logic-gate",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = EscapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EscapeError::Validation(format!("Unknown stage type '{}'", s)))
    }
}

// =============================================================================
// PERSISTED RECORDS
// =============================================================================

/// A user-chosen session duration, owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTimer {
    pub id: TimerId,
    /// Duration in minutes.
    pub duration: u32,
}

/// One play-through of the escape room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub player_name: String,
    pub course: String,
    pub module: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Session length in seconds.
    pub total_time: u32,
    /// Seconds left on the countdown.
    pub time_remaining: u32,
    pub score: Points,
    pub hints_used: u32,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameSession {
    /// Seconds elapsed on the countdown.
    #[must_use]
    pub fn time_spent(&self) -> u32 {
        self.total_time.saturating_sub(self.time_remaining)
    }
}

/// Persisted outcome of one stage within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCompletion {
    pub id: StageCompletionId,
    pub game_session_id: SessionId,
    /// Stage number, 1-based.
    pub stage_id: u8,
    pub stage_title: String,
    pub stage_type: StageKind,
    pub completed: bool,
    /// Seconds spent on the stage.
    pub time_spent: u32,
    pub hints_used: u32,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A session together with its owned records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session: GameSession,
    pub custom_timer: Option<CustomTimer>,
    /// Stage completions ordered by stage id.
    pub stages: Vec<StageCompletion>,
}

/// Aggregate counters over all sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub total_games: u64,
    pub completed_games: u64,
    /// Mean score of completed sessions.
    pub average_score: Points,
    /// Mean countdown time used by completed sessions, in milliseconds.
    pub average_time_millis: u64,
    pub total_hints_used: u64,
    pub updated_at: DateTime<Utc>,
}

impl GameStats {
    /// All-zero statistics stamped with the given time.
    #[must_use]
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            total_games: 0,
            completed_games: 0,
            average_score: Points::ZERO,
            average_time_millis: 0,
            total_hints_used: 0,
            updated_at: now,
        }
    }
}

// =============================================================================
// WRITE REQUESTS
// =============================================================================

/// Fields needed to create a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub player_name: String,
    pub course: String,
    pub module: String,
    pub total_time: u32,
    pub time_remaining: u32,
    /// Custom timer duration in minutes, if the player chose one.
    pub custom_timer_duration: Option<u32>,
}

impl NewSession {
    /// Validate labels and the timer invariant.
    pub fn validate(&self) -> Result<(), EscapeError> {
        validate_label("playerName", &self.player_name)?;
        validate_label("course", &self.course)?;
        validate_label("module", &self.module)?;
        if self.time_remaining > self.total_time {
            return Err(EscapeError::Validation(format!(
                "timeRemaining {} exceeds totalTime {}",
                self.time_remaining, self.total_time
            )));
        }
        Ok(())
    }
}

/// Partial update of a session. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub score: Option<Points>,
    pub hints_used: Option<u32>,
    pub is_completed: Option<bool>,
    pub end_time: Option<DateTime<Utc>>,
    pub time_remaining: Option<u32>,
}

impl SessionUpdate {
    /// Apply the present fields to a session.
    ///
    /// `time_remaining` is clamped to the session's `total_time`.
    pub fn apply_to(&self, session: &mut GameSession) {
        if let Some(score) = self.score {
            session.score = score;
        }
        if let Some(hints) = self.hints_used {
            session.hints_used = hints;
        }
        if let Some(done) = self.is_completed {
            session.is_completed = done;
        }
        if let Some(end) = self.end_time {
            session.end_time = Some(end);
        }
        if let Some(remaining) = self.time_remaining {
            session.time_remaining = remaining.min(session.total_time);
        }
    }
}

/// Fields of a stage completion upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCompletionInput {
    pub game_session_id: SessionId,
    pub stage_id: u8,
    pub stage_title: String,
    pub stage_type: StageKind,
    pub completed: bool,
    pub time_spent: u32,
    pub hints_used: u32,
}

impl StageCompletionInput {
    /// Validate stage number and title.
    pub fn validate(&self) -> Result<(), EscapeError> {
        if self.stage_id == 0 || usize::from(self.stage_id) > STAGE_COUNT {
            return Err(EscapeError::InvalidStage(self.stage_id));
        }
        if self.stage_title.trim().is_empty() {
            return Err(EscapeError::Validation(
                "stageTitle must not be empty".to_string(),
            ));
        }
        if self.stage_title.len() > MAX_STAGE_TITLE_LENGTH {
            return Err(EscapeError::Validation(format!(
                "stageTitle length {} exceeds maximum {} bytes",
                self.stage_title.len(),
                MAX_STAGE_TITLE_LENGTH
            )));
        }
        Ok(())
    }
}

/// Partial manual overwrite of the statistics row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsUpdate {
    pub total_games: Option<u64>,
    pub completed_games: Option<u64>,
    pub average_score: Option<Points>,
    pub average_time_millis: Option<u64>,
    pub total_hints_used: Option<u64>,
}

impl StatsUpdate {
    /// Apply the present fields to a statistics row.
    pub fn apply_to(&self, stats: &mut GameStats) {
        if let Some(v) = self.total_games {
            stats.total_games = v;
        }
        if let Some(v) = self.completed_games {
            stats.completed_games = v;
        }
        if let Some(v) = self.average_score {
            stats.average_score = v;
        }
        if let Some(v) = self.average_time_millis {
            stats.average_time_millis = v;
        }
        if let Some(v) = self.total_hints_used {
            stats.total_hints_used = v;
        }
    }
}

fn validate_label(field: &str, value: &str) -> Result<(), EscapeError> {
    if value.trim().is_empty() {
        return Err(EscapeError::Validation(format!(
            "Missing required field: {}",
            field
        )));
    }
    if value.len() > MAX_LABEL_LENGTH {
        return Err(EscapeError::Validation(format!(
            "{} length {} exceeds maximum {} bytes",
            field,
            value.len(),
            MAX_LABEL_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the escape room core.
///
/// - No silent failures: storage problems surface as `Result`s
/// - Gameplay code decides what to swallow (see `SyncPolicy`)
#[derive(Debug, Error)]
pub enum EscapeError {
    /// A request field is missing or malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced session does not exist.
    #[error("Game session not found: {0}")]
    SessionNotFound(SessionId),

    /// The stage number is outside 1..=6.
    #[error("Invalid stage: {0}")]
    InvalidStage(u8),

    /// The operation is not allowed in the current lifecycle phase.
    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    /// Every hint of the stage has already been revealed.
    #[error("No more hints for stage {0}")]
    HintsExhausted(u8),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A remote persistence call failed.
    #[error("Gateway error: {0}")]
    Gateway(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> GameSession {
        let now = Utc::now();
        GameSession {
            id: SessionId(1),
            player_name: "Zohaib".to_string(),
            course: "BIT".to_string(),
            module: "Web".to_string(),
            start_time: now,
            end_time: None,
            total_time: 900,
            time_remaining: 900,
            score: Points::ZERO,
            hints_used: 0,
            is_completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn points_display_trims_trailing_zeros() {
        assert_eq!(Points::from_millis(99_500).to_string(), "99.5");
        assert_eq!(Points::from_whole(100).to_string(), "100");
        assert_eq!(Points::from_millis(1_005).to_string(), "1.005");
    }

    #[test]
    fn points_float_boundary() {
        assert_eq!(Points::from_millis(99_500).as_f64(), 99.5);
        assert_eq!(
            Points::try_from_f64(99.5).expect("finite"),
            Points::from_millis(99_500)
        );
        assert!(Points::try_from_f64(f64::NAN).is_err());
    }

    #[test]
    fn stage_kind_round_trips_wire_names() {
        for kind in StageKind::ALL {
            assert_eq!(kind.as_str().parse::<StageKind>().expect("parse"), kind);
        }
        assert!("maze".parse::<StageKind>().is_err());
    }

    #[test]
    fn update_clamps_time_remaining() {
        let mut session = sample_session();
        let update = SessionUpdate {
            time_remaining: Some(5000),
            ..SessionUpdate::default()
        };
        update.apply_to(&mut session);
        assert_eq!(session.time_remaining, 900);
    }

    #[test]
    fn update_leaves_absent_fields() {
        let mut session = sample_session();
        let update = SessionUpdate {
            hints_used: Some(3),
            ..SessionUpdate::default()
        };
        update.apply_to(&mut session);
        assert_eq!(session.hints_used, 3);
        assert_eq!(session.score, Points::ZERO);
        assert!(!session.is_completed);
    }

    #[test]
    fn new_session_requires_labels() {
        let request = NewSession {
            player_name: "  ".to_string(),
            course: "BIT".to_string(),
            module: "Web".to_string(),
            total_time: 2700,
            time_remaining: 2700,
            custom_timer_duration: None,
        };
        assert!(matches!(
            request.validate(),
            Err(EscapeError::Validation(_))
        ));
    }

    #[test]
    fn stage_input_rejects_out_of_range_stage() {
        let input = StageCompletionInput {
            game_session_id: SessionId(1),
            stage_id: 7,
            stage_title: "Extra".to_string(),
            stage_type: StageKind::LogicGate,
            completed: true,
            time_spent: 10,
            hints_used: 0,
        };
        assert!(matches!(input.validate(), Err(EscapeError::InvalidStage(7))));
    }

    #[test]
    fn session_id_parses_numbers_only() {
        assert_eq!("42".parse::<SessionId>().expect("parse"), SessionId(42));
        assert!("cl9x".parse::<SessionId>().is_err());
    }
}
