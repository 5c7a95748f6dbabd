//! # Game Primitives
//!
//! Fixed runtime constants for the escape room core.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// Number of stages in one play-through.
pub const STAGE_COUNT: usize = 6;

/// Default session length when no custom timer is chosen (45 minutes).
pub const DEFAULT_TOTAL_SECONDS: u32 = 45 * 60;

/// Smallest custom timer accepted by the controller, in minutes.
pub const MIN_CUSTOM_MINUTES: u32 = 1;

/// Largest custom timer accepted by the controller, in minutes.
pub const MAX_CUSTOM_MINUTES: u32 = 180;

/// One point expressed in millipoints.
///
/// Scores are stored as integer millipoints: 99.5 points is `99_500`.
pub const MILLIPOINTS_PER_POINT: i64 = 1000;

/// Maximum points awarded for a single stage (100 points).
pub const MAX_STAGE_MILLIPOINTS: i64 = 100 * MILLIPOINTS_PER_POINT;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for player name, course and module strings.
///
/// Longer values are rejected at the API boundary.
pub const MAX_LABEL_LENGTH: usize = 256;

/// Maximum length for a stage title.
pub const MAX_STAGE_TITLE_LENGTH: usize = 256;

/// Maximum length of a puzzle submission (code, CSS, CSV).
pub const MAX_SUBMISSION_LENGTH: usize = 64 * 1024;

/// Points earned for completing a stage in `time_spent` seconds.
///
/// `max(0, 100 - time_spent / 60)` points, in millipoints. The deduction is
/// rounded to the nearest millipoint, halves up.
#[must_use]
pub const fn stage_millipoints(time_spent: u32) -> i64 {
    let deduction = ((time_spent as i64) * MILLIPOINTS_PER_POINT + 30) / 60;
    let earned = MAX_STAGE_MILLIPOINTS - deduction;
    if earned > 0 { earned } else { 0 }
}
