//! # Performance Rating
//!
//! End-of-game verdicts derived from completion rate, remaining time and
//! score.

use crate::controller::GameState;
use crate::primitives::STAGE_COUNT;
use crate::Points;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remaining seconds above which a full clear rates `MasterCoder`.
pub const MASTER_REMAINING_SECONDS: u32 = 600;

/// Remaining seconds above which a full clear rates `Excellent`.
pub const EXCELLENT_REMAINING_SECONDS: u32 = 300;

/// Overall verdict for a play-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceRating {
    TryAgain,
    KeepLearning,
    WellDone,
    GoodJob,
    Excellent,
    MasterCoder,
}

impl PerformanceRating {
    /// Rate a play-through from its completed stage count and remaining time.
    #[must_use]
    pub fn assess(completed: usize, total: usize, time_remaining: u32) -> Self {
        if total == 0 {
            return Self::TryAgain;
        }
        // Percent thresholds compared without division.
        let pct_at_least = |pct: usize| completed * 100 >= pct * total;
        if completed >= total {
            if time_remaining > MASTER_REMAINING_SECONDS {
                Self::MasterCoder
            } else if time_remaining > EXCELLENT_REMAINING_SECONDS {
                Self::Excellent
            } else {
                Self::GoodJob
            }
        } else if pct_at_least(80) {
            Self::WellDone
        } else if pct_at_least(60) {
            Self::KeepLearning
        } else {
            Self::TryAgain
        }
    }

    /// Rate a controller's state.
    #[must_use]
    pub fn for_state(state: &GameState) -> Self {
        Self::assess(state.completed_count(), STAGE_COUNT, state.time_remaining)
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::MasterCoder => "Master Coder",
            Self::Excellent => "Excellent",
            Self::GoodJob => "Good Job",
            Self::WellDone => "Well Done",
            Self::KeepLearning => "Keep Learning",
            Self::TryAgain => "Try Again",
        }
    }
}

impl fmt::Display for PerformanceRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Score band used to color a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    Low,
    Fair,
    Good,
    High,
}

impl ScoreTier {
    #[must_use]
    pub fn of(score: Points) -> Self {
        if score >= Points::from_whole(500) {
            Self::High
        } else if score >= Points::from_whole(300) {
            Self::Good
        } else if score >= Points::from_whole(100) {
            Self::Fair
        } else {
            Self::Low
        }
    }
}

/// Mean seconds spent per completed stage, floored. `None` when no stage
/// was completed.
#[must_use]
pub fn average_stage_seconds(state: &GameState) -> Option<u32> {
    let done: Vec<u32> = state
        .stages
        .iter()
        .filter(|s| s.completed)
        .map(|s| s.time_spent)
        .collect();
    if done.is_empty() {
        return None;
    }
    let sum: u64 = done.iter().map(|&t| u64::from(t)).sum();
    Some((sum / done.len() as u64) as u32)
}
