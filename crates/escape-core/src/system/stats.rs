//! # Aggregate Statistics
//!
//! Recomputes the global statistics row from every stored session.
//!
//! | Field | Source |
//! |-------|--------|
//! | `total_games` | all sessions |
//! | `completed_games` | sessions with `is_completed` |
//! | `average_score` | mean score of completed sessions |
//! | `average_time_millis` | mean `total_time - time_remaining` of completed sessions |
//! | `total_hints_used` | sum over all sessions |

use crate::store::SessionStore;
use crate::{EscapeError, GameSession, GameStats, Points};
use chrono::{DateTime, Utc};

impl GameStats {
    /// Aggregate a set of sessions.
    ///
    /// The score mean is floored to a millipoint and the time mean is rounded
    /// to the nearest millisecond. With no completed sessions both are zero.
    #[must_use]
    pub fn from_sessions<'a>(
        sessions: impl IntoIterator<Item = &'a GameSession>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut stats = GameStats::empty(now);
        let mut score_sum: i64 = 0;
        let mut time_sum: u64 = 0;

        for session in sessions {
            stats.total_games += 1;
            stats.total_hints_used = stats
                .total_hints_used
                .saturating_add(u64::from(session.hints_used));
            if session.is_completed {
                stats.completed_games += 1;
                score_sum = score_sum.saturating_add(session.score.millis());
                time_sum = time_sum.saturating_add(u64::from(session.time_spent()));
            }
        }

        if stats.completed_games > 0 {
            stats.average_score = Points::from_millis(score_sum / stats.completed_games as i64);
            let time_millis = time_sum.saturating_mul(1000);
            stats.average_time_millis = time_millis.saturating_add(stats.completed_games / 2)
                / stats.completed_games;
        }
        stats
    }
}

/// Recompute statistics from a store and persist them, returning the new row.
///
/// A statistics row is created on first use.
pub fn refresh_stats<S: SessionStore + ?Sized>(
    store: &mut S,
    now: DateTime<Utc>,
) -> Result<GameStats, EscapeError> {
    let records = store.list_sessions()?;
    let stats = GameStats::from_sessions(records.iter().map(|r| &r.session), now);
    store.save_stats(&stats)?;
    tracing::debug!(
        total = stats.total_games,
        completed = stats.completed_games,
        "statistics recomputed"
    );
    Ok(stats)
}
