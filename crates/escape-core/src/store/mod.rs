//! # Session Storage
//!
//! The `SessionStore` trait and its backends.
//!
//! - `MemoryStore`: `BTreeMap`-based, volatile
//! - `RedbStore`: disk-backed, one ACID write transaction per operation
//!
//! Timestamps are passed in by the caller so that stores stay deterministic.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::{
    CustomTimer, EscapeError, GameSession, GameStats, NewSession, SessionId, SessionRecord,
    SessionUpdate, StageCompletion, StageCompletionId, StageCompletionInput, TimerId,
};
use chrono::{DateTime, Utc};
use std::path::Path;

// =============================================================================
// SESSIONSTORE TRAIT
// =============================================================================

/// CRUD operations over game sessions and their owned records.
///
/// All fallible operations return `Result<T, EscapeError>` so that in-memory
/// and persistent backends behave uniformly.
pub trait SessionStore {
    /// Create a session and, for a non-zero custom duration, its timer.
    fn create_session(
        &mut self,
        new: &NewSession,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, EscapeError>;

    /// Fetch a session with its timer and stage completions.
    fn get_session(&self, id: SessionId) -> Result<Option<SessionRecord>, EscapeError>;

    /// All sessions, newest first.
    fn list_sessions(&self) -> Result<Vec<SessionRecord>, EscapeError>;

    /// Apply a partial update. Unknown ids yield `SessionNotFound`.
    fn update_session(
        &mut self,
        id: SessionId,
        update: &SessionUpdate,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, EscapeError>;

    /// Delete a session together with its timer and stage completions.
    fn delete_session(&mut self, id: SessionId) -> Result<(), EscapeError>;

    /// Insert or update the completion keyed on `(game_session_id, stage_id)`.
    fn upsert_stage_completion(
        &mut self,
        input: &StageCompletionInput,
        now: DateTime<Utc>,
    ) -> Result<StageCompletion, EscapeError>;

    /// The stored statistics row, if one was ever written.
    fn load_stats(&self) -> Result<Option<GameStats>, EscapeError>;

    /// Replace the statistics row.
    fn save_stats(&mut self, stats: &GameStats) -> Result<(), EscapeError>;

    /// Number of stored sessions.
    fn session_count(&self) -> Result<usize, EscapeError>;
}

// =============================================================================
// BACKEND SELECTION
// =============================================================================

/// Storage backend chosen at startup.
#[derive(Debug)]
pub enum StoreBackend {
    /// Volatile in-memory store.
    InMemory(MemoryStore),
    /// Disk-backed store using redb.
    Persistent(RedbStore),
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StoreBackend {
    /// Open (or create) a redb database at `path`.
    pub fn open_persistent(path: impl AsRef<Path>) -> Result<Self, EscapeError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Check if this backend writes to disk.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    fn inner(&self) -> &dyn SessionStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SessionStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

impl SessionStore for StoreBackend {
    fn create_session(
        &mut self,
        new: &NewSession,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, EscapeError> {
        self.inner_mut().create_session(new, now)
    }

    fn get_session(&self, id: SessionId) -> Result<Option<SessionRecord>, EscapeError> {
        self.inner().get_session(id)
    }

    fn list_sessions(&self) -> Result<Vec<SessionRecord>, EscapeError> {
        self.inner().list_sessions()
    }

    fn update_session(
        &mut self,
        id: SessionId,
        update: &SessionUpdate,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, EscapeError> {
        self.inner_mut().update_session(id, update, now)
    }

    fn delete_session(&mut self, id: SessionId) -> Result<(), EscapeError> {
        self.inner_mut().delete_session(id)
    }

    fn upsert_stage_completion(
        &mut self,
        input: &StageCompletionInput,
        now: DateTime<Utc>,
    ) -> Result<StageCompletion, EscapeError> {
        self.inner_mut().upsert_stage_completion(input, now)
    }

    fn load_stats(&self) -> Result<Option<GameStats>, EscapeError> {
        self.inner().load_stats()
    }

    fn save_stats(&mut self, stats: &GameStats) -> Result<(), EscapeError> {
        self.inner_mut().save_stats(stats)
    }

    fn session_count(&self) -> Result<usize, EscapeError> {
        self.inner().session_count()
    }
}

// =============================================================================
// SHARED RECORD BUILDERS
// =============================================================================

/// Build a fresh session row (and its timer) from a validated request.
fn build_session(
    id: SessionId,
    timer_id: TimerId,
    new: &NewSession,
    now: DateTime<Utc>,
) -> (GameSession, Option<CustomTimer>) {
    let session = GameSession {
        id,
        player_name: new.player_name.trim().to_string(),
        course: new.course.trim().to_string(),
        module: new.module.trim().to_string(),
        start_time: now,
        end_time: None,
        total_time: new.total_time,
        time_remaining: new.time_remaining,
        score: crate::Points::ZERO,
        hints_used: 0,
        is_completed: false,
        created_at: now,
        updated_at: now,
    };
    let timer = new
        .custom_timer_duration
        .filter(|&minutes| minutes > 0)
        .map(|duration| CustomTimer {
            id: timer_id,
            duration,
        });
    (session, timer)
}

/// Check whether a request will create a timer row.
fn wants_timer(new: &NewSession) -> bool {
    new.custom_timer_duration.is_some_and(|minutes| minutes > 0)
}

/// Build a new stage completion row.
fn build_stage(
    id: StageCompletionId,
    input: &StageCompletionInput,
    now: DateTime<Utc>,
) -> StageCompletion {
    StageCompletion {
        id,
        game_session_id: input.game_session_id,
        stage_id: input.stage_id,
        stage_title: input.stage_title.clone(),
        stage_type: input.stage_type,
        completed: input.completed,
        time_spent: input.time_spent,
        hints_used: input.hints_used,
        completed_at: input.completed.then_some(now),
    }
}

/// Update an existing stage completion in place.
///
/// Title and kind keep their first-written values.
fn merge_stage(existing: &mut StageCompletion, input: &StageCompletionInput, now: DateTime<Utc>) {
    existing.completed = input.completed;
    existing.time_spent = input.time_spent;
    existing.hints_used = input.hints_used;
    existing.completed_at = input.completed.then_some(now);
}

// =============================================================================
// CONTRACT TESTS
// =============================================================================

/// Behaviour shared by every backend, run against each of them.
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use crate::{Points, StageKind};
    use chrono::TimeZone;

    pub fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0)
            .single()
            .expect("valid timestamp")
    }

    pub fn new_session(name: &str, custom: Option<u32>) -> NewSession {
        let total = custom.map_or(2700, |m| m * 60);
        NewSession {
            player_name: name.to_string(),
            course: "BIT".to_string(),
            module: "Web Development".to_string(),
            total_time: total,
            time_remaining: total,
            custom_timer_duration: custom,
        }
    }

    pub fn stage_input(session: SessionId, stage_id: u8, time_spent: u32) -> StageCompletionInput {
        StageCompletionInput {
            game_session_id: session,
            stage_id,
            stage_title: format!("Stage {}", stage_id),
            stage_type: StageKind::ALL[usize::from(stage_id) - 1],
            completed: true,
            time_spent,
            hints_used: 1,
        }
    }

    pub fn create_and_get(store: &mut dyn SessionStore) {
        let created = store
            .create_session(&new_session("Ava", None), at(0))
            .expect("create");
        assert!(created.custom_timer.is_none());
        assert_eq!(created.session.total_time, 2700);

        let fetched = store
            .get_session(created.session.id)
            .expect("get")
            .expect("present");
        assert_eq!(fetched, created);
        assert!(store.get_session(SessionId(9999)).expect("get").is_none());
    }

    pub fn custom_timer_only_for_positive_duration(store: &mut dyn SessionStore) {
        let with_timer = store
            .create_session(&new_session("Ben", Some(15)), at(0))
            .expect("create");
        assert_eq!(with_timer.custom_timer.map(|t| t.duration), Some(15));

        let mut zero = new_session("Cat", None);
        zero.custom_timer_duration = Some(0);
        let without = store.create_session(&zero, at(1)).expect("create");
        assert!(without.custom_timer.is_none());
    }

    pub fn list_is_newest_first(store: &mut dyn SessionStore) {
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            store
                .create_session(&new_session(name, None), at(i as i64))
                .expect("create");
        }
        let names: Vec<String> = store
            .list_sessions()
            .expect("list")
            .into_iter()
            .map(|r| r.session.player_name)
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);
        assert_eq!(store.session_count().expect("count"), 3);
    }

    pub fn partial_update(store: &mut dyn SessionStore) {
        let created = store
            .create_session(&new_session("Dan", None), at(0))
            .expect("create");
        let update = SessionUpdate {
            score: Some(Points::from_millis(99_500)),
            time_remaining: Some(2600),
            ..SessionUpdate::default()
        };
        let updated = store
            .update_session(created.session.id, &update, at(100))
            .expect("update");
        assert_eq!(updated.session.score, Points::from_millis(99_500));
        assert_eq!(updated.session.time_remaining, 2600);
        assert_eq!(updated.session.hints_used, 0);
        assert_eq!(updated.session.updated_at, at(100));
        assert_eq!(updated.session.created_at, at(0));

        let missing = store.update_session(SessionId(777), &update, at(101));
        assert!(matches!(missing, Err(EscapeError::SessionNotFound(_))));
    }

    pub fn stage_upsert_keeps_one_row(store: &mut dyn SessionStore) {
        let id = store
            .create_session(&new_session("Eve", None), at(0))
            .expect("create")
            .session
            .id;
        let first = store
            .upsert_stage_completion(&stage_input(id, 1, 30), at(30))
            .expect("upsert");
        let mut again = stage_input(id, 1, 45);
        again.stage_title = "Renamed".to_string();
        let second = store
            .upsert_stage_completion(&again, at(45))
            .expect("upsert");

        assert_eq!(first.id, second.id);
        assert_eq!(second.time_spent, 45);
        assert_eq!(second.stage_title, "Stage 1");
        assert_eq!(second.completed_at, Some(at(45)));

        let record = store.get_session(id).expect("get").expect("present");
        assert_eq!(record.stages.len(), 1);
    }

    pub fn stage_upsert_requires_session(store: &mut dyn SessionStore) {
        let result = store.upsert_stage_completion(&stage_input(SessionId(42), 2, 10), at(0));
        assert!(matches!(result, Err(EscapeError::SessionNotFound(_))));
    }

    pub fn incomplete_stage_has_no_timestamp(store: &mut dyn SessionStore) {
        let id = store
            .create_session(&new_session("Fay", None), at(0))
            .expect("create")
            .session
            .id;
        let mut input = stage_input(id, 3, 12);
        input.completed = false;
        let row = store.upsert_stage_completion(&input, at(12)).expect("upsert");
        assert!(row.completed_at.is_none());
    }

    pub fn stages_are_ordered_by_stage_id(store: &mut dyn SessionStore) {
        let id = store
            .create_session(&new_session("Gus", None), at(0))
            .expect("create")
            .session
            .id;
        for stage in [3, 1, 2] {
            store
                .upsert_stage_completion(&stage_input(id, stage, 5), at(i64::from(stage)))
                .expect("upsert");
        }
        let record = store.get_session(id).expect("get").expect("present");
        let ids: Vec<u8> = record.stages.iter().map(|s| s.stage_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    pub fn delete_cascades(store: &mut dyn SessionStore) {
        let keep = store
            .create_session(&new_session("Hal", Some(30)), at(0))
            .expect("create")
            .session
            .id;
        let gone = store
            .create_session(&new_session("Ivy", Some(30)), at(1))
            .expect("create")
            .session
            .id;
        store
            .upsert_stage_completion(&stage_input(keep, 1, 5), at(2))
            .expect("upsert");
        store
            .upsert_stage_completion(&stage_input(gone, 1, 5), at(3))
            .expect("upsert");

        store.delete_session(gone).expect("delete");
        assert!(store.get_session(gone).expect("get").is_none());
        assert!(matches!(
            store.delete_session(gone),
            Err(EscapeError::SessionNotFound(_))
        ));

        let kept = store.get_session(keep).expect("get").expect("present");
        assert_eq!(kept.stages.len(), 1);
        assert!(kept.custom_timer.is_some());

        // A new session never inherits rows of the deleted one.
        let fresh = store
            .create_session(&new_session("Jon", None), at(4))
            .expect("create");
        assert!(fresh.stages.is_empty());
    }

    pub fn stats_round_trip(store: &mut dyn SessionStore) {
        assert!(store.load_stats().expect("load").is_none());
        let mut stats = GameStats::empty(at(0));
        stats.total_games = 4;
        stats.average_score = Points::from_millis(450_250);
        store.save_stats(&stats).expect("save");
        assert_eq!(store.load_stats().expect("load"), Some(stats));
    }

    /// Run every contract check against fresh stores from `make`.
    pub fn run_all(mut make: impl FnMut() -> Box<dyn SessionStore>) {
        create_and_get(make().as_mut());
        custom_timer_only_for_positive_duration(make().as_mut());
        list_is_newest_first(make().as_mut());
        partial_update(make().as_mut());
        stage_upsert_keeps_one_row(make().as_mut());
        stage_upsert_requires_session(make().as_mut());
        incomplete_stage_has_no_timestamp(make().as_mut());
        stages_are_ordered_by_stage_id(make().as_mut());
        delete_cascades(make().as_mut());
        stats_round_trip(make().as_mut());
    }
}
