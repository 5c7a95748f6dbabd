//! # In-Memory Session Store
//!
//! Volatile storage over `BTreeMap`s. Used by tests, by `--backend memory`
//! and by the local play mode.

use super::{SessionStore, build_session, build_stage, merge_stage, wants_timer};
use crate::{
    CustomTimer, EscapeError, GameSession, GameStats, NewSession, SessionId, SessionRecord,
    SessionUpdate, StageCompletion, StageCompletionId, StageCompletionInput, TimerId,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// In-memory session store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sessions: BTreeMap<SessionId, GameSession>,
    timers: BTreeMap<SessionId, CustomTimer>,
    stages: BTreeMap<(SessionId, u8), StageCompletion>,
    stats: Option<GameStats>,
    next_session_id: u64,
    next_stage_id: u64,
    next_timer_id: u64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, session: &GameSession) -> SessionRecord {
        let id = session.id;
        SessionRecord {
            session: session.clone(),
            custom_timer: self.timers.get(&id).cloned(),
            stages: self
                .stages
                .range((id, 0)..=(id, u8::MAX))
                .map(|(_, stage)| stage.clone())
                .collect(),
        }
    }

    fn allocate(counter: &mut u64) -> u64 {
        *counter = counter.saturating_add(1);
        *counter
    }
}

impl SessionStore for MemoryStore {
    fn create_session(
        &mut self,
        new: &NewSession,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, EscapeError> {
        new.validate()?;
        let id = SessionId(Self::allocate(&mut self.next_session_id));
        let timer_id = if wants_timer(new) {
            TimerId(Self::allocate(&mut self.next_timer_id))
        } else {
            TimerId(0)
        };
        let (session, timer) = build_session(id, timer_id, new, now);
        if let Some(timer) = timer {
            self.timers.insert(id, timer);
        }
        let record = self.record(&session);
        self.sessions.insert(id, session);
        Ok(record)
    }

    fn get_session(&self, id: SessionId) -> Result<Option<SessionRecord>, EscapeError> {
        Ok(self.sessions.get(&id).map(|s| self.record(s)))
    }

    fn list_sessions(&self) -> Result<Vec<SessionRecord>, EscapeError> {
        Ok(self.sessions.values().rev().map(|s| self.record(s)).collect())
    }

    fn update_session(
        &mut self,
        id: SessionId,
        update: &SessionUpdate,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, EscapeError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(EscapeError::SessionNotFound(id))?;
        update.apply_to(session);
        session.updated_at = now;
        let session = session.clone();
        Ok(self.record(&session))
    }

    fn delete_session(&mut self, id: SessionId) -> Result<(), EscapeError> {
        if self.sessions.remove(&id).is_none() {
            return Err(EscapeError::SessionNotFound(id));
        }
        self.timers.remove(&id);
        self.stages.retain(|(owner, _), _| *owner != id);
        Ok(())
    }

    fn upsert_stage_completion(
        &mut self,
        input: &StageCompletionInput,
        now: DateTime<Utc>,
    ) -> Result<StageCompletion, EscapeError> {
        input.validate()?;
        let owner = input.game_session_id;
        if !self.sessions.contains_key(&owner) {
            return Err(EscapeError::SessionNotFound(owner));
        }
        let key = (owner, input.stage_id);
        if let Some(existing) = self.stages.get_mut(&key) {
            merge_stage(existing, input, now);
            return Ok(existing.clone());
        }
        let id = StageCompletionId(Self::allocate(&mut self.next_stage_id));
        let stage = build_stage(id, input, now);
        self.stages.insert(key, stage.clone());
        Ok(stage)
    }

    fn load_stats(&self) -> Result<Option<GameStats>, EscapeError> {
        Ok(self.stats.clone())
    }

    fn save_stats(&mut self, stats: &GameStats) -> Result<(), EscapeError> {
        self.stats = Some(stats.clone());
        Ok(())
    }

    fn session_count(&self) -> Result<usize, EscapeError> {
        Ok(self.sessions.len())
    }
}
