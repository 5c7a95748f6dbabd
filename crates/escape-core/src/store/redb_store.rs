//! # redb-backed Session Store
//!
//! A disk-backed session store using the redb embedded database.
//!
//! - ACID transactions, one write transaction per store operation
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Records are serialized with postcard. Stage completions are keyed on
//! `(session_id, stage_id)` so that the upsert key is the table key and a
//! session's stages are one range scan.

use super::{SessionStore, build_session, build_stage, merge_stage, wants_timer};
use crate::{
    CustomTimer, EscapeError, GameSession, GameStats, NewSession, SessionId, SessionRecord,
    SessionUpdate, StageCompletion, StageCompletionId, StageCompletionInput, TimerId,
};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for sessions: SessionId(u64) -> serialized GameSession
const SESSIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("sessions");

/// Table for custom timers: owning SessionId(u64) -> serialized CustomTimer
const TIMERS: TableDefinition<u64, &[u8]> = TableDefinition::new("custom_timers");

/// Table for stage completions: (session_id, stage_id) -> serialized StageCompletion
const STAGES: TableDefinition<(u64, u8), &[u8]> = TableDefinition::new("stage_completions");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Table for the statistics row: key string -> serialized GameStats
const STATS: TableDefinition<&str, &[u8]> = TableDefinition::new("game_stats");

const NEXT_SESSION_ID: &str = "next_session_id";
const NEXT_STAGE_ID: &str = "next_stage_id";
const NEXT_TIMER_ID: &str = "next_timer_id";
const STATS_KEY: &str = "global";

fn io_err(e: impl std::fmt::Display) -> EscapeError {
    EscapeError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, EscapeError> {
    postcard::to_allocvec(value).map_err(|e| EscapeError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EscapeError> {
    postcard::from_bytes(bytes).map_err(|e| EscapeError::DeserializationError(e.to_string()))
}

/// A disk-backed session store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a session database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EscapeError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(SESSIONS).map_err(io_err)?;
            let _ = write_txn.open_table(TIMERS).map_err(io_err)?;
            let _ = write_txn.open_table(STAGES).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            let _ = write_txn.open_table(STATS).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        tracing::debug!(path = %path.as_ref().display(), "opened session database");
        Ok(Self { db })
    }
}

/// Bump a metadata counter inside a write transaction and return the new value.
fn next_id(
    metadata: &mut redb::Table<'_, &'static str, u64>,
    key: &'static str,
) -> Result<u64, EscapeError> {
    let current = metadata
        .get(key)
        .map_err(io_err)?
        .map(|v| v.value())
        .unwrap_or(0);
    let next = current.saturating_add(1);
    metadata.insert(key, next).map_err(io_err)?;
    Ok(next)
}

/// Assemble a session record from already-opened tables.
fn load_record<S, T, G>(
    sessions: &S,
    timers: &T,
    stages: &G,
    id: u64,
) -> Result<Option<SessionRecord>, EscapeError>
where
    S: ReadableTable<u64, &'static [u8]>,
    T: ReadableTable<u64, &'static [u8]>,
    G: ReadableTable<(u64, u8), &'static [u8]>,
{
    let session: GameSession = match sessions.get(id).map_err(io_err)? {
        Some(data) => decode(data.value())?,
        None => return Ok(None),
    };
    let custom_timer: Option<CustomTimer> = match timers.get(id).map_err(io_err)? {
        Some(data) => Some(decode(data.value())?),
        None => None,
    };
    let mut stage_rows = Vec::new();
    for entry in stages.range((id, 0u8)..=(id, u8::MAX)).map_err(io_err)? {
        let (_key, value) = entry.map_err(io_err)?;
        stage_rows.push(decode::<StageCompletion>(value.value())?);
    }
    Ok(Some(SessionRecord {
        session,
        custom_timer,
        stages: stage_rows,
    }))
}

impl SessionStore for RedbStore {
    fn create_session(
        &mut self,
        new: &NewSession,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, EscapeError> {
        new.validate()?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let (session, timer) = {
            let mut metadata = write_txn.open_table(METADATA).map_err(io_err)?;
            let id = SessionId(next_id(&mut metadata, NEXT_SESSION_ID)?);
            let timer_id = if wants_timer(new) {
                TimerId(next_id(&mut metadata, NEXT_TIMER_ID)?)
            } else {
                TimerId(0)
            };
            build_session(id, timer_id, new, now)
        };
        {
            let mut sessions = write_txn.open_table(SESSIONS).map_err(io_err)?;
            sessions
                .insert(session.id.0, encode(&session)?.as_slice())
                .map_err(io_err)?;
        }
        if let Some(timer) = &timer {
            let mut timers = write_txn.open_table(TIMERS).map_err(io_err)?;
            timers
                .insert(session.id.0, encode(timer)?.as_slice())
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        Ok(SessionRecord {
            session,
            custom_timer: timer,
            stages: Vec::new(),
        })
    }

    fn get_session(&self, id: SessionId) -> Result<Option<SessionRecord>, EscapeError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let sessions = read_txn.open_table(SESSIONS).map_err(io_err)?;
        let timers = read_txn.open_table(TIMERS).map_err(io_err)?;
        let stages = read_txn.open_table(STAGES).map_err(io_err)?;
        load_record(&sessions, &timers, &stages, id.0)
    }

    fn list_sessions(&self) -> Result<Vec<SessionRecord>, EscapeError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let sessions = read_txn.open_table(SESSIONS).map_err(io_err)?;
        let timers = read_txn.open_table(TIMERS).map_err(io_err)?;
        let stages = read_txn.open_table(STAGES).map_err(io_err)?;

        let mut ids = Vec::new();
        for entry in sessions.iter().map_err(io_err)? {
            let (key, _value) = entry.map_err(io_err)?;
            ids.push(key.value());
        }

        let mut records = Vec::with_capacity(ids.len());
        for id in ids.into_iter().rev() {
            if let Some(record) = load_record(&sessions, &timers, &stages, id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn update_session(
        &mut self,
        id: SessionId,
        update: &SessionUpdate,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, EscapeError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let record = {
            let mut sessions = write_txn.open_table(SESSIONS).map_err(io_err)?;
            let mut session: GameSession = match sessions.get(id.0).map_err(io_err)? {
                Some(data) => decode(data.value())?,
                None => return Err(EscapeError::SessionNotFound(id)),
            };
            update.apply_to(&mut session);
            session.updated_at = now;
            sessions
                .insert(id.0, encode(&session)?.as_slice())
                .map_err(io_err)?;

            let timers = write_txn.open_table(TIMERS).map_err(io_err)?;
            let stages = write_txn.open_table(STAGES).map_err(io_err)?;
            load_record(&sessions, &timers, &stages, id.0)?
        };
        write_txn.commit().map_err(io_err)?;
        record.ok_or(EscapeError::SessionNotFound(id))
    }

    fn delete_session(&mut self, id: SessionId) -> Result<(), EscapeError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut sessions = write_txn.open_table(SESSIONS).map_err(io_err)?;
            if sessions.remove(id.0).map_err(io_err)?.is_none() {
                return Err(EscapeError::SessionNotFound(id));
            }

            let mut timers = write_txn.open_table(TIMERS).map_err(io_err)?;
            timers.remove(id.0).map_err(io_err)?;

            let mut stages = write_txn.open_table(STAGES).map_err(io_err)?;
            let mut keys = Vec::new();
            for entry in stages.range((id.0, 0u8)..=(id.0, u8::MAX)).map_err(io_err)? {
                let (key, _value) = entry.map_err(io_err)?;
                keys.push(key.value());
            }
            for key in keys {
                stages.remove(key).map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)?;
        tracing::debug!(session_id = %id, "deleted session and owned records");
        Ok(())
    }

    fn upsert_stage_completion(
        &mut self,
        input: &StageCompletionInput,
        now: DateTime<Utc>,
    ) -> Result<StageCompletion, EscapeError> {
        input.validate()?;
        let owner = input.game_session_id;
        let key = (owner.0, input.stage_id);

        let write_txn = self.db.begin_write().map_err(io_err)?;
        let stage = {
            let sessions = write_txn.open_table(SESSIONS).map_err(io_err)?;
            if sessions.get(owner.0).map_err(io_err)?.is_none() {
                return Err(EscapeError::SessionNotFound(owner));
            }

            let mut stages = write_txn.open_table(STAGES).map_err(io_err)?;
            let existing: Option<StageCompletion> = match stages.get(key).map_err(io_err)? {
                Some(data) => Some(decode(data.value())?),
                None => None,
            };
            let stage = match existing {
                Some(mut stage) => {
                    merge_stage(&mut stage, input, now);
                    stage
                }
                None => {
                    let mut metadata = write_txn.open_table(METADATA).map_err(io_err)?;
                    let id = StageCompletionId(next_id(&mut metadata, NEXT_STAGE_ID)?);
                    build_stage(id, input, now)
                }
            };
            stages
                .insert(key, encode(&stage)?.as_slice())
                .map_err(io_err)?;
            stage
        };
        write_txn.commit().map_err(io_err)?;
        Ok(stage)
    }

    fn load_stats(&self) -> Result<Option<GameStats>, EscapeError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(STATS).map_err(io_err)?;
        match table.get(STATS_KEY).map_err(io_err)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn save_stats(&mut self, stats: &GameStats) -> Result<(), EscapeError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(STATS).map_err(io_err)?;
            table
                .insert(STATS_KEY, encode(stats)?.as_slice())
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn session_count(&self) -> Result<usize, EscapeError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SESSIONS).map_err(io_err)?;
        let len = table.len().map_err(io_err)?;
        Ok(len as usize)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::store::contract;
    use tempfile::tempdir;

    #[test]
    fn redb_store_contract() {
        let temp = tempdir().expect("temp dir");
        let mut n = 0;
        contract::run_all(|| {
            n += 1;
            let path = temp.path().join(format!("contract-{}.redb", n));
            Box::new(RedbStore::open(&path).expect("open db"))
        });
    }

    #[test]
    fn persistence_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("sessions.redb");

        let id = {
            let mut store = RedbStore::open(&db_path).expect("open db");
            let id = store
                .create_session(&contract::new_session("Kim", Some(20)), contract::at(0))
                .expect("create")
                .session
                .id;
            store
                .upsert_stage_completion(&contract::stage_input(id, 1, 30), contract::at(30))
                .expect("upsert");
            id
        };

        let mut store = RedbStore::open(&db_path).expect("reopen db");
        let record = store.get_session(id).expect("get").expect("present");
        assert_eq!(record.session.player_name, "Kim");
        assert_eq!(record.custom_timer.map(|t| t.duration), Some(20));
        assert_eq!(record.stages.len(), 1);

        // Counters survive the reopen.
        let next = store
            .create_session(&contract::new_session("Lee", None), contract::at(60))
            .expect("create");
        assert_eq!(next.session.id, SessionId(id.0 + 1));
    }

    #[test]
    fn failed_delete_leaves_store_untouched() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("d.redb")).expect("open db");
        store
            .create_session(&contract::new_session("Max", None), contract::at(0))
            .expect("create");
        assert!(store.delete_session(SessionId(99)).is_err());
        assert_eq!(store.session_count().expect("count"), 1);
    }
}
