//! # Persistence Gateway
//!
//! The four write operations the lifecycle controller needs from a
//! persistence layer. Each maps 1:1 to a CRUD call; session and stage writes
//! are not coupled transactionally.
//!
//! `StoreGateway` talks to a local `SessionStore`. The binary provides an
//! HTTP implementation that talks to a running server.

use crate::store::SessionStore;
use crate::{
    EscapeError, GameSession, NewSession, SessionId, SessionUpdate, StageCompletion,
    StageCompletionInput,
};
use chrono::Utc;

/// Persistence operations consumed by `LifecycleController`.
pub trait SessionGateway {
    /// Create a session and return its id.
    fn create_session(&mut self, new: &NewSession) -> Result<SessionId, EscapeError>;

    /// Apply a partial update and return the stored session.
    fn update_session(
        &mut self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<GameSession, EscapeError>;

    /// Insert or update one stage completion.
    fn upsert_stage_completion(
        &mut self,
        input: &StageCompletionInput,
    ) -> Result<StageCompletion, EscapeError>;

    /// Delete a session and everything it owns.
    fn delete_session(&mut self, id: SessionId) -> Result<(), EscapeError>;
}

/// In-process gateway over any `SessionStore`, stamping writes with the
/// wall clock.
#[derive(Debug, Default)]
pub struct StoreGateway<S> {
    store: S,
}

impl<S: SessionStore> StoreGateway<S> {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unwrap the gateway, returning the store.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: SessionStore> SessionGateway for StoreGateway<S> {
    fn create_session(&mut self, new: &NewSession) -> Result<SessionId, EscapeError> {
        let record = self.store.create_session(new, Utc::now())?;
        Ok(record.session.id)
    }

    fn update_session(
        &mut self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<GameSession, EscapeError> {
        let record = self.store.update_session(id, update, Utc::now())?;
        Ok(record.session)
    }

    fn upsert_stage_completion(
        &mut self,
        input: &StageCompletionInput,
    ) -> Result<StageCompletion, EscapeError> {
        self.store.upsert_stage_completion(input, Utc::now())
    }

    fn delete_session(&mut self, id: SessionId) -> Result<(), EscapeError> {
        self.store.delete_session(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, contract};

    #[test]
    fn store_gateway_round_trip() {
        let mut gateway = StoreGateway::new(MemoryStore::new());
        let id = gateway
            .create_session(&contract::new_session("Noor", None))
            .expect("create");
        gateway
            .upsert_stage_completion(&contract::stage_input(id, 1, 30))
            .expect("upsert");
        let session = gateway
            .update_session(
                id,
                &SessionUpdate {
                    is_completed: Some(true),
                    ..SessionUpdate::default()
                },
            )
            .expect("update");
        assert!(session.is_completed);

        let record = gateway
            .store()
            .get_session(id)
            .expect("get")
            .expect("present");
        assert_eq!(record.stages.len(), 1);

        gateway.delete_session(id).expect("delete");
        assert_eq!(gateway.into_inner().session_count().expect("count"), 0);
    }
}
