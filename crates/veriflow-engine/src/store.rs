//! Session storage trait and in-memory implementation.
//!
//! The engine does not own durable storage; it requires a store with
//! version-checked writes so an in-flight response and the expiry sweep
//! can race safely. The in-memory implementation is the reference for
//! those semantics and the fixture for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{EngineError, EngineResult};
use crate::session::AuthenticationSession;
use veriflow_core::SessionId;

/// Trait for persisting and mutating authentication sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a freshly created session.
    async fn insert(&self, session: AuthenticationSession) -> EngineResult<()>;

    /// Fetch a session by id.
    async fn get(&self, session_id: SessionId) -> EngineResult<AuthenticationSession>;

    /// Write back a mutated session.
    ///
    /// `expected_version` must equal the stored version, otherwise the
    /// write is rejected with [`EngineError::ConcurrencyConflict`] and the
    /// stored state is untouched. On success the stored version is bumped
    /// and the updated session returned.
    async fn update(
        &self,
        session: AuthenticationSession,
        expected_version: u64,
    ) -> EngineResult<AuthenticationSession>;

    /// Ids of live sessions whose deadline has passed at `now`.
    async fn expired_candidates(&self, now: DateTime<Utc>) -> EngineResult<Vec<SessionId>>;
}

/// In-memory implementation of [`SessionStore`].
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, AuthenticationSession>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored sessions (for testing).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().expect("store lock poisoned").len()
    }

    /// Whether the store is empty (for testing).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: AuthenticationSession) -> EngineResult<()> {
        let mut guard = self.sessions.write().expect("store lock poisoned");
        if guard.contains_key(&session.session_id) {
            return Err(EngineError::internal(format!(
                "session {} already exists",
                session.session_id
            )));
        }
        guard.insert(session.session_id, session);
        Ok(())
    }

    async fn get(&self, session_id: SessionId) -> EngineResult<AuthenticationSession> {
        self.sessions
            .read()
            .expect("store lock poisoned")
            .get(&session_id)
            .cloned()
            .ok_or(EngineError::SessionNotFound { session_id })
    }

    async fn update(
        &self,
        mut session: AuthenticationSession,
        expected_version: u64,
    ) -> EngineResult<AuthenticationSession> {
        let mut guard = self.sessions.write().expect("store lock poisoned");
        let stored = guard
            .get(&session.session_id)
            .ok_or(EngineError::SessionNotFound {
                session_id: session.session_id,
            })?;

        if stored.version != expected_version {
            return Err(EngineError::ConcurrencyConflict {
                session_id: session.session_id,
            });
        }

        session.version = expected_version + 1;
        guard.insert(session.session_id, session.clone());
        Ok(session)
    }

    async fn expired_candidates(&self, now: DateTime<Utc>) -> EngineResult<Vec<SessionId>> {
        let guard = self.sessions.read().expect("store lock poisoned");
        let mut ids: Vec<SessionId> = guard
            .values()
            .filter(|session| session.is_expired(now))
            .map(|session| session.session_id)
            .collect();
        // Deterministic sweep order.
        ids.sort();
        Ok(ids)
    }
}
