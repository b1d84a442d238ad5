//! Login history storage
//!
//! One-to-many user → attempts, append-only; only the latest record is
//! consulted at decision time. Only Allow decisions are ever appended, so
//! "previous attempt" always means "last allowed login".

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::LoginAttempt;

/// Persistent history keyed by user.
///
/// `append` must be atomic with respect to concurrent callers for the same
/// user; the engine additionally serializes its read-then-append window per
/// user so two in-flight decisions cannot both compare against a stale
/// previous attempt.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Most recent persisted attempt for the user, if any.
    ///
    /// # Errors
    /// Returns [`crate::RiskError::Store`] on a transport failure.
    async fn latest(&self, user_id: &str) -> Result<Option<LoginAttempt>>;

    /// Append a new attempt record. Records are never mutated in place.
    ///
    /// # Errors
    /// Returns [`crate::RiskError::Store`] on a transport failure.
    async fn append(&self, attempt: LoginAttempt) -> Result<()>;
}

/// In-memory history store.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    attempts: RwLock<HashMap<String, Vec<LoginAttempt>>>,
}

impl MemoryHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted attempts for a user.
    pub async fn history_len(&self, user_id: &str) -> usize {
        self.attempts.read().await.get(user_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn latest(&self, user_id: &str) -> Result<Option<LoginAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts.get(user_id).and_then(|history| history.last().cloned()))
    }

    async fn append(&self, attempt: LoginAttempt) -> Result<()> {
        let mut attempts = self.attempts.write().await;
        attempts.entry(attempt.user_id.clone()).or_default().push(attempt);
        Ok(())
    }
}
