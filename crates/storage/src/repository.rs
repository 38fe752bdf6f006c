use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interview_core::Clock;
use interview_core::model::{
    DEFAULT_MAX_HISTORY, Session, SessionId, Task, TaskId, TaskLevel, TaskSummary,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::catalog::InMemoryCatalog;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read-only access to the leveled task set.
#[async_trait]
pub trait TaskCatalog: Send + Sync {
    /// Fetch a task by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the id is unknown.
    async fn get(&self, id: &TaskId) -> Result<Task, StorageError>;

    /// Draw any task uniformly at random; `None` for an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn random(&self) -> Result<Option<Task>, StorageError>;

    /// Draw a random task at the given level; `None` when the level is empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn random_by_level(&self, level: TaskLevel) -> Result<Option<Task>, StorageError>;

    /// All tasks ordered by level, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list(&self) -> Result<Vec<TaskSummary>, StorageError>;
}

/// Interview sessions keyed by `SessionId`.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Fetch a session, creating a fresh default one on first use.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be read.
    async fn load(&self, id: SessionId) -> Result<Session, StorageError>;

    /// Persist a session; last write wins.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn save(&self, id: SessionId, session: &Session) -> Result<(), StorageError>;

    /// Restore the default state for `id` and return it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn reset(&self, id: SessionId) -> Result<Session, StorageError>;

    /// Drop a session entirely.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no session exists for `id`.
    async fn remove(&self, id: SessionId) -> Result<(), StorageError>;

    /// Drop sessions not touched since `before`; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be accessed.
    async fn evict_idle(&self, before: DateTime<Utc>) -> Result<usize, StorageError>;
}

#[derive(Debug, Clone)]
struct SessionRecord {
    session: Session,
    touched_at: DateTime<Utc>,
}

/// Process-lifetime session store; nothing survives a restart.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
    clock: Clock,
    max_history: usize,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            clock: Clock::default(),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, SessionRecord>>, StorageError> {
        self.sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionStore {
    async fn load(&self, id: SessionId) -> Result<Session, StorageError> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let record = guard.entry(id).or_insert_with(|| {
            tracing::debug!(session = %id, "creating session");
            SessionRecord {
                session: Session::new(self.max_history),
                touched_at: now,
            }
        });
        record.touched_at = now;
        Ok(record.session.clone())
    }

    async fn save(&self, id: SessionId, session: &Session) -> Result<(), StorageError> {
        let touched_at = self.clock.now();
        let mut guard = self.lock()?;
        guard.insert(
            id,
            SessionRecord {
                session: session.clone(),
                touched_at,
            },
        );
        Ok(())
    }

    async fn reset(&self, id: SessionId) -> Result<Session, StorageError> {
        let session = Session::new(self.max_history);
        self.save(id, &session).await?;
        Ok(session)
    }

    async fn remove(&self, id: SessionId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.remove(&id).map(|_| ()).ok_or(StorageError::NotFound)
    }

    async fn evict_idle(&self, before: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut guard = self.lock()?;
        let initial = guard.len();
        guard.retain(|_, record| record.touched_at >= before);
        let evicted = initial - guard.len();
        if evicted > 0 {
            tracing::info!(evicted, "evicted idle sessions");
        }
        Ok(evicted)
    }
}

/// Aggregates the catalog and session store behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub tasks: Arc<dyn TaskCatalog>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    /// Bundled catalog plus an in-memory session store.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the bundled catalog is malformed.
    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self::with_catalog(InMemoryCatalog::builtin()?))
    }

    #[must_use]
    pub fn with_catalog(catalog: InMemoryCatalog) -> Self {
        let tasks: Arc<dyn TaskCatalog> = Arc::new(catalog);
        let sessions: Arc<dyn SessionRepository> = Arc::new(InMemorySessionStore::new());
        Self { tasks, sessions }
    }
}
