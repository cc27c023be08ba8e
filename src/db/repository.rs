//! Storage contract consumed by the task mutation service.

use uuid::Uuid;

use crate::models::{Task, TaskPatch};

/// Failure reported by a storage backend.
///
/// The detail is meant for operators; callers of the service only ever see a
/// generic failure message.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("unique constraint violated: {0}")]
    Duplicate(&'static str),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Durable storage of task rows keyed by id, queryable by owner.
///
/// Every method touches at most one row and relies on the backend's
/// single-row atomicity. `update` and `delete` on an absent id succeed
/// without effect.
pub trait TaskRepository: Send + Sync {
    fn insert(&self, task: &Task) -> RepoResult<Uuid>;
    fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Task>>;
    fn update(&self, id: Uuid, patch: &TaskPatch) -> RepoResult<()>;
    fn delete(&self, id: Uuid) -> RepoResult<()>;
    /// Tasks owned by `owner_id`, newest first.
    fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Task>>;
}
