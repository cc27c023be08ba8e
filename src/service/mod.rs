//! Authenticated task mutations.
//!
//! Every operation takes the caller's identity explicitly. The order of checks
//! is fixed: identity, then payload validation, then storage. Nothing touches
//! the repository until the first two pass.
//!
//! Ownership is checked by fetching the row and comparing owners, then
//! writing. There is no version fencing: a rename or toggle that loses a race
//! with a delete of the same task is a lost write and still reports success.

mod error;

use uuid::Uuid;

use crate::auth::Identity;
use crate::db::{RepoError, TaskRepository};
use crate::models::{Task, TaskPatch};
use crate::refresh::{RefreshSignal, ViewKey};
use crate::validation::{validate_content, validate_task_id, FieldErrors};

pub use error::{Failure, FailureKind, MutationError, MutationSuccess, Operation};

#[derive(Clone)]
pub struct TaskService<R, S> {
    repo: R,
    refresh: S,
}

impl<R: TaskRepository, S: RefreshSignal> TaskService<R, S> {
    pub fn new(repo: R, refresh: S) -> Self {
        Self { repo, refresh }
    }

    /// Adds a task owned by the caller.
    ///
    /// Not idempotent: every successful call inserts a new row.
    pub fn create(
        &self,
        caller: Option<&Identity>,
        content: &str,
    ) -> Result<MutationSuccess, MutationError> {
        let caller = require_caller(caller)?;
        let content = validate_content(content).map_err(|e| invalid("Invalid task content", e))?;

        let task = Task::new(caller.user_id, content);
        let task_id = self
            .repo
            .insert(&task)
            .map_err(|e| storage_failure(Operation::Create, e))?;

        tracing::info!(task_id = %task_id, owner_id = %caller.user_id, "task created");
        self.signal_refresh(caller.user_id);
        Ok(MutationSuccess::created(task_id))
    }

    /// Replaces the content of one of the caller's tasks.
    pub fn rename(
        &self,
        caller: Option<&Identity>,
        task_id: &str,
        content: &str,
    ) -> Result<MutationSuccess, MutationError> {
        let caller = require_caller(caller)?;
        let id = validate_task_id(task_id);
        let content = validate_content(content);
        let (id, content) = match (id, content) {
            (Ok(id), Ok(content)) => (id, content),
            (id, content) => {
                let mut errors = FieldErrors::new();
                for e in [id.err(), content.err()].into_iter().flatten() {
                    errors.merge(e);
                }
                return Err(invalid("Invalid task data", errors));
            }
        };

        let task = self.load_owned(caller, id, Operation::Rename)?;
        let patch = TaskPatch::content(content, task.next_updated_at());
        self.repo
            .update(task.id, &patch)
            .map_err(|e| storage_failure(Operation::Rename, e))?;

        tracing::info!(task_id = %task.id, "task renamed");
        self.signal_refresh(caller.user_id);
        Ok(MutationSuccess::done())
    }

    /// Sets the completion flag of one of the caller's tasks.
    ///
    /// Setting the current value still writes and advances `updated_at`.
    pub fn toggle(
        &self,
        caller: Option<&Identity>,
        task_id: &str,
        completed: bool,
    ) -> Result<MutationSuccess, MutationError> {
        let caller = require_caller(caller)?;
        let id = validate_task_id(task_id).map_err(|e| invalid("Invalid task data", e))?;

        let task = self.load_owned(caller, id, Operation::Toggle)?;
        let patch = TaskPatch::completed(completed, task.next_updated_at());
        self.repo
            .update(task.id, &patch)
            .map_err(|e| storage_failure(Operation::Toggle, e))?;

        tracing::info!(task_id = %task.id, completed, "task toggled");
        self.signal_refresh(caller.user_id);
        Ok(MutationSuccess::done())
    }

    /// Permanently removes one of the caller's tasks.
    pub fn delete(
        &self,
        caller: Option<&Identity>,
        task_id: &str,
    ) -> Result<MutationSuccess, MutationError> {
        let caller = require_caller(caller)?;
        let id = validate_task_id(task_id).map_err(|e| invalid("Invalid task data", e))?;

        let task = self.load_owned(caller, id, Operation::Delete)?;
        self.repo
            .delete(task.id)
            .map_err(|e| storage_failure(Operation::Delete, e))?;

        tracing::info!(task_id = %task.id, "task deleted");
        self.signal_refresh(caller.user_id);
        Ok(MutationSuccess::done())
    }

    /// The caller's tasks, newest first.
    pub fn list(&self, caller: Option<&Identity>) -> Result<Vec<Task>, MutationError> {
        let caller = require_caller(caller)?;
        self.repo
            .list_by_owner(caller.user_id)
            .map_err(|e| storage_failure(Operation::List, e))
    }

    /// Loads a task and checks that `caller` owns it.
    ///
    /// A foreign task is logged as an authorization failure but reported as
    /// `NotFound`, exactly like a missing one.
    fn load_owned(
        &self,
        caller: &Identity,
        id: Option<Uuid>,
        operation: Operation,
    ) -> Result<Task, MutationError> {
        let Some(id) = id else {
            return Err(MutationError::NotFound);
        };

        let task = self
            .repo
            .find_by_id(id)
            .map_err(|e| storage_failure(operation, e))?;

        match task {
            None => Err(MutationError::NotFound),
            Some(task) if task.owner_id != caller.user_id => {
                tracing::warn!(
                    task_id = %id,
                    caller_id = %caller.user_id,
                    operation = operation.as_str(),
                    "ownership check failed"
                );
                Err(MutationError::NotFound)
            }
            Some(task) => Ok(task),
        }
    }

    fn signal_refresh(&self, owner_id: Uuid) {
        let view = ViewKey::task_list(owner_id);
        if let Err(e) = self.refresh.invalidate(&view) {
            tracing::warn!(view = %view, "failed to invalidate view: {}", e);
        }
    }
}

fn require_caller(caller: Option<&Identity>) -> Result<&Identity, MutationError> {
    caller.ok_or(MutationError::Unauthenticated)
}

fn invalid(message: &'static str, field_errors: FieldErrors) -> MutationError {
    MutationError::Validation {
        message,
        field_errors,
    }
}

fn storage_failure(operation: Operation, err: RepoError) -> MutationError {
    tracing::error!(operation = operation.as_str(), "storage error: {}", err);
    MutationError::Storage(operation)
}
