//! Invalidation of cached task-list views.
//!
//! Mutations call [`RefreshSignal::invalidate`] after a successful write. The
//! signal is best-effort: a failure is logged by the caller and never fails
//! the mutation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::models::Task;

/// Identifies one cached rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewKey(String);

impl ViewKey {
    /// The task list shown to `owner_id`.
    pub fn task_list(owner_id: Uuid) -> Self {
        Self(format!("tasks:{owner_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("view cache unavailable")]
    Unavailable,
}

/// Collaborator told which views went stale after a mutation.
pub trait RefreshSignal: Send + Sync {
    fn invalidate(&self, view: &ViewKey) -> Result<(), RefreshError>;
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<ViewKey, Vec<Task>>,
    /// Bumped on every invalidation of a key.
    generations: HashMap<ViewKey, u64>,
}

/// In-process cache of each user's task list.
///
/// The lock is never held while loading. A load that started before an
/// invalidation of the same key does not store its result.
#[derive(Debug, Clone, Default)]
pub struct TaskListCache {
    state: Arc<Mutex<CacheState>>,
}

impl TaskListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached list for `view`, or runs `load` and caches its result.
    pub fn get_or_load<E>(
        &self,
        view: &ViewKey,
        load: impl FnOnce() -> Result<Vec<Task>, E>,
    ) -> Result<Vec<Task>, E> {
        let generation = match self.state.lock() {
            Ok(state) => {
                if let Some(tasks) = state.entries.get(view) {
                    return Ok(tasks.clone());
                }
                state.generations.get(view).copied().unwrap_or(0)
            }
            // A poisoned cache degrades to an uncached read.
            Err(poisoned) => {
                drop(poisoned);
                return load();
            }
        };

        let tasks = load()?;

        if let Ok(mut state) = self.state.lock() {
            let current = state.generations.get(view).copied().unwrap_or(0);
            if current == generation {
                state.entries.insert(view.clone(), tasks.clone());
            }
        }

        Ok(tasks)
    }

    pub fn is_cached(&self, view: &ViewKey) -> bool {
        self.state
            .lock()
            .map(|state| state.entries.contains_key(view))
            .unwrap_or(false)
    }
}

impl RefreshSignal for TaskListCache {
    fn invalidate(&self, view: &ViewKey) -> Result<(), RefreshError> {
        let mut state = self.state.lock().map_err(|_| RefreshError::Unavailable)?;
        state.entries.remove(view);
        *state.generations.entry(view.clone()).or_insert(0) += 1;
        tracing::debug!(view = %view, "view invalidated");
        Ok(())
    }
}
