use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of task content, counted in characters.
pub const MAX_CONTENT_CHARS: usize = 500;

/// A unit of work owned by exactly one user.
///
/// `id`, `owner_id` and `created_at` never change after creation. Every
/// mutation moves `updated_at` strictly forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub content: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds a fresh, incomplete task for `owner_id`.
    pub fn new(owner_id: Uuid, content: String) -> Self {
        let now = timestamp_now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            content,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Timestamp for the next mutation of this task.
    ///
    /// Falls back to one microsecond past the current `updated_at` when the
    /// wall clock has not moved, so `updated_at` always advances.
    pub fn next_updated_at(&self) -> DateTime<Utc> {
        let now = timestamp_now();
        if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        }
    }
}

/// Current time at the microsecond precision used for storage.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Partial update applied to a stored task row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPatch {
    pub content: Option<String>,
    pub completed: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

impl TaskPatch {
    pub fn content(content: String, updated_at: DateTime<Utc>) -> Self {
        Self {
            content: Some(content),
            completed: None,
            updated_at,
        }
    }

    pub fn completed(completed: bool, updated_at: DateTime<Utc>) -> Self {
        Self {
            content: None,
            completed: Some(completed),
            updated_at,
        }
    }
}

/// Body for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskInput {
    #[serde(default)]
    pub content: String,
}

/// Body for renaming a task. Content replaces the existing text in full.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenameTaskInput {
    #[serde(default)]
    pub content: String,
}

/// Body for setting a task's completion flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToggleTaskInput {
    #[serde(default)]
    pub completed: bool,
}
