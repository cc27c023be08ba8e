use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::FieldErrors;

/// The task operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Rename,
    Toggle,
    Delete,
    List,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Rename => "rename",
            Self::Toggle => "toggle",
            Self::Delete => "delete",
            Self::List => "list",
        }
    }

    /// Generic message shown when storage fails during this operation.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Create => "Failed to add task",
            Self::Rename | Self::Toggle => "Failed to update task",
            Self::Delete => "Failed to delete task",
            Self::List => "Failed to load tasks",
        }
    }
}

/// Typed failure of a task operation.
///
/// `NotFound` covers both an absent task and a task owned by someone else.
/// `Storage` carries no backend detail; that is logged where it happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("You must sign in")]
    Unauthenticated,
    #[error("{message}")]
    Validation {
        message: &'static str,
        field_errors: FieldErrors,
    },
    #[error("Task not found")]
    NotFound,
    #[error("{}", .0.failure_message())]
    Storage(Operation),
}

impl MutationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unauthenticated => FailureKind::Unauthenticated,
            Self::Validation { .. } => FailureKind::Validation,
            Self::NotFound => FailureKind::NotFound,
            Self::Storage(_) => FailureKind::Storage,
        }
    }

    /// Caller-facing shape of this error.
    pub fn to_failure(&self) -> Failure {
        let field_errors = match self {
            Self::Validation { field_errors, .. } => Some(field_errors.clone()),
            _ => None,
        };
        Failure {
            kind: self.kind(),
            message: self.to_string(),
            field_errors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unauthenticated,
    Validation,
    NotFound,
    Storage,
}

/// Failure body returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
}

/// Success body returned to callers. Create reports the new task's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSuccess {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
}

impl MutationSuccess {
    pub fn created(task_id: Uuid) -> Self {
        Self {
            success: true,
            task_id: Some(task_id),
        }
    }

    pub fn done() -> Self {
        Self {
            success: true,
            task_id: None,
        }
    }
}
