//! Payload validation shared by the task and account operations.
//!
//! Validators return the normalized value or a [`FieldErrors`] map keyed by
//! input field name so callers can highlight the offending input.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{LoginInput, RegisterInput, MAX_CONTENT_CHARS};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

const MIN_NAME_CHARS: usize = 2;
const MIN_PASSWORD_CHARS: usize = 6;

/// Per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Appends every message from `other`.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(value)` when no errors were recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Normalizes task content and checks its length bounds.
///
/// Content is trimmed first; the trimmed text must hold between 1 and
/// [`MAX_CONTENT_CHARS`] characters.
pub fn validate_content(content: &str) -> Result<String, FieldErrors> {
    let trimmed = content.trim();
    let mut errors = FieldErrors::new();

    if trimmed.is_empty() {
        errors.add("content", "Task content is required");
    } else if trimmed.chars().count() > MAX_CONTENT_CHARS {
        errors.add("content", "Task is too long");
    }

    errors.into_result(trimmed.to_string())
}

/// Checks a caller-supplied task id.
///
/// An empty id is a validation failure. A non-empty id that is not a UUID
/// yields `Ok(None)`: it cannot name any stored task.
pub fn validate_task_id(id: &str) -> Result<Option<Uuid>, FieldErrors> {
    let id = id.trim();
    if id.is_empty() {
        let mut errors = FieldErrors::new();
        errors.add("id", "Task id is required");
        return Err(errors);
    }
    Ok(Uuid::parse_str(id).ok())
}

/// Checks a registration request, returning it with name and email trimmed.
pub fn validate_registration(input: &RegisterInput) -> Result<RegisterInput, FieldErrors> {
    let name = input.name.trim();
    let email = input.email.trim();
    let mut errors = FieldErrors::new();

    if name.chars().count() < MIN_NAME_CHARS {
        errors.add("name", "Name must be at least 2 characters");
    }
    if !EMAIL_RE.is_match(email) {
        errors.add("email", "Invalid email address");
    }
    if input.password.chars().count() < MIN_PASSWORD_CHARS {
        errors.add("password", "Password must be at least 6 characters");
    }

    errors.into_result(RegisterInput {
        name: name.to_string(),
        email: email.to_string(),
        password: input.password.clone(),
    })
}

/// Checks a sign-in request, returning it with the email trimmed.
pub fn validate_login(input: &LoginInput) -> Result<LoginInput, FieldErrors> {
    let email = input.email.trim();
    let mut errors = FieldErrors::new();

    if !EMAIL_RE.is_match(email) {
        errors.add("email", "Invalid email address");
    }
    if input.password.is_empty() {
        errors.add("password", "Password is required");
    }

    errors.into_result(LoginInput {
        email: email.to_string(),
        password: input.password.clone(),
    })
}
