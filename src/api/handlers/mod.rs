use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::{AppState, BearerToken, CurrentCaller};
use crate::auth::{AuthError, Identity};
use crate::models::*;
use crate::refresh::ViewKey;
use crate::service::{Failure, FailureKind, MutationError, MutationSuccess};
use crate::validation::FieldErrors;

// ============================================================
// Error Handling
// ============================================================

/// Storage detail was already logged by the service; only the sanitized
/// failure reaches the client.
impl IntoResponse for MutationError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            FailureKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            FailureKind::Validation => StatusCode::BAD_REQUEST,
            FailureKind::NotFound => StatusCode::NOT_FOUND,
            FailureKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self.to_failure())).into_response()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, kind, field_errors) = match self {
            Self::Unauthenticated | Self::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, FailureKind::Unauthenticated, None)
            }
            Self::Validation(errors) => (StatusCode::BAD_REQUEST, FailureKind::Validation, Some(errors)),
            Self::EmailTaken => {
                let mut errors = FieldErrors::new();
                errors.add("email", message.clone());
                (StatusCode::CONFLICT, FailureKind::Validation, Some(errors))
            }
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, FailureKind::Storage, None),
        };
        let failure = Failure {
            kind,
            message,
            field_errors,
        };
        (status, Json(failure)).into_response()
    }
}

fn body_errors(rejection: &JsonRejection) -> FieldErrors {
    tracing::debug!("rejected request body: {}", rejection.body_text());
    let mut errors = FieldErrors::new();
    errors.add("body", rejection.body_text());
    errors
}

/// Unwraps a task request body once the caller is known.
fn task_body<T>(
    caller: Option<&Identity>,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, MutationError> {
    if caller.is_none() {
        return Err(MutationError::Unauthenticated);
    }
    payload
        .map(|Json(input)| input)
        .map_err(|rejection| MutationError::Validation {
            message: "Invalid request body",
            field_errors: body_errors(&rejection),
        })
}

fn auth_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload
        .map(|Json(input)| input)
        .map_err(|rejection| AuthError::Validation(body_errors(&rejection)))
}

/// Runs password hashing work off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.unwrap_or_else(|e| {
        tracing::error!("auth task failed: {}", e);
        Err(AuthError::Internal)
    })
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Accounts
// ============================================================

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AuthError> {
    let input = auth_body(payload)?;
    let user = blocking(move || state.auth.register(&input)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let input = auth_body(payload)?;
    blocking(move || state.auth.login(&input)).await.map(Json)
}

pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, AuthError> {
    let token = token.ok_or(AuthError::Unauthenticated)?;
    state.auth.logout(&token)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
) -> Result<Json<User>, AuthError> {
    let identity = caller.ok_or(AuthError::Unauthenticated)?;
    state
        .auth
        .current_user(&identity)?
        .map(Json)
        .ok_or(AuthError::Unauthenticated)
}

// ============================================================
// Tasks
// ============================================================

/// The caller's tasks, newest first, read through the task-list cache.
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
) -> Result<Json<Vec<Task>>, MutationError> {
    let identity = caller.ok_or(MutationError::Unauthenticated)?;
    let view = ViewKey::task_list(identity.user_id);
    state
        .cache
        .get_or_load(&view, || state.tasks.list(Some(&identity)))
        .map(Json)
}

pub async fn create_task(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    payload: Result<Json<CreateTaskInput>, JsonRejection>,
) -> Result<(StatusCode, Json<MutationSuccess>), MutationError> {
    let input = task_body(caller.as_ref(), payload)?;
    state
        .tasks
        .create(caller.as_ref(), &input.content)
        .map(|success| (StatusCode::CREATED, Json(success)))
}

pub async fn rename_task(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
    payload: Result<Json<RenameTaskInput>, JsonRejection>,
) -> Result<Json<MutationSuccess>, MutationError> {
    let input = task_body(caller.as_ref(), payload)?;
    state
        .tasks
        .rename(caller.as_ref(), &id, &input.content)
        .map(Json)
}

pub async fn toggle_task(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
    payload: Result<Json<ToggleTaskInput>, JsonRejection>,
) -> Result<Json<MutationSuccess>, MutationError> {
    let input = task_body(caller.as_ref(), payload)?;
    state
        .tasks
        .toggle(caller.as_ref(), &id, input.completed)
        .map(Json)
}

pub async fn delete_task(
    State(state): State<AppState>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
) -> Result<Json<MutationSuccess>, MutationError> {
    state.tasks.delete(caller.as_ref(), &id).map(Json)
}
