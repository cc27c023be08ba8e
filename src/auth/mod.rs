//! Accounts, sessions, and caller identity resolution.
//!
//! The task service never looks identities up itself; the HTTP layer asks an
//! [`IdentityProvider`] for the caller behind a bearer token and passes the
//! result along explicitly.

mod password;

use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::db::{Database, RepoError};
use crate::models::{LoginInput, LoginResponse, RegisterInput, User};
use crate::validation::{validate_login, validate_registration, FieldErrors};

pub use password::{hash_password, verify_password};

/// Checked on sign-in for an unknown email, matching the cost of a wrong password.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| match hash_password("tasklist-dummy") {
    Ok(hash) => Some(hash),
    Err(e) => {
        tracing::error!("failed to build dummy password hash: {}", e);
        None
    }
});

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
}

impl Identity {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Resolves a presented credential to a caller identity.
///
/// Never fails: anything that prevents resolution yields `None`.
pub trait IdentityProvider: Send + Sync {
    fn current_caller(&self, token: Option<&str>) -> Option<Identity>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("You must sign in")]
    Unauthenticated,
    #[error("Invalid fields")]
    Validation(FieldErrors),
    #[error("User with this email already exists")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Something went wrong")]
    Internal,
}

impl From<RepoError> for AuthError {
    fn from(err: RepoError) -> Self {
        tracing::error!("auth storage error: {}", err);
        Self::Internal
    }
}

/// Registration, sign-in and session lookup over the database.
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(db: Database, session_ttl: Duration) -> Self {
        Self { db, session_ttl }
    }

    pub fn register(&self, input: &RegisterInput) -> Result<User, AuthError> {
        let input = validate_registration(input).map_err(AuthError::Validation)?;

        if self.db.find_user_by_email(&input.email)?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&input.password).map_err(|e| {
            tracing::error!("failed to hash password: {}", e);
            AuthError::Internal
        })?;

        let user = match self.db.create_user(&input.name, &input.email, &password_hash) {
            Ok(user) => user,
            // Lost a race with a concurrent registration of the same email.
            Err(RepoError::Duplicate(_)) => return Err(AuthError::EmailTaken),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Verifies credentials and opens a new session.
    pub fn login(&self, input: &LoginInput) -> Result<LoginResponse, AuthError> {
        let input = validate_login(input).map_err(AuthError::Validation)?;

        let Some(stored) = self.db.find_user_by_email(&input.email)? else {
            tracing::debug!("sign-in for unknown email");
            if let Some(hash) = DUMMY_HASH.as_deref() {
                verify_password(&input.password, hash);
            }
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(&input.password, &stored.password_hash) {
            tracing::warn!(user_id = %stored.user.id, "sign-in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        match self.db.delete_expired_sessions(now) {
            Ok(0) => {}
            Ok(n) => tracing::debug!("purged {} expired sessions", n),
            Err(e) => tracing::warn!("failed to purge expired sessions: {}", e),
        }

        let session = self
            .db
            .create_session(&new_token(), stored.user.id, now + self.session_ttl)?;

        tracing::info!(user_id = %stored.user.id, "session opened");
        Ok(LoginResponse {
            token: session.token,
            expires_at: session.expires_at,
            user: stored.user,
        })
    }

    /// Ends the session behind `token`. Unknown tokens are ignored.
    pub fn logout(&self, token: &str) -> Result<(), AuthError> {
        if self.db.delete_session(token)? {
            tracing::info!("session closed");
        }
        Ok(())
    }

    pub fn current_user(&self, identity: &Identity) -> Result<Option<User>, AuthError> {
        Ok(self.db.get_user(identity.user_id)?)
    }
}

impl IdentityProvider for AuthService {
    fn current_caller(&self, token: Option<&str>) -> Option<Identity> {
        let token = token.map(str::trim).filter(|t| !t.is_empty())?;

        match self.db.get_session(token) {
            Ok(Some(session)) if session.expires_at > Utc::now() => {
                Some(Identity::new(session.user_id))
            }
            Ok(Some(_)) => {
                tracing::debug!("expired session presented");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("session lookup failed: {}", e);
                None
            }
        }
    }
}

/// Two v4 UUIDs (244 random bits), hex encoded.
fn new_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
