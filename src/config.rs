//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;

use chrono::Duration;

const DEFAULT_SESSION_TTL_DAYS: i64 = 30;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database file (from TASKLIST_DB_PATH). `None` uses the platform data dir.
    pub db_path: Option<PathBuf>,
    /// Allowed CORS origins (from TASKLIST_CORS_ORIGINS, comma-separated).
    /// `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
    /// Session lifetime (from TASKLIST_SESSION_TTL_DAYS).
    pub session_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let db_path = std::env::var("TASKLIST_DB_PATH").ok().map(PathBuf::from);

        let cors_origins = std::env::var("TASKLIST_CORS_ORIGINS")
            .ok()
            .map(|s| parse_origins(&s))
            .filter(|origins| !origins.is_empty());

        let session_ttl_days = std::env::var("TASKLIST_SESSION_TTL_DAYS")
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|days| *days > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_DAYS);

        Self {
            db_path,
            cors_origins,
            session_ttl: Duration::days(session_ttl_days),
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            cors_origins: None,
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
        }
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
