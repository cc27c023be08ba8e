mod repository;
mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::*;

pub use repository::{RepoError, RepoResult, TaskRepository};

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        schema::run_migrations(&conn)
    }

    fn conn(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepoError::LockPoisoned)
    }

    // ============================================================
    // User operations
    // ============================================================

    pub fn create_user(&self, name: &str, email: &str, password_hash: &str) -> RepoResult<User> {
        let conn = self.conn()?;
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            created_at: timestamp_now(),
        };

        conn.execute(
            "INSERT INTO users (id, email, name, password_hash, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                user.id.to_string(),
                &user.email,
                &user.name,
                password_hash,
                format_datetime(user.created_at),
            ),
        )
        .map_err(|e| unique_violation(e, "users.email"))?;

        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, email, name, created_at FROM users WHERE id = ?",
                [id.to_string()],
                |row| {
                    Ok(User {
                        id: parse_uuid(row.get::<_, String>(0)?),
                        email: row.get(1)?,
                        name: row.get(2)?,
                        created_at: parse_datetime(row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> RepoResult<Option<StoredUser>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, email, name, created_at, password_hash FROM users WHERE email = ?",
                [email],
                |row| {
                    Ok(StoredUser {
                        user: User {
                            id: parse_uuid(row.get::<_, String>(0)?),
                            email: row.get(1)?,
                            name: row.get(2)?,
                            created_at: parse_datetime(row.get::<_, String>(3)?),
                        },
                        password_hash: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    // ============================================================
    // Session operations
    // ============================================================

    pub fn create_session(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<Session> {
        let conn = self.conn()?;
        let session = Session {
            token: token.to_string(),
            user_id,
            created_at: timestamp_now(),
            expires_at,
        };

        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
            (
                &session.token,
                session.user_id.to_string(),
                format_datetime(session.created_at),
                format_datetime(session.expires_at),
            ),
        )
        .map_err(|e| unique_violation(e, "sessions.token"))?;

        Ok(session)
    }

    pub fn get_session(&self, token: &str) -> RepoResult<Option<Session>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?",
                [token],
                |row| {
                    Ok(Session {
                        token: row.get(0)?,
                        user_id: parse_uuid(row.get::<_, String>(1)?),
                        created_at: parse_datetime(row.get::<_, String>(2)?),
                        expires_at: parse_datetime(row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn delete_session(&self, token: &str) -> RepoResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM sessions WHERE token = ?", [token])?;
        Ok(rows > 0)
    }

    /// Removes every session whose expiry is at or before `now`.
    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> RepoResult<usize> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?",
            [format_datetime(now)],
        )?;
        Ok(rows)
    }
}

// ============================================================
// Task operations
// ============================================================

const TASK_COLUMNS: &str = "id, owner_id, content, completed, created_at, updated_at";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: parse_uuid(row.get::<_, String>(0)?),
        owner_id: parse_uuid(row.get::<_, String>(1)?),
        content: row.get(2)?,
        completed: row.get::<_, i32>(3)? != 0,
        created_at: parse_datetime(row.get::<_, String>(4)?),
        updated_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

impl TaskRepository for Database {
    fn insert(&self, task: &Task) -> RepoResult<Uuid> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tasks (id, owner_id, content, completed, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                task.id.to_string(),
                task.owner_id.to_string(),
                &task.content,
                if task.completed { 1 } else { 0 },
                format_datetime(task.created_at),
                format_datetime(task.updated_at),
            ),
        )
        .map_err(|e| unique_violation(e, "tasks.id"))?;
        Ok(task.id)
    }

    fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Task>> {
        let conn = self.conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"),
                [id.to_string()],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    fn update(&self, id: Uuid, patch: &TaskPatch) -> RepoResult<()> {
        let conn = self.conn()?;

        let mut updates = vec!["updated_at = ?"];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        params.push(Box::new(format_datetime(patch.updated_at)));

        if let Some(content) = &patch.content {
            updates.push("content = ?");
            params.push(Box::new(content.clone()));
        }
        if let Some(completed) = patch.completed {
            updates.push("completed = ?");
            params.push(Box::new(if completed { 1 } else { 0 }));
        }

        params.push(Box::new(id.to_string()));

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", updates.join(", "));
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = conn.execute(&sql, params_ref.as_slice())?;
        if rows == 0 {
            tracing::debug!(task_id = %id, "update matched no task row");
        }

        Ok(())
    }

    fn delete(&self, id: Uuid) -> RepoResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM tasks WHERE id = ?", [id.to_string()])?;
        Ok(())
    }

    fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ? ORDER BY created_at DESC, id"
        ))?;

        let tasks = stmt
            .query_map([owner_id.to_string()], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }
}

/// Platform data directory location of the database file.
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "tasklist")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("tasklist.db"))
}

fn unique_violation(err: rusqlite::Error, constraint: &'static str) -> RepoError {
    let is_unique = matches!(
        &err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == ErrorCode::ConstraintViolation && msg.contains("UNIQUE")
    );
    if is_unique {
        RepoError::Duplicate(constraint)
    } else {
        RepoError::Sqlite(err)
    }
}

fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
