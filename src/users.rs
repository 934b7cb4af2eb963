//! SQLite-backed user accounts.
//!
//! A single append-only `users` table keyed by unique email. The connection is
//! guarded by a std mutex; callers on the async runtime go through
//! `spawn_blocking`.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
";

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("failed to create database directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("email already registered")]
    DuplicateEmail,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, UserStoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// A user row including its stored password hash and registration time.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: User,
    pub password_hash: String,
    pub created_at: String,
}

pub struct UserStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for UserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStore").finish_non_exhaustive()
    }
}

impl UserStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| UserStoreError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::apply_schema(&conn)?;
        tracing::debug!(path = %path.display(), "user database initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn apply_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().map_err(|_| UserStoreError::Poisoned)?;
        f(&conn)
    }

    /// Insert a new user. Fails with [`UserStoreError::DuplicateEmail`] and
    /// writes nothing if the email is taken.
    pub fn create(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (name, email, password) VALUES (?1, ?2, ?3)",
                params![name, email, password_hash],
            );
            match inserted {
                Ok(_) => Ok(User {
                    id: conn.last_insert_rowid(),
                    name: name.to_string(),
                    email: email.to_string(),
                }),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(UserStoreError::DuplicateEmail)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, email, password, CAST(created_at AS TEXT)
                     FROM users WHERE email = ?1",
                    params![email],
                    |row| {
                        Ok(StoredUser {
                            user: User {
                                id: row.get(0)?,
                                name: row.get(1)?,
                                email: row.get(2)?,
                            },
                            password_hash: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
        })
    }

    /// Most recently registered users first.
    pub fn recent(&self, limit: usize) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email FROM users
                 ORDER BY created_at DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                })
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    /// Every user with registration time, in id order.
    pub fn list(&self) -> Result<Vec<(User, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, CAST(created_at AS TEXT) FROM users ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    },
                    row.get(3)?,
                ))
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_find() {
        let store = UserStore::open_in_memory().unwrap();
        let user = store.create("Ann", "ann@example.com", "hash-a").unwrap();
        assert_eq!(user.id, 1);

        let found = store.find_by_email("ann@example.com").unwrap().unwrap();
        assert_eq!(found.user, user);
        assert_eq!(found.password_hash, "hash-a");
        assert!(!found.created_at.is_empty());

        assert!(store.find_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_writes_nothing() {
        let store = UserStore::open_in_memory().unwrap();
        store.create("Ann", "ann@example.com", "h1").unwrap();
        let err = store.create("Other", "ann@example.com", "h2").unwrap_err();
        assert!(matches!(err, UserStoreError::DuplicateEmail));
        assert_eq!(store.count().unwrap(), 1);
        let found = store.find_by_email("ann@example.com").unwrap().unwrap();
        assert_eq!(found.user.name, "Ann");
    }

    #[test]
    fn test_recent_newest_first_and_limited() {
        let store = UserStore::open_in_memory().unwrap();
        for i in 0..7 {
            store
                .create(&format!("u{i}"), &format!("u{i}@example.com"), "h")
                .unwrap();
        }
        let recent = store.recent(5).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].name, "u6");
        assert_eq!(recent[4].name, "u2");
        assert_eq!(store.list().unwrap().len(), 7);
    }

    #[test]
    fn test_open_creates_parent_dir_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.db");
        {
            let store = UserStore::open(&path).unwrap();
            store.create("Ann", "ann@example.com", "h").unwrap();
        }
        let reopened = UserStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
