// SQLite-backed token store
// Keeps credentials in an `auth_kv` key/value table

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::TokenStore;
use crate::error::StoreError;

const CREATE_TABLE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)";

/// Durable store backed by a single SQLite database file
pub struct SqliteTokenStore {
    conn: Mutex<Connection>,
}

impl SqliteTokenStore {
    /// Open (or create) the database at `path`, creating parent directories
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::debug!("Opening token store: {}", path.display());
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(CREATE_TABLE_SQL, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        // Transactions roll back on drop, so a poisoned lock holds no partial batch
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        Ok(f(&mut conn)?)
    }
}

impl TokenStore for SqliteTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM auth_kv WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for (key, value) in entries {
                tx.execute(
                    "INSERT INTO auth_kv (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )?;
            }
            tx.commit()
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for key in keys {
                tx.execute("DELETE FROM auth_kv WHERE key = ?", [key])?;
            }
            tx.commit()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ACCESS_TOKEN_KEY, CREDENTIAL_KEYS, REFRESH_TOKEN_KEY, TOKEN_TYPE_KEY};

    #[test]
    fn test_empty_store_reads_none() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        for key in CREDENTIAL_KEYS {
            assert_eq!(store.get(key).unwrap(), None);
        }
    }

    #[test]
    fn test_set_many_overwrites() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        store
            .set_many(&[(ACCESS_TOKEN_KEY, "a1"), (REFRESH_TOKEN_KEY, "r1")])
            .unwrap();
        store.set_many(&[(ACCESS_TOKEN_KEY, "a2")]).unwrap();

        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a2"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
    }

    #[test]
    fn test_remove_many_clears_entries() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        store
            .set_many(&[
                (ACCESS_TOKEN_KEY, "a1"),
                (REFRESH_TOKEN_KEY, "r1"),
                (TOKEN_TYPE_KEY, "bearer"),
            ])
            .unwrap();

        store.remove_many(&CREDENTIAL_KEYS).unwrap();

        for key in CREDENTIAL_KEYS {
            assert_eq!(store.get(key).unwrap(), None);
        }
    }

    #[test]
    fn test_set_many_is_atomic() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        store.set_many(&[(ACCESS_TOKEN_KEY, "a1")]).unwrap();

        // Make the second statement of the batch fail
        store
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_refresh BEFORE INSERT ON auth_kv
                     WHEN NEW.key = 'refresh_token'
                     BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                )
            })
            .unwrap();

        let result = store.set_many(&[(ACCESS_TOKEN_KEY, "a2"), (REFRESH_TOKEN_KEY, "r2")]);
        assert!(result.is_err());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a1"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_open_creates_file() {
        let dir = std::env::temp_dir().join(format!("sermon-session-test-{}", std::process::id()));
        let path = dir.join("nested").join("session.sqlite3");

        {
            let store = SqliteTokenStore::open(&path).unwrap();
            store.set_many(&[(REFRESH_TOKEN_KEY, "persisted")]).unwrap();
        }

        let reopened = SqliteTokenStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
            Some("persisted")
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
