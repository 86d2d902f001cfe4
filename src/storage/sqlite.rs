use rusqlite::{Connection, OptionalExtension};
use std::path::PathBuf;

use super::{MediumError, StorageMedium};

/// Key-value table in a SQLite database file
pub struct SqliteMedium {
    conn: Connection,
}

impl SqliteMedium {
    /// Open or create the database and initialize the schema
    pub fn new(path: &str) -> Result<Self, MediumError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        // Several terminal sessions may share one file
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.busy_timeout(std::time::Duration::from_millis(500))?;

        let medium = SqliteMedium { conn };
        medium.initialize_schema()?;
        Ok(medium)
    }

    /// Private database, mostly for tests
    pub fn open_in_memory() -> Result<Self, MediumError> {
        let medium = SqliteMedium {
            conn: Connection::open_in_memory()?,
        };
        medium.initialize_schema()?;
        Ok(medium)
    }

    fn initialize_schema(&self) -> Result<(), MediumError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl StorageMedium for SqliteMedium {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_overwrites_value() {
        let medium = SqliteMedium::open_in_memory().unwrap();
        medium.set("tasks", "[]").unwrap();
        medium.set("tasks", "[1]").unwrap();

        assert_eq!(medium.get("tasks").unwrap().as_deref(), Some("[1]"));
        assert_eq!(medium.keys().unwrap(), vec!["tasks"]);
    }

    #[test]
    fn test_two_connections_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        let path = path.to_str().unwrap();

        let first = SqliteMedium::new(path).unwrap();
        let second = SqliteMedium::new(path).unwrap();
        first.set("projects", "[\"p\"]").unwrap();

        assert_eq!(second.get("projects").unwrap().as_deref(), Some("[\"p\"]"));
        second.remove("projects").unwrap();
        assert_eq!(first.get("projects").unwrap(), None);
    }
}
