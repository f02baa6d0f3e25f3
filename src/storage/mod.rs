//! Named-entry blob storage. Every write replaces the whole value for
//! a key; there are no partial or merge writes.
use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Error, Result, anyhow};
use rusqlite::{Connection, OptionalExtension};

use crate::core::db::{initialize_db, open_db};

pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;
}

pub type BoxedKvStore = Box<dyn KvStore + Send + Sync + 'static>;

/// SQLite backed storage. `rusqlite::Connection` is not `Sync` so it
/// lives behind a mutex.
pub struct SqliteKv {
    conn: Mutex<Connection>,
}

impl SqliteKv {
    pub fn open(db_path: &str) -> Result<Self, Error> {
        let conn = open_db(db_path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        initialize_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let conn = self.conn.lock().map_err(|_| anyhow!("Storage lock poisoned"))?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let conn = self.conn.lock().map_err(|_| anyhow!("Storage lock poisoned"))?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("Storage lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("Storage lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
