use std::fs;
use std::path::Path;

use anyhow::{Error, Result};
use rusqlite::Connection;

/// Opens (creating if needed) the SQLite database backing local
/// storage and makes sure the schema exists.
pub fn open_db(db_path: &str) -> Result<Connection, Error> {
    if let Some(dir) = Path::new(db_path).parent() {
        fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(db_path)?;
    initialize_db(&conn)?;
    Ok(conn)
}

pub fn initialize_db(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
             key TEXT PRIMARY KEY,
             value TEXT NOT NULL
         );",
    )?;
    Ok(())
}
