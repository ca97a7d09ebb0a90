//! SQLite pool construction for the index store.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{Error, Result};

/// Name of the database file inside the index directory.
pub const DB_FILE: &str = "entities.sqlite";

/// Open (creating if needed) the SQLite database under `index_dir`.
///
/// Creates the directory, enables WAL journaling, and sizes the pool for
/// interleaved concurrent reads and writes. Every failure maps to
/// [`Error::Connection`]: initialization failures are always loud.
pub async fn connect(index_dir: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(index_dir)
        .map_err(|e| Error::Connection(format!("{}: {}", index_dir.display(), e)))?;

    let db_path = index_dir.join(DB_FILE);
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(|e| Error::Connection(e.to_string()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| Error::Connection(e.to_string()))?;

    Ok(pool)
}
