pub mod repository;

use std::path::Path;

use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

/// Database wraps a single `tokio_rusqlite::Connection`. Statements run on
/// its background thread one at a time, each in its own autocommit unit, so
/// a failed write leaves the connection usable for the next one.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open the database at the given path, creating parent directories.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }

        let conn = tokio_rusqlite::Connection::open(&path).await?;
        Self::init(&conn).await?;
        log::debug!("Opened database at {}", path.display());
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init(&conn).await?;
        Ok(Self { conn })
    }

    async fn init(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| e.to_string())?;
            let migrations =
                Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))]);
            migrations.to_latest(conn).map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    pub fn conn(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        log::debug!("Database connection closed");
    }
}
