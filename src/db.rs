//! SQLite pool setup for the catalog.
//!
//! Every connection runs in WAL mode with foreign keys enforced, so that
//! deleting a product cascades to its variants and offers while the server
//! keeps reading.

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::config::DbConfig;

/// Connection options for the catalog database at `db.path`.
pub fn connect_options(db: &DbConfig) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(&db.path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(db.busy_timeout())
}

/// Opens the pool, creating the database file and its directory if needed.
pub async fn connect(db: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(db.max_connections)
        .connect_with(connect_options(db))
        .await
        .with_context(|| format!("Failed to open database: {}", db.path.display()))?;

    tracing::debug!(path = %db.path.display(), "catalog database opened");
    Ok(pool)
}
