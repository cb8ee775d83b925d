#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! `SQLite`-backed [`ceu_engine::PersistedData`] and [`ceu_engine::PingManager`]
//! collaborators.
//!
//! The `(pv, fp)` pair and the per-batch ping queue live in the same
//! database, opened once at startup and shared through a connection pool.

pub mod store;

use std::path::Path;
use std::time::Duration;

use ceu_errors::Error;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

pub use store::SqliteStore;

/// Opens (creating if missing) the sqlite database at `db_path`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn create_pool(db_path: &Path) -> Result<Pool<Sqlite>, Error> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| Error::internal(format!("opening persisted-data database: {e}")))
}

/// Runs the embedded migrations against `pool`.
///
/// # Errors
///
/// Returns an error if any migration fails to apply.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::internal(format!("running persisted-data migrations: {e}")))?;
    tracing::debug!("persisted-data migrations applied");
    Ok(())
}
