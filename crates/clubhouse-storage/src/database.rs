// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use clubhouse_config::model::StorageConfig;
use clubhouse_core::ClubError;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// Handle to the Clubhouse SQLite database.
///
/// Cloning is cheap; every clone talks to the same background connection, so
/// the single-writer guarantee holds across the whole process.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` with WAL enabled.
    pub async fn open(path: &str) -> Result<Self, ClubError> {
        Self::open_with(path, true).await
    }

    /// Open the database described by the `[storage]` config section.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, ClubError> {
        Self::open_with(&config.database_path, config.wal_mode).await
    }

    async fn open_with(path: &str, wal_mode: bool) -> Result<Self, ClubError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ClubError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(sql_err)?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        info!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema applied.
    pub async fn open_in_memory() -> Result<Self, ClubError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(sql_err)?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), ClubError> {
        let applied = self
            .conn
            .call(move |conn| -> Result<usize, ClubError> {
                if wal_mode {
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
                        .map_err(sql_err)?;
                    conn.pragma_update(None, "synchronous", "NORMAL")
                        .map_err(sql_err)?;
                }
                conn.pragma_update(None, "foreign_keys", "ON")
                    .map_err(sql_err)?;
                conn.pragma_update(None, "busy_timeout", 5000)
                    .map_err(sql_err)?;
                run_migrations(conn)
            })
            .await
            .map_err(map_call_err)?;
        debug!(applied, "migrations complete");
        Ok(())
    }

    /// Raw access to the background connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Run a read-only closure on the connection thread.
    pub async fn call<F, R>(&self, f: F) -> Result<R, ClubError>
    where
        F: FnOnce(&Connection) -> Result<R, ClubError> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| -> Result<R, ClubError> { f(conn) })
            .await
            .map_err(map_call_err)
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// The closure runs inside a `BEGIN IMMEDIATE` transaction on the writer
    /// thread. `Ok` commits; any `Err` drops the transaction, which rolls
    /// back every statement the closure executed.
    pub async fn unit_of_work<F, R>(&self, f: F) -> Result<R, ClubError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, ClubError> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| -> Result<R, ClubError> {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(sql_err)?;
                let value = f(&tx)?;
                tx.commit().map_err(sql_err)?;
                Ok(value)
            })
            .await
            .map_err(map_call_err)
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), ClubError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)?;
        debug!("database closed");
        Ok(())
    }
}

/// Convert a tokio-rusqlite error carrying a rusqlite error into [`ClubError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ClubError {
    ClubError::Storage {
        source: Box::new(e),
    }
}

/// Unwrap domain errors raised inside a connection closure.
fn map_call_err(e: tokio_rusqlite::Error<ClubError>) -> ClubError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => ClubError::Storage {
            source: other.to_string().into(),
        },
    }
}

/// Convert a rusqlite error raised inside a closure into [`ClubError::Storage`].
pub fn sql_err(e: rusqlite::Error) -> ClubError {
    ClubError::Storage {
        source: Box::new(e),
    }
}
