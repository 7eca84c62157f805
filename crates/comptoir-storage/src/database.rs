// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use comptoir_core::ComptoirError;
use tracing::debug;

/// Handle to the single-writer SQLite database.
///
/// Query modules accept `&Database` and go through [`Database::connection`];
/// tokio-rusqlite serializes every closure on one background thread, which
/// eliminates `SQLITE_BUSY` under concurrent access.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, set pragmas, and run
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, ComptoirError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| ComptoirError::Storage {
                source: Box::new(e),
            })?;
        let db = Self::initialize(conn).await?;
        debug!(path = %path, "database opened");
        Ok(db)
    }

    /// Open an in-memory database with the full schema. Test use.
    pub async fn open_in_memory() -> Result<Self, ComptoirError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| ComptoirError::Storage {
                source: Box::new(e),
            })?;
        Self::initialize(conn).await
    }

    async fn initialize(conn: tokio_rusqlite::Connection) -> Result<Self, ComptoirError> {
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(crate::migrations::run_migrations)
            .await
            .map_err(map_tr_comptoir)?;

        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), ComptoirError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(|e| ComptoirError::Storage {
            source: Box::new(e),
        })?;
        debug!("database closed");
        Ok(())
    }
}

/// Convert a tokio-rusqlite error wrapping a rusqlite error into the
/// storage error variant.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ComptoirError {
    ComptoirError::Storage {
        source: Box::new(e),
    }
}

/// Convert a tokio-rusqlite error wrapping a ComptoirError, preserving the
/// inner error's taxonomy when the closure itself failed.
pub fn map_tr_comptoir(e: tokio_rusqlite::Error<ComptoirError>) -> ComptoirError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => ComptoirError::Storage {
            source: Box::new(other),
        },
    }
}

/// Parse a TEXT column into a strum-backed enum, mapping parse failures
/// onto rusqlite's conversion error so they surface through the normal
/// row-mapping path.
pub(crate) fn parse_enum<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
