// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use herald_core::HeraldError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;
     PRAGMA busy_timeout = 5000;";

/// Handle to the headline store.
///
/// Cheap to clone; every clone shares the same background connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database at `path` and run pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HeraldError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(HeraldError::storage)?;
        }

        // Schema setup runs on a plain connection before the shared one exists.
        let setup_path = path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), HeraldError> {
            let mut conn = rusqlite::Connection::open(&setup_path).map_err(HeraldError::storage)?;
            conn.execute_batch(PRAGMAS).map_err(HeraldError::storage)?;
            run_migrations(&mut conn)
        })
        .await
        .map_err(|e| HeraldError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        info!(path = %path.display(), "headline store opened");
        Ok(Self { conn, path })
    }

    /// The shared connection. All query modules go through this.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoint the WAL so the database file is self-contained.
    pub async fn close(&self) -> Result<(), HeraldError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Cheap liveness check.
    pub async fn ping(&self) -> Result<(), HeraldError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Convert tokio-rusqlite errors to [`HeraldError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> HeraldError {
    HeraldError::Storage {
        source: Box::new(std::io::Error::other(e.to_string())),
    }
}

/// Timestamps are stored as fixed-width RFC 3339 UTC text so they sort lexically.
pub fn to_db_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp written by [`to_db_time`].
pub fn from_db_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Optional variant of [`from_db_time`].
pub fn from_db_time_opt(raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(from_db_time).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema_and_wal() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("nested/herald.db")).await.unwrap();

        let (mode, tables) = db
            .connection()
            .call(|conn| -> Result<(String, Vec<String>), rusqlite::Error> {
                let mode: String = conn.query_row("PRAGMA journal_mode;", [], |r| r.get(0))?;
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |r| r.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((mode, names))
            })
            .await
            .unwrap();

        assert_eq!(mode.to_lowercase(), "wal");
        for table in ["credentials", "headlines", "plugin_state"] {
            assert!(tables.iter().any(|t| t == table), "missing {table}");
        }
        db.ping().await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("herald.db");
        let db = Database::open(&path).await.unwrap();
        db.close().await.unwrap();
        drop(db);
        let db = Database::open(&path).await.unwrap();
        db.ping().await.unwrap();
    }

    #[test]
    fn db_time_is_sortable_text() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 11, 2, 3, 4, 5).unwrap();
        assert_eq!(to_db_time(&a), "2026-01-02T03:04:05.000Z");
        assert!(to_db_time(&a) < to_db_time(&b));
        assert_eq!(from_db_time(&to_db_time(&b)).unwrap(), b);
        assert!(from_db_time("yesterday").is_err());
    }
}
