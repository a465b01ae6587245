// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential rows backing the vault's fallback store.

use std::str::FromStr;

use herald_core::HeraldError;
use rusqlite::{Row, params};

use crate::database::{Database, from_db_time, map_tr_err, to_db_time};
use crate::models::{CredentialBackend, CredentialRow};

fn row_to_credential(row: &Row<'_>) -> rusqlite::Result<CredentialRow> {
    let backend: String = row.get(2)?;
    let created: String = row.get(4)?;
    let updated: String = row.get(5)?;
    Ok(CredentialRow {
        plugin_id: row.get(0)?,
        auth_type: row.get(1)?,
        backend: CredentialBackend::from_str(&backend).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        payload: row.get(3)?,
        created_at: from_db_time(&created)?,
        updated_at: from_db_time(&updated)?,
    })
}

/// Insert or replace the credential row for a plugin, keeping the original `created_at`.
pub async fn upsert_credential(db: &Database, row: &CredentialRow) -> Result<(), HeraldError> {
    let row = row.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO credentials (plugin_id, auth_type, backend, payload, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(plugin_id) DO UPDATE SET
                     auth_type = excluded.auth_type,
                     backend = excluded.backend,
                     payload = excluded.payload,
                     updated_at = excluded.updated_at",
                params![
                    row.plugin_id,
                    row.auth_type,
                    row.backend.to_string(),
                    row.payload,
                    to_db_time(&row.created_at),
                    to_db_time(&row.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get the credential row of a plugin.
pub async fn get_credential(
    db: &Database,
    plugin_id: &str,
) -> Result<Option<CredentialRow>, HeraldError> {
    let plugin_id = plugin_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT plugin_id, auth_type, backend, payload, created_at, updated_at
                 FROM credentials WHERE plugin_id = ?1",
                params![plugin_id],
                row_to_credential,
            );
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a plugin's credential row. Returns true if a row existed.
pub async fn delete_credential(db: &Database, plugin_id: &str) -> Result<bool, HeraldError> {
    let plugin_id = plugin_id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM credentials WHERE plugin_id = ?1",
                params![plugin_id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// All credential rows, ordered by plugin id.
pub async fn list_credentials(db: &Database) -> Result<Vec<CredentialRow>, HeraldError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT plugin_id, auth_type, backend, payload, created_at, updated_at
                 FROM credentials ORDER BY plugin_id",
            )?;
            let rows = stmt.query_map([], row_to_credential)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).await.unwrap();
        (db, dir)
    }

    fn make_row(plugin_id: &str, backend: CredentialBackend) -> CredentialRow {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        CredentialRow {
            plugin_id: plugin_id.into(),
            auth_type: "apikey".into(),
            backend,
            payload: match backend {
                CredentialBackend::Store => Some(r#"{"auth_type":"apikey","key":"k"}"#.into()),
                CredentialBackend::Keyring => None,
            },
            created_at: ts,
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn upsert_get_delete() {
        let (db, _dir) = setup_db().await;
        let row = make_row("gmail", CredentialBackend::Store);
        upsert_credential(&db, &row).await.unwrap();
        assert_eq!(get_credential(&db, "gmail").await.unwrap(), Some(row));

        assert!(delete_credential(&db, "gmail").await.unwrap());
        assert!(!delete_credential(&db, "gmail").await.unwrap());
        assert!(get_credential(&db, "gmail").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_preserves_created_at() {
        let (db, _dir) = setup_db().await;
        let first = make_row("gh", CredentialBackend::Keyring);
        upsert_credential(&db, &first).await.unwrap();

        let mut second = make_row("gh", CredentialBackend::Store);
        second.created_at = first.created_at + Duration::days(3);
        second.updated_at = first.created_at + Duration::days(3);
        upsert_credential(&db, &second).await.unwrap();

        let got = get_credential(&db, "gh").await.unwrap().unwrap();
        assert_eq!(got.created_at, first.created_at);
        assert_eq!(got.updated_at, second.updated_at);
        assert_eq!(got.backend, CredentialBackend::Store);
        assert!(got.payload.is_some());
    }

    #[tokio::test]
    async fn list_returns_all_rows() {
        let (db, _dir) = setup_db().await;
        upsert_credential(&db, &make_row("b", CredentialBackend::Store))
            .await
            .unwrap();
        upsert_credential(&db, &make_row("a", CredentialBackend::Keyring))
            .await
            .unwrap();
        let rows = list_credentials(&db).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].plugin_id, "a");
        assert_eq!(rows[0].backend, CredentialBackend::Keyring);
    }
}
