// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-plugin run-state: last run, last success, last error.

use chrono::{DateTime, Utc};
use herald_core::HeraldError;
use rusqlite::{Row, params};

use crate::database::{Database, from_db_time_opt, map_tr_err, to_db_time};
use crate::models::PluginRunState;

fn state_from_row(row: &Row<'_>) -> rusqlite::Result<PluginRunState> {
    Ok(PluginRunState {
        plugin_id: row.get(0)?,
        last_run_at: from_db_time_opt(row.get(1)?)?,
        last_success_at: from_db_time_opt(row.get(2)?)?,
        last_error: row.get(3)?,
        last_error_at: from_db_time_opt(row.get(4)?)?,
        run_count: row.get::<_, i64>(5)?.max(0) as u64,
        error_count: row.get::<_, i64>(6)?.max(0) as u64,
    })
}

/// Record a successful run. Clears the last error.
pub async fn record_success(
    db: &Database,
    plugin_id: &str,
    at: DateTime<Utc>,
) -> Result<(), HeraldError> {
    let plugin_id = plugin_id.to_string();
    let at = to_db_time(&at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO plugin_state (plugin_id, last_run_at, last_success_at, run_count, updated_at)
                 VALUES (?1, ?2, ?2, 1, ?2)
                 ON CONFLICT(plugin_id) DO UPDATE SET
                     last_run_at = excluded.last_run_at,
                     last_success_at = excluded.last_success_at,
                     last_error = NULL,
                     run_count = run_count + 1,
                     updated_at = excluded.updated_at",
                params![plugin_id, at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed run or failed initialization.
pub async fn record_failure(
    db: &Database,
    plugin_id: &str,
    at: DateTime<Utc>,
    message: &str,
) -> Result<(), HeraldError> {
    let plugin_id = plugin_id.to_string();
    let message = message.to_string();
    let at = to_db_time(&at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO plugin_state (plugin_id, last_run_at, last_error, last_error_at, run_count, error_count, updated_at)
                 VALUES (?1, ?2, ?3, ?2, 1, 1, ?2)
                 ON CONFLICT(plugin_id) DO UPDATE SET
                     last_run_at = excluded.last_run_at,
                     last_error = excluded.last_error,
                     last_error_at = excluded.last_error_at,
                     run_count = run_count + 1,
                     error_count = error_count + 1,
                     updated_at = excluded.updated_at",
                params![plugin_id, at, message],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get the run-state of one plugin.
pub async fn get_run_state(
    db: &Database,
    plugin_id: &str,
) -> Result<Option<PluginRunState>, HeraldError> {
    let plugin_id = plugin_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT plugin_id, last_run_at, last_success_at, last_error, last_error_at,
                        run_count, error_count
                 FROM plugin_state WHERE plugin_id = ?1",
                params![plugin_id],
                state_from_row,
            );
            match result {
                Ok(state) => Ok(Some(state)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Run-state of every plugin that has ever run, ordered by id.
pub async fn list_run_states(db: &Database) -> Result<Vec<PluginRunState>, HeraldError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT plugin_id, last_run_at, last_success_at, last_error, last_error_at,
                        run_count, error_count
                 FROM plugin_state ORDER BY plugin_id",
            )?;
            let rows = stmt.query_map([], state_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
