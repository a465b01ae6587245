// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Headline CRUD and retention sweeps.

use chrono::{DateTime, TimeDelta, Utc};
use herald_core::{HeraldError, RetentionPolicy};
use rusqlite::{Row, params};

use crate::database::{Database, from_db_time, map_tr_err, to_db_time};
use crate::models::{FlagUpdate, Headline, HeadlineFilter, InsertOutcome};

const COLUMNS: &str = "id, plugin_id, title, description, link, published_at, created_at,
     category, tags, importance, importance_rationale, metadata, read, starred, archived";

/// Most-recent-first ordering shared by listing and count retention.
const RECENCY: &str = "published_at DESC, created_at DESC, id DESC";

fn headline_from_row(row: &Row<'_>) -> rusqlite::Result<Headline> {
    let published: String = row.get(5)?;
    let created: String = row.get(6)?;
    let tags: String = row.get(8)?;
    let metadata: String = row.get(11)?;
    Ok(Headline {
        id: row.get(0)?,
        plugin_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        link: row.get(4)?,
        published_at: from_db_time(&published)?,
        created_at: from_db_time(&created)?,
        category: row.get(7)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        importance: row.get(9)?,
        importance_rationale: row.get(10)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        read: row.get(12)?,
        starred: row.get(13)?,
        archived: row.get(14)?,
    })
}

/// Insert a batch of headlines in one transaction.
///
/// Rows whose id already exists are left untouched and counted as duplicates.
pub async fn insert_headlines(
    db: &Database,
    headlines: Vec<Headline>,
) -> Result<InsertOutcome, HeraldError> {
    if headlines.is_empty() {
        return Ok(InsertOutcome::default());
    }
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut outcome = InsertOutcome::default();
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO headlines (id, plugin_id, title, description, link,
                         published_at, created_at, category, tags, importance,
                         importance_rationale, metadata, read, starred, archived)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                )?;
                for h in &headlines {
                    let tags = serde_json::to_string(&h.tags).unwrap_or_else(|_| "[]".into());
                    let metadata =
                        serde_json::to_string(&h.metadata).unwrap_or_else(|_| "null".into());
                    let changed = stmt.execute(params![
                        h.id,
                        h.plugin_id,
                        h.title,
                        h.description,
                        h.link,
                        to_db_time(&h.published_at),
                        to_db_time(&h.created_at),
                        h.category,
                        tags,
                        h.importance,
                        h.importance_rationale,
                        metadata,
                        h.read,
                        h.starred,
                        h.archived,
                    ])?;
                    if changed == 0 {
                        outcome.duplicates += 1;
                    } else {
                        outcome.inserted += 1;
                    }
                }
            }
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a headline by id.
pub async fn get_headline(db: &Database, id: &str) -> Result<Option<Headline>, HeraldError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {COLUMNS} FROM headlines WHERE id = ?1");
            match conn.query_row(&sql, params![id], headline_from_row) {
                Ok(h) => Ok(Some(h)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List headlines, most recent first.
pub async fn list_headlines(
    db: &Database,
    filter: &HeadlineFilter,
) -> Result<Vec<Headline>, HeraldError> {
    let filter = filter.clone();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM headlines
                 WHERE (?1 IS NULL OR plugin_id = ?1)
                   AND (?2 IS NULL OR importance >= ?2)
                   AND (?3 OR archived = 0)
                 ORDER BY {RECENCY}
                 LIMIT ?4 OFFSET ?5"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![
                    filter.plugin_id,
                    filter.min_importance,
                    filter.include_archived,
                    filter.limit,
                    filter.offset,
                ],
                headline_from_row,
            )?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Count stored headlines, optionally for one plugin.
pub async fn count_headlines(db: &Database, plugin_id: Option<&str>) -> Result<u64, HeraldError> {
    let plugin_id = plugin_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM headlines WHERE (?1 IS NULL OR plugin_id = ?1)",
                params![plugin_id],
                |r| r.get(0),
            )?;
            Ok(n.max(0) as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Update any of the read/starred/archived flags. Returns false if no such headline.
pub async fn update_flags(
    db: &Database,
    id: &str,
    update: FlagUpdate,
) -> Result<bool, HeraldError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE headlines SET
                     read = COALESCE(?2, read),
                     starred = COALESCE(?3, starred),
                     archived = COALESCE(?4, archived)
                 WHERE id = ?1",
                params![id, update.read, update.starred, update.archived],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Replace a headline's importance score and rationale.
pub async fn update_importance(
    db: &Database,
    id: &str,
    importance: f64,
    rationale: Option<String>,
) -> Result<bool, HeraldError> {
    let id = id.to_string();
    let importance = importance.clamp(0.0, 1.0);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE headlines SET importance = ?2, importance_rationale = ?3 WHERE id = ?1",
                params![id, importance, rationale],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Enforce a retention policy for one plugin. Returns the number of rows deleted.
///
/// Starred and archived headlines are swept like any other.
pub async fn apply_retention(
    db: &Database,
    plugin_id: &str,
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<usize, HeraldError> {
    let plugin_id = plugin_id.to_string();
    match policy {
        RetentionPolicy::Unlimited => Ok(0),
        RetentionPolicy::Count { max_items } => db
            .connection()
            .call(move |conn| {
                let sql = format!(
                    "DELETE FROM headlines
                     WHERE plugin_id = ?1
                       AND id NOT IN (
                           SELECT id FROM headlines WHERE plugin_id = ?1
                           ORDER BY {RECENCY} LIMIT ?2
                       )"
                );
                conn.execute(&sql, params![plugin_id, max_items])
            })
            .await
            .map_err(map_tr_err),
        RetentionPolicy::Duration { hours } => {
            // A window reaching past the representable range keeps everything.
            let Some(cutoff) = TimeDelta::try_hours(i64::from(hours))
                .and_then(|window| now.checked_sub_signed(window))
            else {
                return Ok(0);
            };
            let cutoff = to_db_time(&cutoff);
            db.connection()
                .call(move |conn| {
                    conn.execute(
                        "DELETE FROM headlines WHERE plugin_id = ?1 AND published_at < ?2",
                        params![plugin_id, cutoff],
                    )
                })
                .await
                .map_err(map_tr_err)
        }
    }
}
