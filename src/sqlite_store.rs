//! SQLite-backed [`SchemaStore`] implementation.
//!
//! Each version is one row of `schema_versions`, keyed by
//! `(source_id, version)`. The schema and its diff are stored as JSON so
//! the row format follows the core models without a column per field.
//!
//! Appends run inside `BEGIN IMMEDIATE`, so the `MAX(version)` check and
//! the insert happen under one write lock. Writers queue on the busy
//! timeout instead of failing, and only a changed latest version for the
//! same source comes back as [`AppendOutcome::Conflict`]. The primary key
//! still rejects a duplicate `(source_id, version)` if one slips through.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};

use schema_drift_core::models::{Schema, SchemaDiff, VersionedSchema};
use schema_drift_core::store::{AppendOutcome, SchemaStore, SourceSummary};

use crate::config::Config;
use crate::{db, migrate};

pub struct SqliteSchemaStore {
    pool: SqlitePool,
}

impl SqliteSchemaStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database, creating tables if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

fn decode_entry(row: &SqliteRow) -> Result<VersionedSchema> {
    let schema_json: String = row.try_get("schema_json")?;
    let diff_json: String = row.try_get("diff_json")?;
    let schema: Schema =
        serde_json::from_str(&schema_json).context("Corrupt schema_json in schema_versions")?;
    let diff: SchemaDiff =
        serde_json::from_str(&diff_json).context("Corrupt diff_json in schema_versions")?;
    Ok(VersionedSchema { schema, diff })
}

fn timestamp_to_utc(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Compare-and-insert on a connection that already holds the write lock.
///
/// Nothing else can commit between the `MAX(version)` read and the insert,
/// so writers to other sources never show up here as conflicts.
async fn append_locked(
    conn: &mut SqliteConnection,
    source_id: &str,
    expected_prev: Option<u32>,
    entry: &VersionedSchema,
    schema_json: &str,
    diff_json: &str,
) -> Result<AppendOutcome> {
    let latest: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_versions WHERE source_id = ?")
            .bind(source_id)
            .fetch_one(&mut *conn)
            .await?;
    let latest = latest.map(|v| v as u32);
    if latest != expected_prev {
        return Ok(AppendOutcome::Conflict { latest });
    }

    let expected_next = latest.map_or(1, |v| v + 1);
    if entry.schema.version != expected_next {
        anyhow::bail!(
            "refusing to append version {} to '{}': next version is {}",
            entry.schema.version,
            source_id,
            expected_next
        );
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO schema_versions (source_id, version, schema_id, created_at,
                                     fingerprint, field_count, schema_json, diff_json)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(source_id)
    .bind(entry.schema.version as i64)
    .bind(&entry.schema.schema_id)
    .bind(entry.schema.created_at.timestamp_millis())
    .bind(&entry.schema.fingerprint)
    .bind(entry.schema.summary.field_count as i64)
    .bind(schema_json)
    .bind(diff_json)
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => Ok(AppendOutcome::Appended),
        Err(e) if is_unique_violation(&e) => {
            tracing::debug!(source = source_id, error = %e, "append lost the race");
            Ok(AppendOutcome::Conflict { latest })
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl SchemaStore for SqliteSchemaStore {
    async fn get_latest(&self, source_id: &str) -> Result<Option<Schema>> {
        let row = sqlx::query(
            "SELECT schema_json, diff_json FROM schema_versions \
             WHERE source_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| decode_entry(&r).map(|e| e.schema)).transpose()
    }

    async fn append_if_latest_version(
        &self,
        source_id: &str,
        expected_prev: Option<u32>,
        entry: &VersionedSchema,
    ) -> Result<AppendOutcome> {
        let schema_json = serde_json::to_string(&entry.schema)?;
        let diff_json = serde_json::to_string(&entry.diff)?;

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .context("Failed to take the schema history write lock")?;

        let outcome = append_locked(
            &mut conn,
            source_id,
            expected_prev,
            entry,
            &schema_json,
            &diff_json,
        )
        .await;

        match outcome {
            Ok(AppendOutcome::Appended) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(AppendOutcome::Appended)
            }
            Ok(conflict) => {
                sqlx::query("ROLLBACK").execute(&mut *conn).await?;
                Ok(conflict)
            }
            Err(e) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::warn!(source = source_id, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn get_history(
        &self,
        source_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<VersionedSchema>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |n| n as i64);
        let rows = sqlx::query(
            r#"
            SELECT schema_json, diff_json, version FROM (
                SELECT schema_json, diff_json, version FROM schema_versions
                WHERE source_id = ?
                ORDER BY version DESC
                LIMIT ?
            )
            ORDER BY version ASC
            "#,
        )
        .bind(source_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_entry).collect()
    }

    async fn get_version(
        &self,
        source_id: &str,
        version: u32,
    ) -> Result<Option<VersionedSchema>> {
        let row = sqlx::query(
            "SELECT schema_json, diff_json FROM schema_versions WHERE source_id = ? AND version = ?",
        )
        .bind(source_id)
        .bind(version as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_entry).transpose()
    }

    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT s.source_id, s.version, s.created_at, s.field_count
            FROM schema_versions s
            WHERE s.version = (
                SELECT MAX(version) FROM schema_versions WHERE source_id = s.source_id
            )
            ORDER BY s.source_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SourceSummary {
                    source_id: row.try_get("source_id")?,
                    latest_version: row.try_get::<i64, _>("version")? as u32,
                    updated_at: timestamp_to_utc(row.try_get("created_at")?),
                    field_count: row.try_get::<i64, _>("field_count")? as usize,
                })
            })
            .collect()
    }
}
