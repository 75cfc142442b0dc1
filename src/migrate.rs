//! Idempotent creation of the schema history tables.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create tables and indexes on an open pool. Safe to run repeatedly.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // One row per (source, version); rows are only ever inserted.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_versions (
            source_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            schema_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            fingerprint TEXT NOT NULL,
            field_count INTEGER NOT NULL,
            schema_json TEXT NOT NULL,
            diff_json TEXT NOT NULL,
            PRIMARY KEY (source_id, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_schema_versions_fingerprint ON schema_versions(fingerprint)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("schema_versions table ready");
    Ok(())
}
