use anyhow::Result;

use schema_drift_core::store::{SchemaStore, SourceSummary};

use crate::config::Config;
use crate::sqlite_store::SqliteSchemaStore;

/// Every source with recorded history, sorted by id.
pub async fn known_sources<S: SchemaStore + ?Sized>(store: &S) -> Result<Vec<SourceSummary>> {
    store.list_sources().await
}

pub async fn list_sources(config: &Config, json: bool) -> Result<()> {
    let store = SqliteSchemaStore::open(config).await?;
    let sources = known_sources(&store).await;
    store.close().await;
    let sources = sources?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    if sources.is_empty() {
        println!("No sources yet. Run `drift ingest <path>` first.");
        return Ok(());
    }

    println!("{:<32} {:<8} {:<7} UPDATED", "SOURCE", "VERSION", "FIELDS");
    for s in &sources {
        println!(
            "{:<32} {:<8} {:<7} {}",
            s.source_id,
            s.latest_version,
            s.field_count,
            s.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
