//! `drift render`: project a stored schema version onto a storage target.

use anyhow::Result;

use schema_drift_core::render::{self, RenderTarget, Rendered};
use schema_drift_core::store::SchemaStore;

use crate::config::Config;
use crate::history;
use crate::sqlite_store::SqliteSchemaStore;

/// Render `source_id` at `version` (latest when `None`) for `target`.
pub async fn render_schema<S: SchemaStore + ?Sized>(
    store: &S,
    config: &Config,
    source_id: &str,
    target: RenderTarget,
    version: Option<u32>,
) -> Result<Rendered> {
    let entry = history::load_version(store, config, source_id, version).await?;
    tracing::debug!(
        source = source_id,
        version = entry.schema.version,
        target = %target,
        "rendering schema"
    );
    Ok(render::render(&entry.schema, target, &config.render_options()))
}

pub async fn run_render(
    config: &Config,
    source_id: &str,
    target: RenderTarget,
    version: Option<u32>,
) -> Result<()> {
    let store = SqliteSchemaStore::open(config).await?;
    let rendered = render_schema(&store, config, source_id, target, version).await;
    store.close().await;

    println!("{}", rendered?);
    Ok(())
}
