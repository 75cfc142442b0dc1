//! Schema history queries: `drift history`, `drift show`, `drift diff`,
//! and `drift migrate`.
//!
//! Each command has a core function that returns structured data over any
//! [`SchemaStore`] and a `run_*` wrapper that opens the configured database
//! and prints the result.

use anyhow::{bail, Result};
use serde::Serialize;

use schema_drift_core::evolve::SchemaTracker;
use schema_drift_core::models::{SchemaDiff, VersionedSchema};
use schema_drift_core::render::{self, RenderTarget};
use schema_drift_core::store::SchemaStore;

use crate::config::Config;
use crate::sqlite_store::SqliteSchemaStore;

/// One line of `drift history`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub version: u32,
    pub created_at: String, // ISO8601
    pub field_count: usize,
    pub fingerprint: String,
    pub migration_notes: String,
}

impl From<&VersionedSchema> for HistoryEntry {
    fn from(entry: &VersionedSchema) -> Self {
        Self {
            version: entry.schema.version,
            created_at: entry.schema.created_at.to_rfc3339(),
            field_count: entry.schema.summary.field_count,
            fingerprint: entry.schema.fingerprint.clone(),
            migration_notes: entry.diff.migration_notes.clone(),
        }
    }
}

/// History of `source_id`, oldest first, optionally only the last `limit`.
pub async fn source_history<S: SchemaStore + ?Sized>(
    store: &S,
    config: &Config,
    source_id: &str,
    limit: Option<usize>,
) -> Result<Vec<HistoryEntry>> {
    let tracker = SchemaTracker::new(store, config.tracker_options());
    let history = tracker.history(source_id, limit).await?;
    if history.is_empty() {
        bail!("no schema history for source: {}", source_id);
    }
    Ok(history.iter().map(HistoryEntry::from).collect())
}

/// A stored version of `source_id`; the latest when `version` is `None`.
pub async fn load_version<S: SchemaStore + ?Sized>(
    store: &S,
    config: &Config,
    source_id: &str,
    version: Option<u32>,
) -> Result<VersionedSchema> {
    let tracker = SchemaTracker::new(store, config.tracker_options());
    match version {
        Some(v) => Ok(tracker.version(source_id, v).await?),
        None => match tracker.history(source_id, Some(1)).await?.pop() {
            Some(latest) => Ok(latest),
            None => bail!("no schema history for source: {}", source_id),
        },
    }
}

/// Diff between two stored versions. `to` defaults to the latest version
/// and `from` to the one before it.
pub async fn diff_between<S: SchemaStore + ?Sized>(
    store: &S,
    config: &Config,
    source_id: &str,
    from: Option<u32>,
    to: Option<u32>,
) -> Result<SchemaDiff> {
    let to = match to {
        Some(v) => v,
        None => load_version(store, config, source_id, None).await?.schema.version,
    };
    let from = match from {
        Some(v) => v,
        None if to > 1 => to - 1,
        None => bail!("source '{}' has only one version; pass --from", source_id),
    };

    let tracker = SchemaTracker::new(store, config.tracker_options());
    Ok(tracker.diff_versions(source_id, from, to).await?)
}

/// Migration statements that move `source_id` from `from` to `to` on the
/// given target. The table or collection name comes from the source id and
/// the configured prefix.
pub async fn migration_for<S: SchemaStore + ?Sized>(
    store: &S,
    config: &Config,
    source_id: &str,
    from: Option<u32>,
    to: Option<u32>,
    target: RenderTarget,
) -> Result<Vec<String>> {
    let diff = diff_between(store, config, source_id, from, to).await?;
    let table = render::table_name(source_id, &config.render.table_prefix);
    Ok(render::migration_statements(&diff, target, &table)?)
}

pub async fn run_history(
    config: &Config,
    source_id: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let store = SqliteSchemaStore::open(config).await?;
    let entries = source_history(&store, config, source_id, limit).await;
    store.close().await;
    let entries = entries?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!(
        "{:<8} {:<26} {:<7} {:<14} CHANGES",
        "VERSION", "CREATED", "FIELDS", "FINGERPRINT"
    );
    for e in &entries {
        println!(
            "{:<8} {:<26} {:<7} {:<14} {}",
            e.version,
            e.created_at,
            e.field_count,
            &e.fingerprint[..e.fingerprint.len().min(12)],
            e.migration_notes
        );
    }
    Ok(())
}

pub async fn run_show(config: &Config, source_id: &str, version: Option<u32>) -> Result<()> {
    let store = SqliteSchemaStore::open(config).await?;
    let entry = load_version(&store, config, source_id, version).await;
    store.close().await;

    println!("{}", serde_json::to_string_pretty(&entry?)?);
    Ok(())
}

pub async fn run_diff(
    config: &Config,
    source_id: &str,
    from: Option<u32>,
    to: Option<u32>,
    json: bool,
) -> Result<()> {
    let store = SqliteSchemaStore::open(config).await?;
    let diff = diff_between(&store, config, source_id, from, to).await;
    store.close().await;
    let diff = diff?;

    if json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(());
    }

    for f in &diff.added {
        println!("+ {} {}", f.path, describe(f.field_type.as_str(), f.nullable));
    }
    for f in &diff.removed {
        println!("- {} {}", f.path, describe(f.field_type.as_str(), f.nullable));
    }
    for c in &diff.modified {
        println!(
            "~ {} {} -> {}",
            c.path,
            describe(c.before.field_type.as_str(), c.before.nullable),
            describe(c.after.field_type.as_str(), c.after.nullable)
        );
    }
    for h in &diff.rename_hints {
        println!("? {} -> {} (similarity {:.2})", h.from, h.to, h.similarity);
    }
    println!("{}", diff.migration_notes);
    Ok(())
}

pub async fn run_migrate(
    config: &Config,
    source_id: &str,
    from: Option<u32>,
    to: Option<u32>,
    target: RenderTarget,
) -> Result<()> {
    let store = SqliteSchemaStore::open(config).await?;
    let statements = migration_for(&store, config, source_id, from, to, target).await;
    store.close().await;

    let statements = statements?;
    if statements.is_empty() {
        println!("-- no changes");
    }
    for s in &statements {
        println!("{}", s);
    }
    Ok(())
}

fn describe(field_type: &str, nullable: bool) -> String {
    if nullable {
        format!("{}?", field_type)
    } else {
        field_type.to_string()
    }
}
