//! Storage abstraction for schema history.
//!
//! The [`SchemaStore`] trait is the only shared, mutable resource in the
//! core. History is append-only per source: entries are never updated or
//! deleted, and a new version is only accepted if the caller saw the
//! current latest version (optimistic concurrency).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Schema, VersionedSchema};

/// Result of a compare-and-append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Another writer appended first. Carries the version that is now latest.
    Conflict { latest: Option<u32> },
}

/// Latest-version summary for one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub source_id: String,
    pub latest_version: u32,
    pub updated_at: DateTime<Utc>,
    pub field_count: usize,
}

/// Abstract storage backend for schema history.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_latest`](SchemaStore::get_latest) | Latest schema for a source |
/// | [`append_if_latest_version`](SchemaStore::append_if_latest_version) | Atomic compare-and-append |
/// | [`get_history`](SchemaStore::get_history) | Ordered history, oldest first |
/// | [`get_version`](SchemaStore::get_version) | One specific version |
/// | [`list_sources`](SchemaStore::list_sources) | All sources with their latest version |
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Latest stored schema for `source_id`, or `None` before the first ingest.
    async fn get_latest(&self, source_id: &str) -> Result<Option<Schema>>;

    /// Append `entry` only if the latest stored version equals
    /// `expected_prev` (`None` meaning no history yet).
    ///
    /// Must be atomic: either the entry is fully visible afterwards or
    /// nothing changed.
    async fn append_if_latest_version(
        &self,
        source_id: &str,
        expected_prev: Option<u32>,
        entry: &VersionedSchema,
    ) -> Result<AppendOutcome>;

    /// History for `source_id` in version order. With a limit, only the
    /// most recent `limit` entries are returned (still oldest first).
    async fn get_history(
        &self,
        source_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<VersionedSchema>>;

    /// A single version, if it exists.
    async fn get_version(&self, source_id: &str, version: u32)
        -> Result<Option<VersionedSchema>>;

    /// Every source with at least one version, ordered by source id.
    async fn list_sources(&self) -> Result<Vec<SourceSummary>>;
}
