//! Error types surfaced to callers.
//!
//! Stage-local issues (detection, normalization, inference) are never
//! errors; they are reported as [`Warning`](crate::models::Warning)s. Only
//! store failures and unresolved version races abort an ingest.

use thiserror::Error;

/// Errors from the schema evolution tracker.
#[derive(Debug, Error)]
pub enum EvolutionError {
    /// Concurrent writers kept winning the append race for this source.
    /// Retryable by the caller.
    #[error("version conflict on source '{source_id}' after {attempts} attempts")]
    VersionConflict { source_id: String, attempts: u32 },

    /// The caller asked for a specific version that is not the next one.
    #[error("version hint {requested} for source '{source_id}' does not match next version {next}")]
    VersionHintMismatch {
        source_id: String,
        requested: u32,
        next: u32,
    },

    /// A requested version does not exist in the history.
    #[error("source '{source_id}' has no version {version}")]
    VersionNotFound { source_id: String, version: u32 },

    /// The schema history store could not be read or written. Nothing was
    /// recorded for this ingest.
    #[error("schema store unavailable: {0:#}")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl EvolutionError {
    /// Whether retrying the same ingest later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EvolutionError::VersionConflict { .. } | EvolutionError::StoreUnavailable(_)
        )
    }
}

/// Errors from rendering a schema or a migration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("unknown render target '{0}'. Must be relational, document, graph, or jsonschema.")]
    UnknownTarget(String),

    #[error("migration statements are not available for target '{0}'")]
    MigrationUnsupported(String),
}
