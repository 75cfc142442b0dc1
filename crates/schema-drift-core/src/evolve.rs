//! Schema evolution: diffing versions and recording new ones.
//!
//! [`diff_schemas`] compares two field lists by path. [`SchemaTracker`]
//! assigns version numbers and appends to a [`SchemaStore`] with
//! compare-and-append, retrying a bounded number of times when another
//! writer for the same source wins the race.
//!
//! # Diff ordering
//!
//! - `added` and `modified` follow the new schema's field order.
//! - `removed` follows the old schema's field order.
//! - `rename_hints` follow `removed`; they never remove entries from
//!   `added` or `removed`.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::EvolutionError;
use crate::models::{
    FieldChange, FieldDescriptor, InferredSchema, RenameHint, Schema, SchemaDiff, SchemaSummary,
    VersionedSchema,
};
use crate::store::{AppendOutcome, SchemaStore};

pub const DEFAULT_MAX_APPEND_RETRIES: u32 = 5;
pub const DEFAULT_RENAME_SIMILARITY: f64 = 0.6;

/// Field-level diff between `old` and `new`.
pub fn diff_schemas(
    old: &[FieldDescriptor],
    new: &[FieldDescriptor],
    rename_similarity: f64,
) -> SchemaDiff {
    let old_by_path: HashMap<&str, &FieldDescriptor> =
        old.iter().map(|f| (f.path.as_str(), f)).collect();
    let new_paths: HashSet<&str> = new.iter().map(|f| f.path.as_str()).collect();

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for field in new {
        match old_by_path.get(field.path.as_str()) {
            None => added.push(field.clone()),
            Some(before) if before.shape() != field.shape() => modified.push(FieldChange {
                path: field.path.clone(),
                before: before.shape(),
                after: field.shape(),
            }),
            Some(_) => {}
        }
    }
    let removed: Vec<FieldDescriptor> = old
        .iter()
        .filter(|f| !new_paths.contains(f.path.as_str()))
        .cloned()
        .collect();

    let rename_hints = rename_hints(&removed, &added, rename_similarity);
    let mut diff = SchemaDiff {
        added,
        removed,
        modified,
        rename_hints,
        migration_notes: String::new(),
    };
    diff.migration_notes = migration_notes(&diff);
    diff
}

/// The diff stored with a source's first version.
pub fn initial_diff(field_count: usize) -> SchemaDiff {
    SchemaDiff {
        migration_notes: format!("Initial schema with {} fields", field_count),
        ..SchemaDiff::default()
    }
}

/// Pair each removed field with the most similar unused added field of the
/// same type, if the similarity reaches `threshold`.
pub fn rename_hints(
    removed: &[FieldDescriptor],
    added: &[FieldDescriptor],
    threshold: f64,
) -> Vec<RenameHint> {
    let mut used = vec![false; added.len()];
    let mut hints = Vec::new();
    for old in removed {
        let mut best: Option<(usize, f64)> = None;
        for (i, new) in added.iter().enumerate() {
            if used[i] || new.field_type != old.field_type {
                continue;
            }
            let score = field_similarity(&old.path, &new.path);
            if score >= threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        if let Some((i, similarity)) = best {
            used[i] = true;
            hints.push(RenameHint {
                from: old.path.clone(),
                to: added[i].path.clone(),
                similarity,
            });
        }
    }
    hints
}

/// Name similarity in `[0, 1]`, case-insensitive.
///
/// Exact match scores 1.0 and containment (`price` in `price_usd`) 0.8.
/// Otherwise names sharing a `_`-separated token score the token Jaccard
/// index, and names sharing none score the character Jaccard index.
pub fn field_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.8;
    }
    let a_tokens: HashSet<&str> = a.split('_').collect();
    let b_tokens: HashSet<&str> = b.split('_').collect();
    if a_tokens.intersection(&b_tokens).next().is_some() {
        return jaccard(&a_tokens, &b_tokens);
    }
    let a_chars: HashSet<char> = a.chars().collect();
    let b_chars: HashSet<char> = b.chars().collect();
    jaccard(&a_chars, &b_chars)
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Deterministic one-line summary of a diff.
pub fn migration_notes(diff: &SchemaDiff) -> String {
    if diff.is_empty() {
        return "No schema changes".to_string();
    }
    let mut notes = Vec::new();
    for f in &diff.added {
        notes.push(format!("Added {} as {}", f.path, f.field_type));
    }
    for f in &diff.removed {
        notes.push(format!("Removed {}", f.path));
    }
    for change in &diff.modified {
        if change.before.field_type != change.after.field_type {
            notes.push(format!(
                "{} changed from {} to {}",
                change.path, change.before.field_type, change.after.field_type
            ));
        }
        if change.before.nullable != change.after.nullable {
            let became = if change.after.nullable {
                "nullable"
            } else {
                "required"
            };
            notes.push(format!("{} became {}", change.path, became));
        }
    }
    for hint in &diff.rename_hints {
        notes.push(format!(
            "possible rename {} -> {} ({:.2})",
            hint.from, hint.to, hint.similarity
        ));
    }
    notes.join("; ")
}

/// SHA-256 hex digest over the ordered `(path, type, nullable)` triples.
pub fn fingerprint(fields: &[FieldDescriptor]) -> String {
    let mut hasher = Sha256::new();
    for f in fields {
        hasher.update(f.path.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(f.field_type.as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(if f.nullable { b"1" } else { b"0" });
        hasher.update(b"\x1e");
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct TrackerOptions {
    /// Attempts at compare-and-append before giving up with
    /// [`EvolutionError::VersionConflict`].
    pub max_append_retries: u32,
    pub rename_similarity: f64,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            max_append_retries: DEFAULT_MAX_APPEND_RETRIES,
            rename_similarity: DEFAULT_RENAME_SIMILARITY,
        }
    }
}

/// Records inferred schemas as numbered versions in a [`SchemaStore`].
///
/// The tracker holds no state of its own; every call re-reads the store,
/// so any number of trackers may share one store.
pub struct SchemaTracker<'a, S: SchemaStore + ?Sized> {
    store: &'a S,
    opts: TrackerOptions,
}

impl<'a, S: SchemaStore + ?Sized> SchemaTracker<'a, S> {
    pub fn new(store: &'a S, opts: TrackerOptions) -> Self {
        Self { store, opts }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.opts
    }

    /// Append `inferred` as the next version of `source_id`.
    ///
    /// With a `version_hint`, the call fails with
    /// [`EvolutionError::VersionHintMismatch`] unless that is exactly the
    /// version that would be assigned.
    pub async fn record(
        &self,
        source_id: &str,
        inferred: &InferredSchema,
        version_hint: Option<u32>,
    ) -> Result<VersionedSchema, EvolutionError> {
        let attempts = self.opts.max_append_retries.max(1);
        for attempt in 1..=attempts {
            let latest = self
                .store
                .get_latest(source_id)
                .await
                .map_err(EvolutionError::StoreUnavailable)?;
            let expected_prev = latest.as_ref().map(|s| s.version);
            let next = expected_prev.map_or(1, |v| v + 1);

            if let Some(requested) = version_hint {
                if requested != next {
                    return Err(EvolutionError::VersionHintMismatch {
                        source_id: source_id.to_string(),
                        requested,
                        next,
                    });
                }
            }

            let entry = self.next_entry(source_id, latest.as_ref(), inferred);

            match self
                .store
                .append_if_latest_version(source_id, expected_prev, &entry)
                .await
                .map_err(EvolutionError::StoreUnavailable)?
            {
                AppendOutcome::Appended => {
                    tracing::info!(
                        source = source_id,
                        version = next,
                        added = entry.diff.added.len(),
                        removed = entry.diff.removed.len(),
                        modified = entry.diff.modified.len(),
                        "recorded schema version"
                    );
                    return Ok(entry);
                }
                AppendOutcome::Conflict { latest } => {
                    tracing::debug!(
                        source = source_id,
                        attempt,
                        attempted = next,
                        latest = ?latest,
                        "version conflict, retrying against new latest"
                    );
                }
            }
        }
        tracing::warn!(source = source_id, attempts, "giving up after repeated version conflicts");
        Err(EvolutionError::VersionConflict {
            source_id: source_id.to_string(),
            attempts,
        })
    }

    /// The entry [`record`](Self::record) would append right now, without
    /// appending it.
    pub async fn preview(
        &self,
        source_id: &str,
        inferred: &InferredSchema,
    ) -> Result<VersionedSchema, EvolutionError> {
        let latest = self
            .store
            .get_latest(source_id)
            .await
            .map_err(EvolutionError::StoreUnavailable)?;
        Ok(self.next_entry(source_id, latest.as_ref(), inferred))
    }

    fn next_entry(
        &self,
        source_id: &str,
        latest: Option<&Schema>,
        inferred: &InferredSchema,
    ) -> VersionedSchema {
        let (version, diff) = match latest {
            None => (1, initial_diff(inferred.fields.len())),
            Some(prev) => (
                prev.version + 1,
                diff_schemas(&prev.fields, &inferred.fields, self.opts.rename_similarity),
            ),
        };
        VersionedSchema {
            schema: build_schema(source_id, version, inferred),
            diff,
        }
    }

    /// A stored version, or [`EvolutionError::VersionNotFound`].
    pub async fn version(
        &self,
        source_id: &str,
        version: u32,
    ) -> Result<VersionedSchema, EvolutionError> {
        self.store
            .get_version(source_id, version)
            .await
            .map_err(EvolutionError::StoreUnavailable)?
            .ok_or_else(|| EvolutionError::VersionNotFound {
                source_id: source_id.to_string(),
                version,
            })
    }

    pub async fn history(
        &self,
        source_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<VersionedSchema>, EvolutionError> {
        self.store
            .get_history(source_id, limit)
            .await
            .map_err(EvolutionError::StoreUnavailable)
    }

    /// Diff between two explicitly chosen stored versions, in either order.
    pub async fn diff_versions(
        &self,
        source_id: &str,
        from: u32,
        to: u32,
    ) -> Result<SchemaDiff, EvolutionError> {
        let old = self.version(source_id, from).await?;
        let new = self.version(source_id, to).await?;
        Ok(diff_schemas(
            &old.schema.fields,
            &new.schema.fields,
            self.opts.rename_similarity,
        ))
    }
}

fn build_schema(source_id: &str, version: u32, inferred: &InferredSchema) -> Schema {
    Schema {
        schema_id: Uuid::new_v4().to_string(),
        source_id: source_id.to_string(),
        version,
        created_at: Utc::now(),
        fields: inferred.fields.clone(),
        primary_key_candidates: inferred.primary_key_candidates.clone(),
        summary: SchemaSummary {
            field_count: inferred.fields.len(),
        },
        fingerprint: fingerprint(&inferred.fields),
    }
}
