//! In-memory [`SchemaStore`] implementation for testing and WASM targets.
//!
//! Each source's history sits behind its own `Mutex`; the outer map is only
//! locked long enough to look up or create that entry, so writers for
//! different sources never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Schema, VersionedSchema};

use super::{AppendOutcome, SchemaStore, SourceSummary};

type History = Arc<Mutex<Vec<VersionedSchema>>>;

/// In-memory schema history store.
pub struct InMemorySchemaStore {
    sources: RwLock<HashMap<String, History>>,
}

impl InMemorySchemaStore {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
        }
    }

    fn history(&self, source_id: &str) -> Result<Option<History>> {
        let sources = self.sources.read().map_err(|_| poisoned())?;
        Ok(sources.get(source_id).cloned())
    }

    fn history_or_create(&self, source_id: &str) -> Result<History> {
        if let Some(existing) = self.history(source_id)? {
            return Ok(existing);
        }
        let mut sources = self.sources.write().map_err(|_| poisoned())?;
        Ok(sources
            .entry(source_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone())
    }
}

impl Default for InMemorySchemaStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("schema store lock poisoned")
}

#[async_trait]
impl SchemaStore for InMemorySchemaStore {
    async fn get_latest(&self, source_id: &str) -> Result<Option<Schema>> {
        let Some(history) = self.history(source_id)? else {
            return Ok(None);
        };
        let entries = history.lock().map_err(|_| poisoned())?;
        Ok(entries.last().map(|e| e.schema.clone()))
    }

    async fn append_if_latest_version(
        &self,
        source_id: &str,
        expected_prev: Option<u32>,
        entry: &VersionedSchema,
    ) -> Result<AppendOutcome> {
        let history = self.history_or_create(source_id)?;
        let mut entries = history.lock().map_err(|_| poisoned())?;
        let latest = entries.last().map(|e| e.schema.version);
        if latest != expected_prev {
            return Ok(AppendOutcome::Conflict { latest });
        }
        let expected_next = latest.map(|v| v + 1).unwrap_or(1);
        if entry.schema.version != expected_next {
            anyhow::bail!(
                "refusing to append version {} to '{}': next version is {}",
                entry.schema.version,
                source_id,
                expected_next
            );
        }
        entries.push(entry.clone());
        Ok(AppendOutcome::Appended)
    }

    async fn get_history(
        &self,
        source_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<VersionedSchema>> {
        let Some(history) = self.history(source_id)? else {
            return Ok(Vec::new());
        };
        let entries = history.lock().map_err(|_| poisoned())?;
        let skip = match limit {
            Some(n) => entries.len().saturating_sub(n),
            None => 0,
        };
        Ok(entries[skip..].to_vec())
    }

    async fn get_version(
        &self,
        source_id: &str,
        version: u32,
    ) -> Result<Option<VersionedSchema>> {
        let Some(history) = self.history(source_id)? else {
            return Ok(None);
        };
        let entries = history.lock().map_err(|_| poisoned())?;
        Ok(entries
            .iter()
            .find(|e| e.schema.version == version)
            .cloned())
    }

    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let histories: Vec<History> = {
            let sources = self.sources.read().map_err(|_| poisoned())?;
            sources.values().cloned().collect()
        };
        let mut out = Vec::new();
        for history in histories {
            let entries = history.lock().map_err(|_| poisoned())?;
            if let Some(last) = entries.last() {
                out.push(SourceSummary {
                    source_id: last.schema.source_id.clone(),
                    latest_version: last.schema.version,
                    updated_at: last.schema.created_at,
                    field_count: last.schema.summary.field_count,
                });
            }
        }
        out.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SchemaDiff, SchemaSummary};

    fn entry(source: &str, version: u32) -> VersionedSchema {
        VersionedSchema {
            schema: Schema {
                schema_id: format!("{}-{}", source, version),
                source_id: source.to_string(),
                version,
                created_at: chrono::Utc::now(),
                fields: Vec::new(),
                primary_key_candidates: Vec::new(),
                summary: SchemaSummary { field_count: 0 },
                fingerprint: String::new(),
            },
            diff: SchemaDiff::default(),
        }
    }

    #[tokio::test]
    async fn append_requires_expected_latest() {
        let store = InMemorySchemaStore::new();
        assert_eq!(
            store.append_if_latest_version("s", None, &entry("s", 1)).await.unwrap(),
            AppendOutcome::Appended
        );
        // Stale writer still believes there is no history.
        assert_eq!(
            store.append_if_latest_version("s", None, &entry("s", 1)).await.unwrap(),
            AppendOutcome::Conflict { latest: Some(1) }
        );
        assert_eq!(
            store.append_if_latest_version("s", Some(1), &entry("s", 2)).await.unwrap(),
            AppendOutcome::Appended
        );
        assert_eq!(store.get_latest("s").await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn append_rejects_version_gap() {
        let store = InMemorySchemaStore::new();
        assert!(store
            .append_if_latest_version("s", None, &entry("s", 3))
            .await
            .is_err());
        assert!(store.get_latest("s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_limit_keeps_most_recent_in_order() {
        let store = InMemorySchemaStore::new();
        let mut prev = None;
        for v in 1..=5 {
            store
                .append_if_latest_version("s", prev, &entry("s", v))
                .await
                .unwrap();
            prev = Some(v);
        }
        let versions: Vec<u32> = store
            .get_history("s", Some(2))
            .await
            .unwrap()
            .iter()
            .map(|e| e.schema.version)
            .collect();
        assert_eq!(versions, vec![4, 5]);
        assert_eq!(store.get_history("s", None).await.unwrap().len(), 5);
        assert!(store.get_history("missing", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sources_are_listed_in_order() {
        let store = InMemorySchemaStore::new();
        store.append_if_latest_version("b", None, &entry("b", 1)).await.unwrap();
        store.append_if_latest_version("a", None, &entry("a", 1)).await.unwrap();
        let ids: Vec<String> = store
            .list_sources()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.source_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
