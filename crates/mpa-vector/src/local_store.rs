//! Local embedding index persisted to a JSON snapshot
//!
//! Collections are kept in memory as insertion-ordered record lists behind a
//! `tokio::sync::RwLock`. Every mutation rewrites the snapshot file (temp
//! file + rename) while the write lock is held, and is rolled back in memory
//! when that write fails, so the on-disk state and concurrent readers both
//! see whole upserts only.

use async_trait::async_trait;
use mpa_core::{AgentError, CollectionInfo, DocumentRecord, Result, ScoredRecord, VectorIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::cosine_similarity;

const BACKEND: &str = "local";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    collections: BTreeMap<String, Vec<DocumentRecord>>,
}

/// Embedding index stored in process memory with optional file persistence
#[derive(Debug, Default)]
pub struct LocalVectorIndex {
    path: Option<PathBuf>,
    state: RwLock<Snapshot>,
}

impl LocalVectorIndex {
    /// Create an index that lives only in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or create) an index persisted at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AgentError::retrieval(
                    BACKEND,
                    format!("Corrupted index snapshot {}: {e}", path.display()),
                )
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => {
                return Err(AgentError::retrieval(
                    BACKEND,
                    format!("Failed to read index snapshot {}: {e}", path.display()),
                ))
            }
        };

        tracing::info!(
            path = %path.display(),
            collections = snapshot.collections.len(),
            "Local index opened"
        );

        Ok(Self {
            path: Some(path),
            state: RwLock::new(snapshot),
        })
    }

    /// Snapshot file, if persisted
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec(snapshot).map_err(|e| {
            AgentError::retrieval(BACKEND, format!("Failed to encode snapshot: {e}"))
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AgentError::retrieval(
                    BACKEND,
                    format!("Failed to create {}: {e}", parent.display()),
                )
            })?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(|e| {
            AgentError::retrieval(BACKEND, format!("Failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            AgentError::retrieval(BACKEND, format!("Failed to replace {}: {e}", path.display()))
        })?;

        Ok(())
    }
}

fn collection_dimension(records: &[DocumentRecord]) -> Option<usize> {
    records.first().map(|r| r.embedding.len())
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;
        let existing = state.collections.get(collection);

        // Validate the whole batch before touching the collection
        let expected = existing
            .and_then(|r| collection_dimension(r))
            .unwrap_or(records[0].embedding.len());
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != expected) {
            return Err(AgentError::retrieval(
                BACKEND,
                format!(
                    "Record '{}' has dimension {}, collection '{collection}' expects {expected}",
                    bad.id,
                    bad.embedding.len()
                ),
            ));
        }

        let mut entries = existing.cloned().unwrap_or_default();
        for record in records {
            match entries.iter_mut().find(|r| r.id == record.id) {
                // Overwrite in place so the original insertion position is kept
                Some(slot) => *slot = record.clone(),
                None => entries.push(record.clone()),
            }
        }
        let count = entries.len();

        // The write lock is held throughout, so readers never see the swapped-in
        // collection unless the snapshot write succeeds
        let previous = state.collections.insert(collection.to_string(), entries);
        if let Err(err) = self.persist(&state).await {
            match previous {
                Some(records) => state.collections.insert(collection.to_string(), records),
                None => state.collections.remove(collection),
            };
            return Err(err);
        }

        tracing::debug!(collection, upserted = records.len(), count, "Local index upsert");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let state = self.state.read().await;
        let Some(records) = state.collections.get(collection) else {
            tracing::debug!(collection, "Search on missing collection");
            return Ok(Vec::new());
        };

        if let Some(dimension) = collection_dimension(records) {
            if dimension != query_vector.len() {
                return Err(AgentError::retrieval(
                    BACKEND,
                    format!(
                        "Query dimension {} does not match collection '{collection}' dimension {dimension}",
                        query_vector.len()
                    ),
                ));
            }
        }

        let mut scored: Vec<ScoredRecord> = records
            .iter()
            .map(|record| ScoredRecord {
                score: cosine_similarity(&record.embedding, query_vector),
                record: record.clone(),
            })
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn info(&self, collection: &str) -> Result<CollectionInfo> {
        let state = self.state.read().await;
        let records = state.collections.get(collection);

        Ok(CollectionInfo {
            name: collection.to_string(),
            count: records.map_or(0, Vec::len),
            dimension: records.and_then(|r| collection_dimension(r)),
        })
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(removed) = state.collections.remove(collection) else {
            return Ok(());
        };

        if let Err(err) = self.persist(&state).await {
            state.collections.insert(collection.to_string(), removed);
            return Err(err);
        }

        tracing::info!(collection, "Local collection deleted");
        Ok(())
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
