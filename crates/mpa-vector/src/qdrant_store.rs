//! Qdrant implementation of the embedding index
//!
//! Each logical collection maps to a Qdrant collection with cosine distance,
//! created on first upsert. Record ids are arbitrary strings, so points are
//! keyed by a UUID v5 derived from the record id and the original id travels
//! in the payload.

use async_trait::async_trait;
use mpa_core::{
    AgentError, CollectionInfo, DocumentRecord, IndexConfig, Result, ScoredRecord, VectorIndex,
};
use qdrant_client::qdrant::{
    vectors_config, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

const BACKEND: &str = "qdrant";

/// Qdrant-backed embedding index
pub struct QdrantIndex {
    client: Qdrant,
}

impl QdrantIndex {
    /// Connect to the Qdrant server named in the config
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.qdrant_url)
            .build()
            .map_err(|e| AgentError::retrieval(BACKEND, format!("Qdrant connection failed: {e}")))?;

        tracing::info!(url = %config.qdrant_url, "Qdrant index configured");
        Ok(Self { client })
    }

    async fn exists(&self, collection: &str) -> Result<bool> {
        let collections = self.client.list_collections().await.map_err(|e| {
            AgentError::retrieval(BACKEND, format!("Failed to list collections: {e}"))
        })?;

        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == collection))
    }

    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        if self.exists(collection).await? {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| {
                AgentError::retrieval(BACKEND, format!("Failed to create collection: {e}"))
            })?;

        tracing::info!(collection, dimension, "Qdrant collection created");
        Ok(())
    }
}

/// Stable point id for a record id
fn point_id(record_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

fn to_payload(record: &DocumentRecord) -> HashMap<String, Value> {
    let metadata_json = serde_json::to_string(&record.metadata).unwrap_or_default();

    HashMap::from([
        ("id".to_string(), Value::from(record.id.clone())),
        ("text".to_string(), Value::from(record.text.clone())),
        ("metadata_json".to_string(), Value::from(metadata_json)),
    ])
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        self.ensure_collection(collection, first.embedding.len())
            .await?;

        let points: Vec<PointStruct> = records
            .iter()
            .map(|record| {
                PointStruct::new(
                    point_id(&record.id),
                    record.embedding.clone(),
                    to_payload(record),
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| AgentError::retrieval(BACKEND, format!("Failed to upsert points: {e}")))?;

        tracing::debug!(collection, upserted = records.len(), "Qdrant upsert");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        if limit == 0 || !self.exists(collection).await? {
            return Ok(Vec::new());
        }

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, query_vector.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| AgentError::retrieval(BACKEND, format!("Vector search failed: {e}")))?;

        let records = results
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let metadata: BTreeMap<String, String> = payload_str(&payload, "metadata_json")
                    .and_then(|json| serde_json::from_str(&json).ok())
                    .unwrap_or_default();

                ScoredRecord {
                    record: DocumentRecord {
                        id: payload_str(&payload, "id").unwrap_or_default(),
                        text: payload_str(&payload, "text").unwrap_or_default(),
                        // Vectors are not fetched back from the server
                        embedding: Vec::new(),
                        metadata,
                    },
                    score: point.score,
                }
            })
            .collect();

        Ok(records)
    }

    async fn info(&self, collection: &str) -> Result<CollectionInfo> {
        if !self.exists(collection).await? {
            return Ok(CollectionInfo {
                name: collection.to_string(),
                count: 0,
                dimension: None,
            });
        }

        let response = self.client.collection_info(collection).await.map_err(|e| {
            AgentError::retrieval(BACKEND, format!("Failed to read collection info: {e}"))
        })?;
        let info = response.result;

        let count = info
            .as_ref()
            .and_then(|i| i.points_count)
            .unwrap_or_default() as usize;
        let dimension = info
            .and_then(|i| i.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|config| match config {
                vectors_config::Config::Params(params) => Some(params.size as usize),
                vectors_config::Config::ParamsMap(_) => None,
            });

        Ok(CollectionInfo {
            name: collection.to_string(),
            count,
            dimension,
        })
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        if !self.exists(collection).await? {
            return Ok(());
        }

        self.client
            .delete_collection(collection)
            .await
            .map_err(|e| {
                AgentError::retrieval(BACKEND, format!("Failed to delete collection: {e}"))
            })?;

        tracing::info!(collection, "Qdrant collection deleted");
        Ok(())
    }

    fn name(&self) -> &str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable() {
        assert_eq!(point_id("manual.pdf#0"), point_id("manual.pdf#0"));
        assert_ne!(point_id("manual.pdf#0"), point_id("manual.pdf#1"));
        assert!(Uuid::parse_str(&point_id("anything")).is_ok());
    }

    #[test]
    fn test_payload_roundtrip_fields() {
        let record = DocumentRecord::new("r1", "check tire pressure", vec![0.1])
            .with_metadata("source", "manual.pdf");
        let payload = to_payload(&record);

        assert_eq!(payload_str(&payload, "id").as_deref(), Some("r1"));
        assert_eq!(
            payload_str(&payload, "text").as_deref(),
            Some("check tire pressure")
        );

        let metadata: BTreeMap<String, String> =
            serde_json::from_str(&payload_str(&payload, "metadata_json").unwrap()).unwrap();
        assert_eq!(metadata.get("source").map(String::as_str), Some("manual.pdf"));
    }
}
