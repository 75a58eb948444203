//! MPA Vector - Embedding clients and embedding index backends
//!
//! Provides the embedding providers (OpenAI, Ollama), an embedding cache,
//! and two [`VectorIndex`] implementations: a local JSON-persisted index and
//! a Qdrant-backed one.

pub mod cache;
pub mod embedding;
pub mod local_store;
pub mod qdrant_store;

pub use cache::{CacheConfig, CacheStats, CachedEmbedder};
pub use embedding::{create_embedding_client, OllamaEmbedding, OpenAiEmbedding};
pub use local_store::LocalVectorIndex;
pub use qdrant_store::QdrantIndex;

use mpa_core::{IndexBackend, IndexConfig, Result, VectorIndex};

/// Cosine similarity of two vectors.
///
/// Returns 0 when the lengths differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Open the configured embedding index backend
pub async fn create_index(config: &IndexConfig) -> Result<Box<dyn VectorIndex>> {
    match config.backend {
        IndexBackend::Local => Ok(Box::new(LocalVectorIndex::open(&config.path).await?)),
        IndexBackend::Qdrant => Ok(Box::new(QdrantIndex::new(config)?)),
    }
}
