//! MPA RAG - Retrieval-Augmented Query Engine
//!
//! Answers natural-language questions by retrieving the most similar records
//! from an embedding index, assembling them into a bounded context block and
//! delegating to a generative backend. Image questions take a separate,
//! retrieval-free vision path.

use mpa_core::{
    AgentError, ChatMessage, CollectionInfo, DocumentRecord, EmbeddingClient,
    GenerationErrorKind, GenerativeBackend, ImageInput, QueryMetadata, QueryResult, RagConfig,
    Result, VectorIndex,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub mod chunking;
pub mod llm;
pub mod prompt;

pub use chunking::chunk_text;
pub use llm::{classify_status, create_llm_client, AnthropicClient, OllamaClient, OpenAiClient};
pub use prompt::{
    assemble_context, ContextBlock, PromptBuilder, CONTEXT_DELIMITER, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_VISION_PROMPT,
};

/// Default number of records retrieved per query
pub const DEFAULT_MAX_CONTEXT_DOCS: usize = 5;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

// ============================================================================
// Requests
// ============================================================================

/// A question for the query engine
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub question: String,

    /// Collection to retrieve from; `None` or empty means no retrieval
    pub collection: Option<String>,

    pub max_context_docs: usize,
    pub temperature: f32,
    pub system_prompt: Option<String>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            collection: None,
            max_context_docs: DEFAULT_MAX_CONTEXT_DOCS,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: None,
        }
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn max_context_docs(mut self, max: usize) -> Self {
        self.max_context_docs = max;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    fn retrieval_collection(&self) -> Option<&str> {
        self.collection
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// A text to add to the knowledge base
#[derive(Debug, Clone, Default)]
pub struct KnowledgeDocument {
    /// Explicit id; derived from the text when absent
    pub id: Option<String>,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl KnowledgeDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Record id: the explicit id, else a UUID v5 of the text
    pub fn record_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| Uuid::new_v5(&Uuid::NAMESPACE_OID, self.text.as_bytes()).to_string())
    }
}

// ============================================================================
// Query Engine
// ============================================================================

/// Retrieval-augmented query engine
pub struct RagEngine {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    backend: Arc<dyn GenerativeBackend>,
    config: RagConfig,
}

impl RagEngine {
    /// Create a new engine
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        backend: Arc<dyn GenerativeBackend>,
        config: RagConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            backend,
            config,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Answer a question, optionally grounded in a collection
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let start_time = Instant::now();

        if request.question.trim().is_empty() {
            return Err(AgentError::Validation("Question must not be empty".to_string()));
        }

        tracing::info!(
            collection = request.collection.as_deref().unwrap_or("-"),
            max_context_docs = request.max_context_docs,
            "RAG query started"
        );

        // 1. Retrieve
        let retrieved = match request.retrieval_collection() {
            Some(collection) if request.max_context_docs > 0 => {
                let query_vector = self.embedder.embed(&request.question).await?;
                let hits = self
                    .index
                    .search(collection, &query_vector, request.max_context_docs)
                    .await?;
                tracing::debug!(collection, hits = hits.len(), "Retrieval completed");
                hits.into_iter().map(|hit| hit.record).collect()
            }
            _ => Vec::new(),
        };

        // 2. Assemble context
        let context = assemble_context(retrieved, self.config.max_context_length);
        if context.truncated {
            tracing::debug!(
                kept = context.sources.len(),
                budget = self.config.max_context_length,
                "Context truncated to budget"
            );
        }

        // 3. Generate
        let messages = PromptBuilder::new()
            .system(
                request
                    .system_prompt
                    .as_deref()
                    .unwrap_or(DEFAULT_SYSTEM_PROMPT),
            )
            .context(context.text)
            .question(&request.question)
            .build();

        let answer = self
            .backend
            .complete_text(&messages, request.temperature)
            .await?;
        let answer = ensure_answer(self.backend.as_ref(), answer)?;

        tracing::info!(
            sources = context.sources.len(),
            answer_chars = answer.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "RAG query completed"
        );

        Ok(QueryResult {
            answer,
            metadata: QueryMetadata {
                model: self.backend.model().to_string(),
                context_doc_count: context.sources.len(),
            },
            sources: context.sources,
        })
    }

    /// Ask a question about an image. Never touches the embedder or the index.
    pub async fn vision_query(
        &self,
        question: &str,
        image: &ImageInput,
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<String> {
        vision_query(
            self.backend.as_ref(),
            question,
            image,
            system_prompt,
            temperature,
        )
        .await
    }

    /// Embed and upsert documents into a collection, returning their ids
    pub async fn add_knowledge(
        &self,
        collection: &str,
        documents: &[KnowledgeDocument],
    ) -> Result<Vec<String>> {
        add_knowledge(
            self.embedder.as_ref(),
            self.index.as_ref(),
            collection,
            documents,
        )
        .await
    }

    /// Describe a collection
    pub async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        self.index.info(collection).await
    }

    /// Drop a collection
    pub async fn delete_collection(&self, collection: &str) -> Result<()> {
        tracing::info!(collection, "Deleting collection");
        self.index.delete_collection(collection).await
    }
}

// ============================================================================
// Ingestion
// ============================================================================

/// Embed `documents` in one batch and upsert them into `collection`.
///
/// Needs only an embedder and an index. Returns the record ids in input order.
pub async fn add_knowledge(
    embedder: &dyn EmbeddingClient,
    index: &dyn VectorIndex,
    collection: &str,
    documents: &[KnowledgeDocument],
) -> Result<Vec<String>> {
    if collection.trim().is_empty() {
        return Err(AgentError::Validation(
            "Collection name must not be empty".to_string(),
        ));
    }
    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != documents.len() {
        return Err(AgentError::embedding(
            "batch",
            format!(
                "Expected {} embeddings, received {}",
                documents.len(),
                embeddings.len()
            ),
        ));
    }

    let records: Vec<DocumentRecord> = documents
        .iter()
        .zip(embeddings)
        .map(|(doc, embedding)| DocumentRecord {
            id: doc.record_id(),
            text: doc.text.clone(),
            embedding,
            metadata: doc.metadata.clone(),
        })
        .collect();

    index.upsert(collection, &records).await?;
    tracing::info!(collection, count = records.len(), "Knowledge added");

    Ok(records.into_iter().map(|r| r.id).collect())
}

// ============================================================================
// Vision Path
// ============================================================================

/// Ask `backend` a question about an image.
///
/// Needs only a generative backend: no embedder, no index. Messages are the
/// system prompt (default vision prompt when `None`) and the user question.
pub async fn vision_query(
    backend: &dyn GenerativeBackend,
    question: &str,
    image: &ImageInput,
    system_prompt: Option<&str>,
    temperature: f32,
) -> Result<String> {
    tracing::info!(
        media_type = %image.media_type,
        bytes = image.bytes.len(),
        "Vision query started"
    );

    let messages = vec![
        ChatMessage::system(system_prompt.unwrap_or(DEFAULT_VISION_PROMPT)),
        ChatMessage::user(question),
    ];

    let answer = backend.complete_vision(&messages, image, temperature).await?;
    ensure_answer(backend, answer)
}

fn ensure_answer(backend: &dyn GenerativeBackend, answer: String) -> Result<String> {
    if answer.trim().is_empty() {
        return Err(AgentError::generation(
            backend.name(),
            GenerationErrorKind::EmptyResponse,
            "Backend returned a blank answer",
        ));
    }
    Ok(answer)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = QueryRequest::new("What now?");
        assert_eq!(request.max_context_docs, 5);
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
        assert!(request.collection.is_none());
        assert!(request.system_prompt.is_none());
    }

    #[test]
    fn test_blank_collection_means_no_retrieval() {
        assert_eq!(QueryRequest::new("q").collection("  ").retrieval_collection(), None);
        assert_eq!(
            QueryRequest::new("q").collection("manuals").retrieval_collection(),
            Some("manuals")
        );
    }

    #[test]
    fn test_knowledge_ids_are_deterministic() {
        let a = KnowledgeDocument::new("Check the coolant level.");
        let b = KnowledgeDocument::new("Check the coolant level.");
        let c = KnowledgeDocument::new("Check the oil level.");

        assert_eq!(a.record_id(), b.record_id());
        assert_ne!(a.record_id(), c.record_id());
        assert_eq!(a.clone().with_id("custom").record_id(), "custom");
    }
}
