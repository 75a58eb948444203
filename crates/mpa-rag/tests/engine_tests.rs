//! Query engine tests with in-process collaborators

use async_trait::async_trait;
use mpa_core::{
    AgentError, ChatMessage, DocumentRecord, EmbeddingClient, GenerationErrorKind,
    GenerativeBackend, ImageInput, RagConfig, Result, Role, ScoredRecord, VectorIndex,
};
use mpa_rag::{KnowledgeDocument, QueryRequest, RagEngine, DEFAULT_VISION_PROMPT};
use mpa_vector::LocalVectorIndex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Test doubles
// ============================================================================

/// Embedder with a fixed text -> vector table
#[derive(Default)]
struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
    fail: bool,
}

impl TableEmbedder {
    fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingClient for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AgentError::embedding("stub", "provider unavailable"));
        }
        Ok(self.table.get(text).cloned().unwrap_or_else(|| vec![1.0, 0.0]))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::new();
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        2
    }
}

/// Index wrapper counting every call
struct CountingIndex {
    inner: LocalVectorIndex,
    calls: AtomicUsize,
    fail_search: bool,
}

impl CountingIndex {
    fn new() -> Self {
        Self {
            inner: LocalVectorIndex::in_memory(),
            calls: AtomicUsize::new(0),
            fail_search: false,
        }
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(collection, records).await
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            return Err(AgentError::retrieval("counting", "index offline"));
        }
        self.inner.search(collection, query_vector, limit).await
    }

    async fn info(&self, collection: &str) -> Result<mpa_core::CollectionInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.info(collection).await
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_collection(collection).await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Backend that records what it was sent
struct RecordingBackend {
    reply: String,
    error: Option<GenerationErrorKind>,
    text_messages: Mutex<Vec<Vec<ChatMessage>>>,
    vision_calls: AtomicUsize,
}

impl RecordingBackend {
    fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            error: None,
            text_messages: Mutex::new(Vec::new()),
            vision_calls: AtomicUsize::new(0),
        }
    }

    fn failing(kind: GenerationErrorKind) -> Self {
        Self {
            error: Some(kind),
            ..Self::replying("")
        }
    }

    fn last_user_message(&self) -> String {
        let sent = self.text_messages.lock().unwrap();
        sent.last()
            .and_then(|m| m.iter().find(|m| m.role == Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GenerativeBackend for RecordingBackend {
    async fn complete_text(&self, messages: &[ChatMessage], _temperature: f32) -> Result<String> {
        self.text_messages.lock().unwrap().push(messages.to_vec());
        match self.error {
            Some(kind) => Err(AgentError::generation("recording", kind, "stubbed failure")),
            None => Ok(self.reply.clone()),
        }
    }

    async fn complete_vision(
        &self,
        messages: &[ChatMessage],
        _image: &ImageInput,
        _temperature: f32,
    ) -> Result<String> {
        self.vision_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(messages[0].content, DEFAULT_VISION_PROMPT);
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "stub-model"
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn engine(
    embedder: Arc<TableEmbedder>,
    index: Arc<CountingIndex>,
    backend: Arc<RecordingBackend>,
) -> RagEngine {
    RagEngine::new(embedder, index, backend, RagConfig::default())
}

/// Unit vector with the given cosine similarity to [1, 0]
fn at_similarity(s: f32) -> Vec<f32> {
    vec![s, (1.0 - s * s).sqrt()]
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_retrieval_ranking_and_limit() {
    let embedder = Arc::new(TableEmbedder::default().with("Which doc?", vec![1.0, 0.0]));
    let index = Arc::new(CountingIndex::new());
    let backend = Arc::new(RecordingBackend::replying("Doc A."));

    // Inserted out of rank order
    index
        .upsert(
            "docs",
            &[
                DocumentRecord::new("C", "text C", at_similarity(0.5)),
                DocumentRecord::new("A", "text A", at_similarity(0.9)),
                DocumentRecord::new("B", "text B", at_similarity(0.7)),
            ],
        )
        .await
        .unwrap();

    let engine = engine(embedder, index, backend.clone());
    let result = engine
        .query(&QueryRequest::new("Which doc?").collection("docs").max_context_docs(2))
        .await
        .unwrap();

    let ids: Vec<_> = result.sources.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(result.metadata.context_doc_count, 2);
    assert_eq!(result.metadata.model, "stub-model");

    let user = backend.last_user_message();
    assert!(user.contains("[Source: A]\ntext A\n\n---\n\n[Source: B]\ntext B"));
    assert!(!user.contains("text C"));
    assert!(user.contains("Question: Which doc?"));
}

#[tokio::test]
async fn test_vision_path_is_retrieval_free() {
    let embedder = Arc::new(TableEmbedder::default());
    let index = Arc::new(CountingIndex::new());
    let backend = Arc::new(RecordingBackend::replying("Low tire pressure."));

    let engine = engine(embedder.clone(), index.clone(), backend.clone());
    let image = ImageInput::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg");
    let answer = engine
        .vision_query("What does this light mean?", &image, None, 0.7)
        .await
        .unwrap();

    assert_eq!(answer, "Low tire pressure.");
    assert_eq!(backend.vision_calls.load(Ordering::SeqCst), 1);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(index.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_vision_query_needs_only_a_backend() {
    let backend = RecordingBackend::replying("Check engine light: loose gas cap.");
    let image = ImageInput::new(vec![0x89, 0x50, 0x4E, 0x47], "image/png");

    let answer = mpa_rag::vision_query(&backend, "What is this?", &image, None, 0.2)
        .await
        .unwrap();

    assert_eq!(answer, "Check engine light: loose gas cap.");
    assert_eq!(backend.vision_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_collection_answers_without_sources() {
    let embedder = Arc::new(TableEmbedder::default());
    let index = Arc::new(CountingIndex::new());
    let backend = Arc::new(RecordingBackend::replying("I have no stored notes on that."));

    let engine = engine(embedder, index, backend.clone());
    let result = engine
        .query(&QueryRequest::new("What is my plan?").collection("empty"))
        .await
        .unwrap();

    assert!(result.sources.is_empty());
    assert_eq!(result.metadata.context_doc_count, 0);
    assert!(!result.answer.is_empty());
    assert!(!backend.last_user_message().contains("Context:"));
}

#[tokio::test]
async fn test_no_collection_skips_retrieval() {
    let embedder = Arc::new(TableEmbedder::default());
    let index = Arc::new(CountingIndex::new());
    let backend = Arc::new(RecordingBackend::replying("Hello."));

    let engine = engine(embedder.clone(), index.clone(), backend);
    let result = engine.query(&QueryRequest::new("Hi")).await.unwrap();

    assert!(result.sources.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(index.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_custom_system_prompt_is_sent() {
    let backend = Arc::new(RecordingBackend::replying("ok"));
    let engine = engine(
        Arc::new(TableEmbedder::default()),
        Arc::new(CountingIndex::new()),
        backend.clone(),
    );

    engine
        .query(&QueryRequest::new("Hi").system_prompt("Answer in one word."))
        .await
        .unwrap();

    let sent = backend.text_messages.lock().unwrap();
    assert_eq!(sent[0][0].role, Role::System);
    assert_eq!(sent[0][0].content, "Answer in one word.");
}

#[tokio::test]
async fn test_context_budget_limits_sources() {
    let embedder = Arc::new(TableEmbedder::default());
    let index = Arc::new(CountingIndex::new());
    let backend = Arc::new(RecordingBackend::replying("ok"));

    let long = "x".repeat(100);
    index
        .upsert(
            "docs",
            &[
                DocumentRecord::new("a", long.clone(), vec![1.0, 0.0]),
                DocumentRecord::new("b", long.clone(), vec![0.9, 0.1]),
                DocumentRecord::new("c", long, vec![0.8, 0.2]),
            ],
        )
        .await
        .unwrap();

    let config = RagConfig {
        max_context_length: 150,
        ..RagConfig::default()
    };
    let engine = RagEngine::new(embedder, index, backend.clone(), config);
    let result = engine
        .query(&QueryRequest::new("q").collection("docs"))
        .await
        .unwrap();

    let ids: Vec<_> = result.sources.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let user = backend.last_user_message();
    let context = user
        .strip_prefix("Context:\n")
        .and_then(|rest| rest.split("\n\nQuestion: ").next())
        .unwrap();
    assert_eq!(context.chars().count(), 150);
}

#[tokio::test]
async fn test_embedding_failure_is_not_masked() {
    let embedder = Arc::new(TableEmbedder {
        fail: true,
        ..TableEmbedder::default()
    });
    let backend = Arc::new(RecordingBackend::replying("unused"));
    let engine = engine(embedder, Arc::new(CountingIndex::new()), backend.clone());

    let err = engine
        .query(&QueryRequest::new("q").collection("docs"))
        .await
        .unwrap_err();

    assert_eq!(err.collaborator(), "embedding");
    assert!(backend.text_messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_retrieval_failure_is_not_masked() {
    let index = Arc::new(CountingIndex {
        fail_search: true,
        ..CountingIndex::new()
    });
    let engine = engine(
        Arc::new(TableEmbedder::default()),
        index,
        Arc::new(RecordingBackend::replying("unused")),
    );

    let err = engine
        .query(&QueryRequest::new("q").collection("docs"))
        .await
        .unwrap_err();
    assert_eq!(err.collaborator(), "retrieval");
}

#[tokio::test]
async fn test_generation_failures_keep_kind() {
    let engine = engine(
        Arc::new(TableEmbedder::default()),
        Arc::new(CountingIndex::new()),
        Arc::new(RecordingBackend::failing(GenerationErrorKind::RateLimited)),
    );

    let err = engine.query(&QueryRequest::new("q")).await.unwrap_err();
    assert_eq!(err.generation_kind(), Some(GenerationErrorKind::RateLimited));
}

#[tokio::test]
async fn test_blank_answer_is_generation_error() {
    let engine = engine(
        Arc::new(TableEmbedder::default()),
        Arc::new(CountingIndex::new()),
        Arc::new(RecordingBackend::replying("   ")),
    );

    let err = engine.query(&QueryRequest::new("q")).await.unwrap_err();
    assert_eq!(err.generation_kind(), Some(GenerationErrorKind::EmptyResponse));
}

#[tokio::test]
async fn test_blank_question_rejected() {
    let engine = engine(
        Arc::new(TableEmbedder::default()),
        Arc::new(CountingIndex::new()),
        Arc::new(RecordingBackend::replying("ok")),
    );

    let err = engine.query(&QueryRequest::new("  ")).await.unwrap_err();
    assert_eq!(err.collaborator(), "validation");
}

#[tokio::test]
async fn test_add_knowledge_then_query() {
    let embedder = Arc::new(
        TableEmbedder::default()
            .with("Jump-start: connect red to positive first.", vec![1.0, 0.0])
            .with("Tire change: loosen lug nuts first.", vec![0.0, 1.0])
            .with("How do I jump-start?", vec![0.95, 0.05]),
    );
    let index = Arc::new(CountingIndex::new());
    let backend = Arc::new(RecordingBackend::replying("Connect red to positive."));
    let engine = engine(embedder, index, backend);

    let ids = engine
        .add_knowledge(
            "car",
            &[
                KnowledgeDocument::new("Jump-start: connect red to positive first.")
                    .with_metadata("source", "battery.md"),
                KnowledgeDocument::new("Tire change: loosen lug nuts first."),
            ],
        )
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    // Re-ingesting identical text overwrites instead of duplicating
    engine
        .add_knowledge(
            "car",
            &[KnowledgeDocument::new("Tire change: loosen lug nuts first.")],
        )
        .await
        .unwrap();
    assert_eq!(engine.collection_info("car").await.unwrap().count, 2);

    let result = engine
        .query(
            &QueryRequest::new("How do I jump-start?")
                .collection("car")
                .max_context_docs(1),
        )
        .await
        .unwrap();
    assert_eq!(result.sources[0].id, ids[0]);
    assert_eq!(result.sources[0].source_label(), "battery.md");

    engine.delete_collection("car").await.unwrap();
    assert_eq!(engine.collection_info("car").await.unwrap().count, 0);
}

#[tokio::test]
async fn test_ingestion_needs_no_backend() {
    let embedder = TableEmbedder::default();
    let index = CountingIndex::new();

    let ids = mpa_rag::add_knowledge(
        &embedder,
        &index,
        "notes",
        &[KnowledgeDocument::new("Oil change every 5000 miles.").with_id("oil")],
    )
    .await
    .unwrap();

    assert_eq!(ids, vec!["oil"]);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(index.info("notes").await.unwrap().count, 1);

    let err = mpa_rag::add_knowledge(&embedder, &index, " ", &[KnowledgeDocument::new("x")])
        .await
        .unwrap_err();
    assert_eq!(err.collaborator(), "validation");
}
