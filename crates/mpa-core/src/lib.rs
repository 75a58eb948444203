//! MPA Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the workspace:
//! - Document records stored in the embedding index
//! - Query results with provenance
//! - Chat messages and image payloads for generative backends
//! - Common error types
//! - Collaborator traits (embedder, index, generative backend)
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, AtsConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, IndexBackend,
    IndexConfig, LlmConfig, LlmProvider, LoggingConfig, RagConfig,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Boxed error used to carry the original cause of a collaborator failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Kind of generative backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    /// Credentials were rejected by the provider
    Authentication,
    /// Provider throttled the request
    RateLimited,
    /// Provider rejected the request payload
    MalformedInput,
    /// Provider answered without usable text
    EmptyResponse,
    /// Transport failure or any other provider-side error
    Upstream,
}

impl std::fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication failed"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::MalformedInput => write!(f, "malformed input"),
            Self::EmptyResponse => write!(f, "empty response"),
            Self::Upstream => write!(f, "upstream failure"),
        }
    }
}

/// Core error types, one variant per collaborator
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        provider: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Retrieval error ({backend}): {message}")]
    Retrieval { backend: String, message: String },

    #[error("Generation error ({provider}, {kind}): {message}")]
    Generation {
        provider: String,
        kind: GenerationErrorKind,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error reading {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    /// Embedding failure without an underlying error value
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Embedding {
            provider: provider.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Index failure
    pub fn retrieval(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Retrieval {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Generation failure without an underlying error value
    pub fn generation(
        provider: impl Into<String>,
        kind: GenerationErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Generation {
            provider: provider.into(),
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the original cause to an embedding or generation error.
    ///
    /// Other variants are returned unchanged.
    pub fn with_source(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        match &mut self {
            Self::Embedding { source, .. } | Self::Generation { source, .. } => {
                *source = Some(Box::new(cause));
            }
            _ => {}
        }
        self
    }

    /// Name of the collaborator that failed, for user-facing messages
    pub fn collaborator(&self) -> &'static str {
        match self {
            Self::Embedding { .. } => "embedding",
            Self::Retrieval { .. } => "retrieval",
            Self::Generation { .. } => "generation",
            Self::Config(_) => "configuration",
            Self::Extraction(_) | Self::Io { .. } => "extraction",
            Self::Validation(_) => "validation",
            Self::Other(_) => "internal",
        }
    }

    /// Generation error kind, if this is a generation failure
    pub fn generation_kind(&self) -> Option<GenerationErrorKind> {
        match self {
            Self::Generation { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<ConfigError> for AgentError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

// ============================================================================
// Document Records
// ============================================================================

/// A record stored in a collection of the embedding index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Identifier, unique within its collection
    pub id: String,

    /// Original text
    pub text: String,

    /// Embedding vector
    pub embedding: Vec<f32>,

    /// Free-form string metadata (source path, chunk index, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl DocumentRecord {
    /// Create a record without metadata
    pub fn new(id: impl Into<String>, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            embedding,
            metadata: BTreeMap::new(),
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Identifier used when citing this record in a prompt.
    ///
    /// Prefers the `source` metadata entry and falls back to the record id.
    pub fn source_label(&self) -> &str {
        self.metadata
            .get("source")
            .map(String::as_str)
            .unwrap_or(&self.id)
    }
}

/// A record returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: DocumentRecord,

    /// Cosine similarity to the query vector (higher is better)
    pub score: f32,
}

/// Summary of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: usize,

    /// Vector dimension, unknown for empty collections
    pub dimension: Option<usize>,
}

// ============================================================================
// Query Types
// ============================================================================

/// Answer produced by the query engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Generated answer
    pub answer: String,

    /// Records that were placed in the context block, in ranked order
    pub sources: Vec<DocumentRecord>,

    /// Call metadata
    pub metadata: QueryMetadata,
}

/// Metadata attached to a query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// Model that generated the answer
    pub model: String,

    /// Number of records in the context block
    pub context_doc_count: usize,
}

// ============================================================================
// Generation Types
// ============================================================================

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Raw image handed to a vision-capable backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,

    /// MIME type, e.g. `image/png`
    pub media_type: String,
}

impl ImageInput {
    /// Create from raw bytes
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    /// Read an image file, inferring the media type from its extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| AgentError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::new(bytes, media_type_for(path)))
    }
}

/// Map an image file extension to a MIME type (JPEG when unknown)
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for embedding generation
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;
}

/// Trait for embedding index backends
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records (matched by id) in a collection.
    ///
    /// The collection is created on first use.
    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> Result<()>;

    /// Top-`limit` records by descending cosine similarity.
    ///
    /// A missing collection yields an empty result.
    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>>;

    /// Describe a collection (count 0 when it does not exist)
    async fn info(&self, collection: &str) -> Result<CollectionInfo>;

    /// Drop a collection and all its records
    async fn delete_collection(&self, collection: &str) -> Result<()>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Trait for generative text and vision backends
#[async_trait::async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Complete a chat conversation
    async fn complete_text(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;

    /// Complete a chat conversation whose last user turn carries an image
    async fn complete_vision(
        &self,
        messages: &[ChatMessage],
        image: &ImageInput,
        temperature: f32,
    ) -> Result<String>;

    /// Model used for text completions
    fn model(&self) -> &str;

    /// Provider name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
