//! Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for local development. The resulting [`AppConfig`]
//! is built once at startup and handed to each component constructor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Generation provider configuration
    pub llm: LlmConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Embedding index configuration
    pub index: IndexConfig,

    /// RAG pipeline configuration
    pub rag: RagConfig,

    /// Resume scoring configuration
    pub ats: AtsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // LLM
        if let Some(provider) = env_var("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(key) = env_var("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(url) = env_var("OPENAI_BASE_URL") {
            self.llm.openai_base_url = url;
        }
        if let Some(key) = env_var("ANTHROPIC_API_KEY") {
            self.llm.anthropic_api_key = Some(key);
        }
        if let Some(url) = env_var("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }
        if let Some(model) = env_var("LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(model) = env_var("VISION_MODEL") {
            self.llm.vision_model = Some(model);
        }
        if let Some(temperature) = env_var("LLM_TEMPERATURE") {
            self.llm.temperature = parse_value("LLM_TEMPERATURE", &temperature)?;
        }

        // Embeddings
        if let Some(provider) = env_var("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(model) = env_var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        // Index
        if let Some(backend) = env_var("INDEX_BACKEND") {
            self.index.backend = backend.parse()?;
        }
        if let Some(path) = env_var("VECTOR_DB_PATH") {
            self.index.path = PathBuf::from(path);
        }
        if let Some(url) = env_var("QDRANT_URL") {
            self.index.qdrant_url = url;
        }
        if let Some(collection) = env_var("DEFAULT_COLLECTION") {
            self.index.default_collection = collection;
        }

        // ATS
        if let Some(path) = env_var("ATS_VOCABULARY_PATH") {
            self.ats.vocabulary_path = Some(PathBuf::from(path));
        }

        // Logging
        if let Some(level) = env_var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = env_var("LOG_JSON") {
            self.logging.json_format = parse_value("LOG_JSON", &json)?;
        }

        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider that serves text and vision completions
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for compatible APIs)
    pub openai_base_url: String,

    /// Anthropic API key
    pub anthropic_api_key: Option<String>,

    /// Anthropic API base URL
    pub anthropic_base_url: String,

    /// Ollama server URL
    pub ollama_url: String,

    /// Text model; provider default when unset
    pub model: Option<String>,

    /// Vision model; provider default when unset
    pub vision_model: Option<String>,

    /// Maximum tokens for text completion
    pub max_tokens: u32,

    /// Maximum tokens for vision completion
    pub vision_max_tokens: u32,

    /// Default temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            anthropic_api_key: None,
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            model: None,
            vision_model: None,
            max_tokens: 2048,
            vision_max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Text model for the configured provider
    pub fn text_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Vision model for the configured provider
    pub fn vision_model(&self) -> String {
        self.vision_model
            .clone()
            .unwrap_or_else(|| self.provider.default_vision_model().to_string())
    }
}

/// Supported generation providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
    Ollama,
}

impl LlmProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-sonnet-latest",
            Self::Ollama => "llama3.1",
        }
    }

    pub fn default_vision_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-4o",
            Self::Anthropic => "claude-3-5-sonnet-latest",
            Self::Ollama => "llava",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Embedding provider configuration.
///
/// Embeddings are always produced by this provider, whichever provider
/// serves generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,

    /// Embedding model name
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            model: "text-embedding-3-small".to_string(),
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAI,
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Embedding index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,

    /// Snapshot file of the local index
    pub path: PathBuf,

    /// Qdrant gRPC URL
    pub qdrant_url: String,

    /// Collection used when the caller names none
    pub default_collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Local,
            path: PathBuf::from("./data/vector_db/index.json"),
            qdrant_url: "http://localhost:6334".to_string(),
            default_collection: "personal_agent".to_string(),
        }
    }
}

/// Supported index backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Local,
    Qdrant,
}

impl std::str::FromStr for IndexBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(ConfigError::InvalidValue {
                key: "INDEX_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// RAG pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Records retrieved per query unless the caller overrides it
    pub max_context_docs: usize,

    /// Maximum context block length (characters)
    pub max_context_length: usize,

    /// Chunk size for document ingestion (characters)
    pub chunk_size: usize,

    /// Chunk overlap (characters)
    pub chunk_overlap: usize,

    /// Maximum number of cached query embeddings
    pub embedding_cache_capacity: u64,

    /// Time-to-live of cached embeddings (seconds)
    pub embedding_cache_ttl_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_context_docs: 5,
            max_context_length: 8000,
            chunk_size: 1000,
            chunk_overlap: 200,
            embedding_cache_capacity: 10_000,
            embedding_cache_ttl_secs: 3600,
        }
    }
}

/// Resume scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AtsConfig {
    /// Domain vocabulary file (one term per line); built-in list when unset
    pub vocabulary_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
