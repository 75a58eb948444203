//! Embedding client for generating vector representations
//!
//! Supports OpenAI and Ollama embedding APIs. Anthropic offers no
//! embeddings endpoint, so the embedding provider is configured separately
//! from the generation provider.

use async_trait::async_trait;
use mpa_core::{
    AgentError, ConfigError, EmbeddingClient, EmbeddingConfig, EmbeddingProvider, LlmConfig,
    Result,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536, // text-embedding-3-small, text-embedding-ada-002
        };

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(embedding: &EmbeddingConfig, llm: &LlmConfig) -> Result<Self> {
        let api_key = llm.openai_api_key.as_ref().ok_or_else(|| {
            ConfigError::MissingRequired("OPENAI_API_KEY (embeddings)".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: llm.openai_base_url.trim_end_matches('/').to_string(),
            ..Self::new(api_key.clone(), embedding.model.clone())
        })
    }

    /// Set custom base URL (for compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::embedding("openai", "No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OpenAiEmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AgentError::embedding("openai", "Embedding request failed").with_source(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::embedding(
                "openai",
                format!("OpenAI embedding error ({status}): {error_text}"),
            ));
        }

        let result: OpenAiEmbeddingResponse = response.json().await.map_err(|e| {
            AgentError::embedding("openai", "Failed to parse embedding response").with_source(e)
        })?;

        if result.data.len() != texts.len() {
            return Err(AgentError::embedding(
                "openai",
                format!(
                    "Expected {} embeddings, received {}",
                    texts.len(),
                    result.data.len()
                ),
            ));
        }

        // Sort by index and extract embeddings
        let mut embeddings = result.data;
        embeddings.sort_by_key(|e| e.index);

        tracing::debug!(
            count = embeddings.len(),
            model = %self.model,
            "OpenAI embeddings received"
        );
        Ok(embeddings.into_iter().map(|e| e.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768, // nomic-embed-text and most others
        };

        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(embedding: &EmbeddingConfig, llm: &LlmConfig) -> Self {
        Self::new(llm.ollama_url.clone(), embedding.model.clone())
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AgentError::embedding("ollama", "Ollama embedding request failed").with_source(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::embedding(
                "ollama",
                format!("Ollama embedding error ({status}): {error_text}"),
            ));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            AgentError::embedding("ollama", "Failed to parse embedding response").with_source(e)
        })?;

        if result.embedding.is_empty() {
            return Err(AgentError::embedding(
                "ollama",
                format!("Model {} returned an empty embedding", self.model),
            ));
        }

        Ok(result.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama doesn't have native batch embedding, so we process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create the designated embedding client from config
pub fn create_embedding_client(
    embedding: &EmbeddingConfig,
    llm: &LlmConfig,
) -> Result<Box<dyn EmbeddingClient>> {
    match embedding.provider {
        EmbeddingProvider::OpenAI => Ok(Box::new(OpenAiEmbedding::from_config(embedding, llm)?)),
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbedding::from_config(embedding, llm))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_dimension() {
        let client = OpenAiEmbedding::new("test-key", "text-embedding-3-small");
        assert_eq!(client.dimension(), 1536);

        let client = OpenAiEmbedding::new("test-key", "text-embedding-3-large");
        assert_eq!(client.dimension(), 3072);
    }

    #[test]
    fn test_ollama_dimension() {
        let client = OllamaEmbedding::new("http://localhost:11434/", "nomic-embed-text");
        assert_eq!(client.dimension(), 768);
        assert_eq!(client.base_url, "http://localhost:11434");

        let client = OllamaEmbedding::new("http://localhost:11434", "mxbai-embed-large");
        assert_eq!(client.dimension(), 1024);
    }

    #[test]
    fn test_openai_requires_key() {
        let embedding = EmbeddingConfig::default();
        let llm = LlmConfig::default();

        let err = create_embedding_client(&embedding, &llm).err().unwrap();
        assert_eq!(err.collaborator(), "configuration");
    }

    #[test]
    fn test_embedding_provider_independent_of_generation() {
        let embedding = EmbeddingConfig {
            provider: EmbeddingProvider::Ollama,
            model: "all-minilm".to_string(),
        };
        let llm = LlmConfig {
            provider: mpa_core::LlmProvider::Anthropic,
            ..LlmConfig::default()
        };

        let client = create_embedding_client(&embedding, &llm).unwrap();
        assert_eq!(client.dimension(), 384);
    }
}
