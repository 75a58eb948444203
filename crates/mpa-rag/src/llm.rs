//! Generative backend implementations
//!
//! OpenAI, Anthropic and Ollama chat APIs behind the [`GenerativeBackend`]
//! trait, each with a text and a vision (single image) path.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mpa_core::{
    AgentError, ChatMessage, ConfigError, GenerationErrorKind, GenerativeBackend, ImageInput,
    LlmConfig, LlmProvider, Result, Role,
};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Map an HTTP status from a provider to a generation error kind
pub fn classify_status(status: u16) -> GenerationErrorKind {
    match status {
        401 | 403 => GenerationErrorKind::Authentication,
        429 => GenerationErrorKind::RateLimited,
        400 | 404 | 413 | 422 => GenerationErrorKind::MalformedInput,
        _ => GenerationErrorKind::Upstream,
    }
}

fn build_http_client(config: &LlmConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {e}")))
}

/// Turn a non-success response into a typed generation error
async fn status_error(provider: &str, response: Response) -> AgentError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let kind = classify_status(status.as_u16());

    tracing::warn!(provider, %status, ?kind, "Generation request rejected");
    AgentError::generation(provider, kind, format!("{provider} error ({status}): {body}"))
}

fn transport_error(provider: &str, err: reqwest::Error) -> AgentError {
    AgentError::generation(provider, GenerationErrorKind::Upstream, "Request failed")
        .with_source(err)
}

fn non_empty(provider: &str, text: Option<String>) -> Result<String> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(AgentError::generation(
            provider,
            GenerationErrorKind::EmptyResponse,
            "No text in response",
        )),
    }
}

/// Index of the message that carries the image on the vision path
fn image_target(provider: &str, messages: &[ChatMessage]) -> Result<usize> {
    messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .ok_or_else(|| {
            AgentError::generation(
                provider,
                GenerationErrorKind::MalformedInput,
                "Vision request needs a user message",
            )
        })
}

// ============================================================================
// OpenAI Client
// ============================================================================

/// OpenAI chat completions client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    vision_model: String,
    max_tokens: u32,
    vision_max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: OpenAiContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAiContent<'a> {
    Text(&'a str),
    Parts(Vec<OpenAiPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAiPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            vision_model: model.clone(),
            model,
            max_tokens: 2048,
            vision_max_tokens: 1000,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("OPENAI_API_KEY".to_string()))?;

        Ok(Self {
            client: build_http_client(config)?,
            api_key: api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.text_model(),
            vision_model: config.vision_model(),
            max_tokens: config.max_tokens,
            vision_max_tokens: config.vision_max_tokens,
        })
    }

    /// Set custom base URL (for Azure or compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn send(&self, request: &OpenAiRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error("openai", e))?;

        if !response.status().is_success() {
            return Err(status_error("openai", response).await);
        }

        let result: OpenAiResponse = response.json().await.map_err(|e| {
            AgentError::generation(
                "openai",
                GenerationErrorKind::Upstream,
                "Failed to parse response",
            )
            .with_source(e)
        })?;

        let text = result.choices.into_iter().next().and_then(|c| c.message.content);
        non_empty("openai", text)
    }
}

#[async_trait]
impl GenerativeBackend for OpenAiClient {
    async fn complete_text(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.as_str(),
                    content: OpenAiContent::Text(&m.content),
                })
                .collect(),
            max_tokens: self.max_tokens,
            temperature,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "OpenAI completion");
        self.send(&request).await
    }

    async fn complete_vision(
        &self,
        messages: &[ChatMessage],
        image: &ImageInput,
        temperature: f32,
    ) -> Result<String> {
        let target = image_target("openai", messages)?;
        let data_url = format!(
            "data:{};base64,{}",
            image.media_type,
            BASE64.encode(&image.bytes)
        );

        let request = OpenAiRequest {
            model: &self.vision_model,
            messages: messages
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    let content = if i == target {
                        OpenAiContent::Parts(vec![
                            OpenAiPart::Text { text: &m.content },
                            OpenAiPart::ImageUrl {
                                image_url: ImageUrl {
                                    url: data_url.clone(),
                                },
                            },
                        ])
                    } else {
                        OpenAiContent::Text(&m.content)
                    };
                    OpenAiMessage {
                        role: m.role.as_str(),
                        content,
                    }
                })
                .collect(),
            max_tokens: self.vision_max_tokens,
            temperature,
        };

        tracing::debug!(
            model = %self.vision_model,
            bytes = image.bytes.len(),
            "OpenAI vision completion"
        );
        self.send(&request).await
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// Anthropic Client
// ============================================================================

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    vision_model: String,
    max_tokens: u32,
    vision_max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: AnthropicContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent<'a> {
    Text(&'a str),
    Blocks(Vec<AnthropicBlock<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            vision_model: model.clone(),
            model,
            max_tokens: 2048,
            vision_max_tokens: 1024,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .anthropic_api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("ANTHROPIC_API_KEY".to_string()))?;

        Ok(Self {
            client: build_http_client(config)?,
            api_key: api_key.clone(),
            base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
            model: config.text_model(),
            vision_model: config.vision_model(),
            max_tokens: config.max_tokens,
            vision_max_tokens: config.vision_max_tokens,
        })
    }

    /// System messages travel in a dedicated field, not in the turn list
    fn split_system(messages: &[ChatMessage]) -> Option<String> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        (!system.is_empty()).then(|| system.join("\n\n"))
    }

    async fn send(&self, request: &AnthropicRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error("anthropic", e))?;

        if !response.status().is_success() {
            return Err(status_error("anthropic", response).await);
        }

        let result: AnthropicResponse = response.json().await.map_err(|e| {
            AgentError::generation(
                "anthropic",
                GenerationErrorKind::Upstream,
                "Failed to parse response",
            )
            .with_source(e)
        })?;

        let text: String = result
            .content
            .into_iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text)
            .collect();
        non_empty("anthropic", Some(text))
    }
}

#[async_trait]
impl GenerativeBackend for AnthropicClient {
    async fn complete_text(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: Self::split_system(messages),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| AnthropicMessage {
                    role: m.role.as_str(),
                    content: AnthropicContent::Text(&m.content),
                })
                .collect(),
            temperature,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "Anthropic completion");
        self.send(&request).await
    }

    async fn complete_vision(
        &self,
        messages: &[ChatMessage],
        image: &ImageInput,
        temperature: f32,
    ) -> Result<String> {
        let target = image_target("anthropic", messages)?;
        let data = BASE64.encode(&image.bytes);

        let request = AnthropicRequest {
            model: &self.vision_model,
            max_tokens: self.vision_max_tokens,
            system: Self::split_system(messages),
            messages: messages
                .iter()
                .enumerate()
                .filter(|(_, m)| m.role != Role::System)
                .map(|(i, m)| {
                    let content = if i == target {
                        AnthropicContent::Blocks(vec![
                            AnthropicBlock::Image {
                                source: ImageSource {
                                    source_type: "base64",
                                    media_type: &image.media_type,
                                    data: data.clone(),
                                },
                            },
                            AnthropicBlock::Text { text: &m.content },
                        ])
                    } else {
                        AnthropicContent::Text(&m.content)
                    };
                    AnthropicMessage {
                        role: m.role.as_str(),
                        content,
                    }
                })
                .collect(),
            temperature,
        };

        tracing::debug!(
            model = %self.vision_model,
            bytes = image.bytes.len(),
            "Anthropic vision completion"
        );
        self.send(&request).await
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama chat API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    vision_model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            vision_model: model.clone(),
            model,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            vision_model: config.vision_model(),
            ..Self::new(config.ollama_url.clone(), config.text_model())
        })
    }

    async fn send(&self, request: &OllamaRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error("ollama", e))?;

        if !response.status().is_success() {
            return Err(status_error("ollama", response).await);
        }

        let result: OllamaResponse = response.json().await.map_err(|e| {
            AgentError::generation(
                "ollama",
                GenerationErrorKind::Upstream,
                "Failed to parse Ollama response",
            )
            .with_source(e)
        })?;

        non_empty("ollama", result.message.map(|m| m.content))
    }
}

#[async_trait]
impl GenerativeBackend for OllamaClient {
    async fn complete_text(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let request = OllamaRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                    images: Vec::new(),
                })
                .collect(),
            stream: false,
            options: OllamaOptions { temperature },
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "Ollama completion");
        self.send(&request).await
    }

    async fn complete_vision(
        &self,
        messages: &[ChatMessage],
        image: &ImageInput,
        temperature: f32,
    ) -> Result<String> {
        let target = image_target("ollama", messages)?;
        let data = BASE64.encode(&image.bytes);

        let request = OllamaRequest {
            model: &self.vision_model,
            messages: messages
                .iter()
                .enumerate()
                .map(|(i, m)| OllamaMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                    images: if i == target {
                        vec![data.clone()]
                    } else {
                        Vec::new()
                    },
                })
                .collect(),
            stream: false,
            options: OllamaOptions { temperature },
        };

        tracing::debug!(
            model = %self.vision_model,
            bytes = image.bytes.len(),
            "Ollama vision completion"
        );
        self.send(&request).await
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create the configured generative backend
pub fn create_llm_client(config: &LlmConfig) -> Result<Box<dyn GenerativeBackend>> {
    match config.provider {
        LlmProvider::OpenAI => Ok(Box::new(OpenAiClient::from_config(config)?)),
        LlmProvider::Anthropic => Ok(Box::new(AnthropicClient::from_config(config)?)),
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================
