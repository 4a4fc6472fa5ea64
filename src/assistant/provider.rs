//! Completion providers: `complete(system_prompt, user_text) -> text`.
//!
//! Each vendor is one small HTTP client. Keys are checked per call so an
//! unconfigured provider can still be selected and report its status.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::AssistantConfig;
use crate::error::{KconduitError, Result};

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String>;
}

// ========================================
// SELECTION
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Anthropic,
    Ollama,
}

impl ProviderKind {
    pub fn from_engine(engine: &str) -> Option<Self> {
        match engine.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "gemini" => Some(Self::Gemini),
            "anthropic" => Some(Self::Anthropic),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// Explicit engine first, then the first vendor with a key, then Ollama.
    pub fn select(config: &AssistantConfig) -> Self {
        if let Some(kind) = config.engine.as_deref().and_then(Self::from_engine) {
            return kind;
        }
        if !config.openai_key.is_empty() {
            Self::OpenAi
        } else if !config.gemini_key.is_empty() {
            Self::Gemini
        } else if !config.anthropic_key.is_empty() {
            Self::Anthropic
        } else {
            Self::Ollama
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::OpenAi => Self::Gemini,
            Self::Gemini => Self::Anthropic,
            Self::Anthropic => Self::Ollama,
            Self::Ollama => Self::OpenAi,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Gemini => "Gemini",
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
        }
    }

    pub fn env_var(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Ollama => None,
        }
    }

    fn api_key(self, config: &AssistantConfig) -> &str {
        match self {
            Self::OpenAi => &config.openai_key,
            Self::Gemini => &config.gemini_key,
            Self::Anthropic => &config.anthropic_key,
            Self::Ollama => "",
        }
    }

    /// The configured model, or the override when this kind was selected.
    pub fn model(self, config: &AssistantConfig) -> String {
        if let Some(model) = &config.model_override {
            if Self::select(config) == self {
                return model.clone();
            }
        }
        match self {
            Self::OpenAi => config.openai_model.clone(),
            Self::Gemini => config.gemini_model.clone(),
            Self::Anthropic => config.anthropic_model.clone(),
            Self::Ollama => config.ollama_model.clone(),
        }
    }

    pub fn status(self, config: &AssistantConfig) -> String {
        match self.env_var() {
            None => "Local (no API key needed)".to_string(),
            Some(_) if !self.api_key(config).is_empty() => "Configured".to_string(),
            Some(var) => format!("API key not set ({})", var),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

pub fn build_provider(kind: ProviderKind, config: &AssistantConfig) -> Result<Arc<dyn CompletionProvider>> {
    let timeout = match kind {
        ProviderKind::Ollama => config.timeout * 2,
        _ => config.timeout,
    };
    let endpoint = HttpEndpoint {
        client: http_client(timeout)?,
        api_key: kind.api_key(config).to_string(),
        model: kind.model(config),
    };

    Ok(match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider { endpoint }),
        ProviderKind::Gemini => Arc::new(GeminiProvider { endpoint }),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider { endpoint }),
        ProviderKind::Ollama => Arc::new(OllamaProvider {
            endpoint,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
        }),
    })
}

// ========================================
// HTTP PLUMBING
// ========================================

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| KconduitError::Config(format!("failed to create HTTP client: {}", e)))
}

struct HttpEndpoint {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl HttpEndpoint {
    fn require_key(&self, kind: ProviderKind) -> Result<&str> {
        if self.api_key.is_empty() {
            return Err(KconduitError::AuthenticationMissing {
                provider: kind.display_name(),
                env_var: kind.env_var().unwrap_or_default(),
            });
        }
        Ok(&self.api_key)
    }
}

async fn send_json<T: for<'de> Deserialize<'de>>(
    vendor: &str,
    request: reqwest::RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| KconduitError::ProviderUnavailable(format!("{} request failed: {}", vendor, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(KconduitError::ProviderUnavailable(format!(
            "{} API request failed with status {}: {}",
            vendor,
            status.as_u16(),
            body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| KconduitError::ProviderUnavailable(format!("unexpected {} API response format: {}", vendor, e)))
}

fn empty_response(vendor: &str) -> KconduitError {
    KconduitError::ProviderUnavailable(format!("no text in {} response", vendor))
}

// ========================================
// OPENAI
// ========================================

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

pub struct OpenAiProvider {
    endpoint: HttpEndpoint,
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn model(&self) -> &str {
        &self.endpoint.model
    }

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let key = self.endpoint.require_key(ProviderKind::OpenAi)?;
        debug!(model = %self.endpoint.model, "Querying OpenAI");

        let request = self
            .endpoint
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(key)
            .json(&json!({
                "model": self.endpoint.model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_text},
                ],
                "temperature": 0.3,
            }));

        let response: OpenAiResponse = send_json("OpenAI", request).await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| empty_response("OpenAI"))
    }
}

// ========================================
// GEMINI
// ========================================

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiProvider {
    endpoint: HttpEndpoint,
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn model(&self) -> &str {
        &self.endpoint.model
    }

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let key = self.endpoint.require_key(ProviderKind::Gemini)?;
        debug!(model = %self.endpoint.model, "Querying Gemini");

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.endpoint.model
        );
        // No system role on this endpoint
        let full_prompt = format!("{}\n\nUser: {}", system_prompt, user_text);

        let request = self
            .endpoint
            .client
            .post(url)
            .query(&[("key", key)])
            .json(&json!({
                "contents": [{"parts": [{"text": full_prompt}]}],
                "generationConfig": {"temperature": 0.3, "maxOutputTokens": 2048},
            }));

        let response: GeminiResponse = send_json("Gemini", request).await?;
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| empty_response("Gemini"))
    }
}

// ========================================
// ANTHROPIC
// ========================================

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicProvider {
    endpoint: HttpEndpoint,
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "Anthropic"
    }

    fn model(&self) -> &str {
        &self.endpoint.model
    }

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let key = self.endpoint.require_key(ProviderKind::Anthropic)?;
        debug!(model = %self.endpoint.model, "Querying Anthropic");

        let request = self
            .endpoint
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&json!({
                "model": self.endpoint.model,
                "max_tokens": 2048,
                "system": system_prompt,
                "messages": [{"role": "user", "content": user_text}],
                "temperature": 0.3,
            }));

        let response: AnthropicResponse = send_json("Anthropic", request).await?;
        response
            .content
            .into_iter()
            .next()
            .and_then(|b| b.text)
            .ok_or_else(|| empty_response("Anthropic"))
    }
}

// ========================================
// OLLAMA
// ========================================

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

pub struct OllamaProvider {
    endpoint: HttpEndpoint,
    base_url: String,
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.endpoint.model
    }

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        debug!(model = %self.endpoint.model, url = %self.base_url, "Querying Ollama");

        let request = self
            .endpoint
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&json!({
                "model": self.endpoint.model,
                "prompt": format!("{}\n\nUser: {}\n\nAssistant:", system_prompt, user_text),
                "stream": false,
            }));

        let response: OllamaResponse = send_json("Ollama", request).await.map_err(|e| match e {
            KconduitError::ProviderUnavailable(reason) if reason.contains("request failed:") => {
                KconduitError::ProviderUnavailable(format!(
                    "failed to connect to Ollama. Make sure it's running: {}",
                    reason
                ))
            }
            other => other,
        })?;
        Ok(response.response)
    }
}
