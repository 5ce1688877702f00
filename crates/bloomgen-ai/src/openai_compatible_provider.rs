use crate::llm_provider::*;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration for OpenAI-compatible providers (Gemini, OpenAI, LM Studio, Ollama, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAICompatibleConfig {
    /// Base URL for the API (e.g., "https://generativelanguage.googleapis.com/v1beta/openai")
    pub base_url: String,
    /// Model to use
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Optional API key (some providers require it, some don't)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Provider name for display purposes
    pub provider_name: String,
}

impl Default for OpenAICompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            model: "local-model".to_string(),
            timeout_secs: 120,
            api_key: None,
            provider_name: "openai-compatible".to_string(),
        }
    }
}

impl OpenAICompatibleConfig {
    /// Create config for Gemini's OpenAI-compatible endpoint
    pub fn gemini(model: String, api_key: String) -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model,
            api_key: Some(api_key),
            provider_name: "gemini".to_string(),
            ..Default::default()
        }
    }

    /// Create config for LM Studio
    pub fn lm_studio(model: String) -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            model,
            provider_name: "lmstudio".to_string(),
            ..Default::default()
        }
    }

    /// Create config for Ollama (OpenAI-compatible endpoint)
    pub fn ollama(model: String) -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model,
            provider_name: "ollama".to_string(),
            ..Default::default()
        }
    }

    /// Create config for custom endpoint
    pub fn custom(base_url: String, model: String, provider_name: String) -> Self {
        Self {
            base_url,
            model,
            provider_name,
            ..Default::default()
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// OpenAI-compatible LLM provider speaking the Chat Completions API.
/// A request is attempted once; failures surface to the caller.
pub struct OpenAICompatibleProvider {
    config: OpenAICompatibleConfig,
    client: Client,
}

impl OpenAICompatibleProvider {
    /// Create a new OpenAI-compatible provider
    pub fn new(config: OpenAICompatibleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OpenAICompatibleConfig {
        &self.config
    }

    fn chat_request(&self, messages: &[Message], config: &GenerationConfig) -> ChatCompletionsRequest {
        ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            temperature: Some(config.temperature),
            max_tokens: config.max_tokens,
        }
    }

    async fn try_chat_completions_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<ChatCompletionsResponse> {
        let request = self.chat_request(messages, config);

        let mut request_builder = self
            .client
            .post(self.config.endpoint("chat/completions"))
            .header("Content-Type", "application/json")
            .json(&request);

        if let Some(api_key) = &self.config.api_key {
            request_builder =
                request_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request_builder.send().await.context(format!(
            "Failed to send request to {} Chat Completions API at {}",
            self.config.provider_name, self.config.base_url
        ))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(anyhow!(
                "{} API error ({}): {}",
                self.config.provider_name,
                status,
                error_text
            ));
        }

        response.json().await.context(format!(
            "Failed to parse {} Chat Completions API response",
            self.config.provider_name
        ))
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let chat_response = self.try_chat_completions_request(messages, config).await?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No choices in {} response", self.config.provider_name))?;

        let content = choice.message.content.unwrap_or_default();
        debug!(
            "{} returned {} characters (finish reason: {:?})",
            self.config.provider_name,
            content.len(),
            choice.finish_reason
        );

        Ok(LLMResponse {
            content,
            total_tokens: chat_response.usage.as_ref().map(|u| u.total_tokens),
            prompt_tokens: chat_response.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: chat_response.usage.as_ref().map(|u| u.completion_tokens),
            finish_reason: choice.finish_reason,
            model: chat_response
                .model
                .unwrap_or_else(|| self.config.model.clone()),
        })
    }

    async fn is_available(&self) -> bool {
        let mut request = self.client.get(self.config.endpoint("models"));
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        request
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// API request/response types for Chat Completions API

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}
