use crate::llm_provider::*;
use crate::openai_compatible_provider::{OpenAICompatibleConfig, OpenAICompatibleProvider};
use anyhow::{anyhow, Result};
use bloomgen_core::config_manager::LLMConfig;
use std::sync::Arc;
use tracing::info;

const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const LOCAL_DEFAULT_MODEL: &str = "local-model";

/// Factory for creating LLM providers based on configuration
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration
    pub fn create_from_config(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let provider_name = config.provider.to_lowercase();

        let provider_config = match provider_name.as_str() {
            "gemini" => Self::gemini_config(config)?,
            "openai" => Self::openai_config(config)?,
            "ollama" => Self::with_overrides(
                OpenAICompatibleConfig::ollama(Self::model_or(config, LOCAL_DEFAULT_MODEL)),
                config,
            ),
            "lmstudio" => Self::with_overrides(
                OpenAICompatibleConfig::lm_studio(Self::model_or(config, LOCAL_DEFAULT_MODEL)),
                config,
            ),
            "openai-compatible" => Self::openai_compatible_config(config)?,
            _ => {
                return Err(anyhow!(
                    "Unsupported LLM provider: {}. Available providers: {}",
                    provider_name,
                    Self::supported_providers().join(", ")
                ))
            }
        };

        info!(
            "Using LLM provider {} with model {} at {}",
            provider_config.provider_name, provider_config.model, provider_config.base_url
        );

        Ok(Arc::new(OpenAICompatibleProvider::new(provider_config)?))
    }

    /// Get list of supported providers
    pub fn supported_providers() -> Vec<&'static str> {
        vec!["gemini", "openai", "ollama", "lmstudio", "openai-compatible"]
    }

    fn gemini_config(config: &LLMConfig) -> Result<OpenAICompatibleConfig> {
        let api_key = Self::required_key(config, "GEMINI_API_KEY")?;
        Ok(Self::with_overrides(
            OpenAICompatibleConfig::gemini(Self::model_or(config, GEMINI_DEFAULT_MODEL), api_key),
            config,
        ))
    }

    fn openai_config(config: &LLMConfig) -> Result<OpenAICompatibleConfig> {
        let api_key = Self::required_key(config, "BLOOMGEN_LLM_API_KEY")?;
        let mut provider_config = OpenAICompatibleConfig::custom(
            OPENAI_BASE_URL.to_string(),
            Self::model_or(config, OPENAI_DEFAULT_MODEL),
            "openai".to_string(),
        );
        provider_config.api_key = Some(api_key);
        Ok(Self::with_overrides(provider_config, config))
    }

    fn openai_compatible_config(config: &LLMConfig) -> Result<OpenAICompatibleConfig> {
        let base_url = config
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                anyhow!("openai-compatible provider requires llm.base_url (BLOOMGEN_LLM_BASE_URL)")
            })?;
        Ok(Self::with_overrides(
            OpenAICompatibleConfig::custom(
                base_url,
                Self::model_or(config, LOCAL_DEFAULT_MODEL),
                "openai-compatible".to_string(),
            ),
            config,
        ))
    }

    /// Apply the base URL, API key and timeout from configuration on top of a preset
    fn with_overrides(
        mut provider_config: OpenAICompatibleConfig,
        config: &LLMConfig,
    ) -> OpenAICompatibleConfig {
        if let Some(base_url) = config.base_url.as_ref().filter(|u| !u.trim().is_empty()) {
            provider_config.base_url = base_url.clone();
        }
        if provider_config.api_key.is_none() {
            provider_config.api_key = config.api_key.clone().filter(|k| !k.is_empty());
        }
        provider_config.timeout_secs = config.timeout_secs;
        provider_config
    }

    fn model_or(config: &LLMConfig, default: &str) -> String {
        config
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn required_key(config: &LLMConfig, env_name: &str) -> Result<String> {
        config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "{} provider requires an API key (set {} or llm.api_key)",
                    config.provider,
                    env_name
                )
            })
    }
}
