//! Provider selection from configuration.

use crate::openai_compat::OpenAiCompatProvider;
use ronnyx_config::AppConfig;
use ronnyx_core::error::ProviderError;
use ronnyx_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured provider.
///
/// Every supported backend speaks the OpenAI chat-completions protocol; the
/// provider name only selects the default base URL. Hosted providers need an
/// API key, local ones (ollama, vllm, llama.cpp) do not.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let llm = &config.llm;
    let name = llm.provider.as_str();

    let api_key = match (&llm.api_key, is_local(name)) {
        (Some(key), _) => key.clone(),
        (None, true) => name.to_string(),
        (None, false) => {
            return Err(ProviderError::NotConfigured(
                "OPENAI_API_KEY is not set.".into(),
            ));
        }
    };

    let base_url = llm
        .api_url
        .clone()
        .or_else(|| default_base_url(name))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider '{name}' and no llm.api_url configured"
            ))
        })?;

    tracing::debug!(provider = %name, base_url = %base_url, "Building provider");

    let provider = OpenAiCompatProvider::new(
        name,
        base_url,
        api_key,
        Duration::from_secs(llm.timeout_secs),
    )?;
    Ok(Arc::new(provider))
}

/// Providers that run on the local machine and need no API key.
pub fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "together" => "https://api.together.xyz/v1",
        "ollama" => "http://localhost:11434/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert_eq!(
            default_base_url("openai").as_deref(),
            Some("https://api.openai.com/v1")
        );
        assert!(default_base_url("ollama").unwrap().contains("11434"));
        assert!(default_base_url("mystery").is_none());
    }

    #[test]
    fn missing_api_key_is_not_configured() {
        let config = AppConfig::default();
        let err = build_from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn openai_with_key_builds() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test".into());
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn local_provider_needs_no_key() {
        let mut config = AppConfig::default();
        config.llm.provider = "ollama".into();
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn unknown_provider_requires_url() {
        let mut config = AppConfig::default();
        config.llm.provider = "custom".into();
        config.llm.api_key = Some("k".into());
        assert!(build_from_config(&config).is_err());

        config.llm.api_url = Some("http://localhost:9999/v1".into());
        assert!(build_from_config(&config).is_ok());
    }
}
