//! AI Providers module.

use std::sync::Arc;

pub mod ollama;
pub mod openai;
pub mod provider;

pub use provider::{ChatMessage, Provider, ProviderError, Result, Role};

use crate::config::Settings;

/// Provider factory.
pub fn create_provider(name: &str, settings: &Settings) -> Arc<dyn Provider> {
    match name {
        "ollama" => {
            let cfg = &settings.models.ollama;
            let mut provider = ollama::OllamaProvider::new();
            if let Some(url) = &cfg.base_url {
                provider = provider.with_base_url(url.clone());
            }
            if let Some(model) = &cfg.model {
                provider = provider.with_model(model.clone());
            }
            Arc::new(provider)
        }
        "openai" => Arc::new(openai_from_settings(settings)),
        other => {
            tracing::warn!("Unknown provider '{}', falling back to openai", other);
            Arc::new(openai_from_settings(settings))
        }
    }
}

fn openai_from_settings(settings: &Settings) -> openai::OpenAiProvider {
    let cfg = &settings.models.openai;
    let mut provider = openai::OpenAiProvider::new();
    if let Some(key) = &cfg.api_key {
        provider = provider.with_api_key(key.clone());
    }
    if let Some(url) = &cfg.base_url {
        provider = provider.with_base_url(url.clone());
    }
    if let Some(model) = &cfg.model {
        provider = provider.with_model(model.clone());
    }
    provider
}

/// Get the current provider from settings.
pub fn get_current_provider(settings: &Settings) -> Arc<dyn Provider> {
    create_provider(&settings.models.provider, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_names() {
        let settings = Settings::default();
        assert_eq!(create_provider("ollama", &settings).name(), "ollama");
        assert_eq!(create_provider("openai", &settings).name(), "openai");
        assert_eq!(create_provider("mystery", &settings).name(), "openai");
    }

    #[test]
    fn test_configured_model_is_default() {
        let mut settings = Settings::default();
        settings.models.ollama.model = Some("qwen2.5".to_string());
        let provider = create_provider("ollama", &settings);
        assert_eq!(provider.default_model(), Some("qwen2.5"));
    }
}
