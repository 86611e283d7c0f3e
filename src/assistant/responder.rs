//! AI responder: answers a prompt as a configured assistant.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{AssistantConfig, Settings};
use crate::core::ConversationHandle;
use crate::error::Result;
use crate::providers::{create_provider, ChatMessage, Provider, ProviderError};

/// Answers prompts on behalf of an assistant.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Ask `assistant_id` about `prompt`. With a conversation state the
    /// exchange is remembered for the next call.
    async fn ask(
        &self,
        assistant_id: &str,
        prompt: &str,
        state: Option<&ConversationHandle>,
    ) -> Result<String>;
}

struct Profile {
    config: AssistantConfig,
    provider: Arc<dyn Provider>,
}

/// Responder backed by the configured providers.
pub struct AssistantResponder {
    profiles: HashMap<String, Profile>,
    max_history: usize,
    timeout: Duration,
}

impl AssistantResponder {
    /// All assistants share `provider`.
    pub fn new(
        provider: Arc<dyn Provider>,
        assistants: HashMap<String, AssistantConfig>,
        max_history: usize,
        timeout: Duration,
    ) -> Self {
        let profiles = assistants
            .into_iter()
            .map(|(id, config)| {
                (
                    id,
                    Profile {
                        config,
                        provider: Arc::clone(&provider),
                    },
                )
            })
            .collect();

        Self {
            profiles,
            max_history,
            timeout,
        }
    }

    /// Assistants use their own provider when set, the global one otherwise.
    pub fn from_settings(settings: &Settings) -> Self {
        let default_provider = crate::providers::get_current_provider(settings);
        let profiles = settings
            .assistants
            .iter()
            .map(|(id, config)| {
                let provider = match config.provider.as_deref() {
                    Some(name) if name != settings.models.provider => {
                        create_provider(name, settings)
                    }
                    _ => Arc::clone(&default_provider),
                };
                (
                    id.clone(),
                    Profile {
                        config: config.clone(),
                        provider,
                    },
                )
            })
            .collect();

        Self {
            profiles,
            max_history: settings.conversation.max_history,
            timeout: Duration::from_secs(settings.models.timeout_seconds),
        }
    }
}

#[async_trait]
impl Responder for AssistantResponder {
    async fn ask(
        &self,
        assistant_id: &str,
        prompt: &str,
        state: Option<&ConversationHandle>,
    ) -> Result<String> {
        let profile = self
            .profiles
            .get(assistant_id)
            .ok_or_else(|| ProviderError::AssistantNotFound(assistant_id.to_string()))?;

        let mut messages = Vec::new();
        if !profile.config.instructions.trim().is_empty() {
            messages.push(ChatMessage::system(profile.config.instructions.clone()));
        }
        if let Some(state) = state {
            messages.extend(state.history());
        }
        messages.push(ChatMessage::user(prompt));

        tracing::debug!(
            assistant = %assistant_id,
            provider = %profile.provider.name(),
            messages = messages.len(),
            "asking assistant"
        );

        let answer = tokio::time::timeout(
            self.timeout,
            profile
                .provider
                .complete(&messages, profile.config.model.as_deref()),
        )
        .await
        .map_err(|_| ProviderError::Timeout(self.timeout.as_secs()))??;

        if let Some(state) = state {
            state.record_exchange(prompt, &answer, self.max_history);
        }

        Ok(answer)
    }
}
