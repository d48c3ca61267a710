//! services/api/src/adapters/generation.rs
//!
//! Chat-completion backend for the `TextGenerationService` port. Any
//! OpenAI-compatible endpoint works; by default it talks to Gemini's
//! compatibility layer. One adapter is built per API key.
//!
//! Clients never retry. A rate-limited or failing key returns its error at
//! once so `KeyRotationDispatcher` can move on to the next key.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use coursegen_core::ports::{PortError, PortResult, TextGenerationService};
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a course author. Follow the requested output format exactly.";

pub struct OpenAiCompatGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompatGenerationAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Builds a client for one key against `api_base`.
    pub fn for_key(api_key: &str, api_base: &str, model: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        let client = Client::with_config(config).with_backoff(no_retry());
        Self::new(client, model.to_string())
    }
}

/// A policy whose first `next_backoff` already gives up.
fn no_retry() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

#[async_trait]
impl TextGenerationService for OpenAiCompatGenerationAdapter {
    async fn generate(&self, prompt_parts: &[String]) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt_parts.join("\n"))
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(messages)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::Unexpected("No content generated".to_string()))?;

        debug!("Generation returned {} characters", text.len());
        Ok(text)
    }
}
