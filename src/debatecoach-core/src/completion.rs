//! Completion service contract and the OpenAI-compatible adapter.
//!
//! Everything in the crate talks to the language model through
//! [`CompletionService`]: an ordered, role-tagged conversation goes in and one
//! reply (or a [`CompletionError`]) comes out.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CompletionConfig;

/// Failures reported by a completion service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("no reply within {limit:?}")]
    Timeout { limit: Duration },

    #[error("empty reply")]
    EmptyReply,
}

/// Role of a message in a completion conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single role-tagged message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// Generates one reply for a whole conversation.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate the next assistant message for `conversation`.
    async fn complete(&self, conversation: &[ChatMessage]) -> Result<String, CompletionError>;

    /// Single-prompt convenience wrapper.
    async fn ask(&self, prompt: &str) -> Result<String, CompletionError> {
        self.complete(&[ChatMessage::user(prompt)]).await
    }
}

/// Call `service` with an upper time bound.
///
/// The reply is trimmed; a blank reply counts as a failure so that callers
/// never record an empty turn.
pub async fn complete_within(
    service: &dyn CompletionService,
    conversation: &[ChatMessage],
    limit: Duration,
) -> Result<String, CompletionError> {
    debug!(messages = conversation.len(), "requesting completion");

    let reply = tokio::time::timeout(limit, service.complete(conversation))
        .await
        .map_err(|_| CompletionError::Timeout { limit })??;

    let reply = reply.trim();
    if reply.is_empty() {
        return Err(CompletionError::EmptyReply);
    }
    Ok(reply.to_string())
}

/// [`complete_within`] for a single user prompt.
pub async fn ask_within(
    service: &dyn CompletionService,
    prompt: &str,
    limit: Duration,
) -> Result<String, CompletionError> {
    complete_within(service, &[ChatMessage::user(prompt)], limit).await
}

/// Pause before retry number `retry` (1-based): 1s, 2s, 4s, ...
pub(crate) fn retry_backoff(retry: u32) -> Duration {
    Duration::from_secs(1 << retry.saturating_sub(1).min(6))
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiCompletion {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        config: &CompletionConfig,
    ) -> Result<Self, CompletionError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.attempt_timeout())
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CompletionError::Request(format!("Failed to create HTTP client: {}", e)))?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(api_base.into());

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries.max(1),
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, conversation: &[ChatMessage]) -> Result<String, CompletionError> {
        let messages: Vec<ChatCompletionRequestMessage> =
            conversation.iter().map(to_request_message).collect();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .messages(messages)
            .build()
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_backoff(attempt)).await;
            }

            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    let content = response
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default();
                    return Ok(content);
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "completion request failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(CompletionError::Request(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown API error after retries".to_string()),
        ))
    }
}

fn to_request_message(message: &ChatMessage) -> ChatCompletionRequestMessage {
    let content = message.content.clone();
    match message.role {
        ChatRole::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: content.into(),
                name: None,
            })
        }
        ChatRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: content.into(),
            name: None,
        }),
        ChatRole::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(content.into()),
                name: None,
                tool_calls: None,
                refusal: None,
                audio: None,
                function_call: None,
            })
        }
    }
}
