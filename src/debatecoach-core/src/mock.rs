//! Scripted completion service for tests and offline runs.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::completion::{ChatMessage, CompletionError, CompletionService};

/// Replays queued replies in order and records every conversation it is sent.
///
/// Once the script runs out, the fallback reply is returned (if any),
/// otherwise a request error.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, CompletionError>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    latency: Duration,
}

impl ScriptedCompletion {
    pub fn new(script: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// A service that always answers with `reply`.
    pub fn constant(reply: &str) -> Self {
        Self::new(Vec::new()).with_fallback(reply)
    }

    pub fn with_fallback(mut self, reply: &str) -> Self {
        self.fallback = Some(reply.to_string());
        self
    }

    /// Delay every reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Conversations received so far, oldest first.
    pub async fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().await.clone()
    }

    /// Number of conversations received so far.
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, conversation: &[ChatMessage]) -> Result<String, CompletionError> {
        self.calls.lock().await.push(conversation.to_vec());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.script.lock().await.pop_front() {
            Some(reply) => reply,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| CompletionError::Request("script exhausted".to_string())),
        }
    }
}
