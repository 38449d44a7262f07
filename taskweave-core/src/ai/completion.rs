//! Narrow completion capabilities consumed by skills, the planner and chat
//!
//! [`TextCompletion`] and [`ChatCompletion`] are the only backend contracts
//! the core depends on. [`ProviderBackend`] adapts any [`Provider`] to both.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::message::Message;
use crate::ai::provider::{ChatRequest, Provider};
use crate::ai::streaming::StreamingResponse;
use crate::error::Result;

/// Sampling options for a single completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionOptions {
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Nucleus sampling
    pub top_p: Option<f64>,
    /// Generation limit
    pub max_tokens: Option<u64>,
    /// Stop sequences
    pub stop_sequences: Vec<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.0),
            top_p: None,
            max_tokens: Some(256),
            stop_sequences: Vec::new(),
        }
    }
}

impl CompletionOptions {
    /// Set the temperature
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens
    pub fn max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Prompt in, text out
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Stream the completion of `prompt`
    async fn complete_stream(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<StreamingResponse>;

    /// Complete `prompt` and return the full text
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        self.complete_stream(prompt, options).await?.collect_text().await
    }
}

/// Ordered history in, assistant content out
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Stream the assistant reply to `history`
    async fn send_message_stream(
        &self,
        history: &[Message],
        options: &CompletionOptions,
    ) -> Result<StreamingResponse>;

    /// Return the full assistant reply to `history`
    async fn send_message(&self, history: &[Message], options: &CompletionOptions) -> Result<String> {
        self.send_message_stream(history, options).await?.collect_text().await
    }
}

#[async_trait]
impl<T: TextCompletion + ?Sized> TextCompletion for Arc<T> {
    async fn complete_stream(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<StreamingResponse> {
        (**self).complete_stream(prompt, options).await
    }
}

#[async_trait]
impl<T: ChatCompletion + ?Sized> ChatCompletion for Arc<T> {
    async fn send_message_stream(
        &self,
        history: &[Message],
        options: &CompletionOptions,
    ) -> Result<StreamingResponse> {
        (**self).send_message_stream(history, options).await
    }
}

/// Binds a provider to one model and exposes it as text and chat completion
pub struct ProviderBackend<P: Provider + ?Sized> {
    provider: Arc<P>,
    model: String,
    system_prompt: Option<String>,
}

impl<P: Provider + ?Sized> ProviderBackend<P> {
    /// Create a backend for `model`
    pub fn new(provider: Arc<P>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: None,
        }
    }

    /// Send a system prompt with every request
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Model this backend is bound to
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, messages: Vec<Message>, options: &CompletionOptions) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            messages,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stop: options.stop_sequences.clone(),
        }
    }
}

#[async_trait]
impl<P: Provider + ?Sized> TextCompletion for ProviderBackend<P> {
    async fn complete_stream(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<StreamingResponse> {
        debug!(provider = self.provider.name(), model = %self.model, "text completion request");
        let request = self.request(vec![Message::user(prompt)], options);
        self.provider.stream_completion(request).await
    }
}

#[async_trait]
impl<P: Provider + ?Sized> ChatCompletion for ProviderBackend<P> {
    async fn send_message_stream(
        &self,
        history: &[Message],
        options: &CompletionOptions,
    ) -> Result<StreamingResponse> {
        debug!(
            provider = self.provider.name(),
            model = %self.model,
            message_count = history.len(),
            "chat completion request"
        );
        let request = self.request(history.to_vec(), options);
        self.provider.stream_completion(request).await
    }
}
