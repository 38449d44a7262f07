//! Provider trait for LLM integrations

use async_trait::async_trait;

use crate::ai::message::Message;
use crate::ai::streaming::StreamingResponse;
use crate::error::Result;

/// Request for a chat completion
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Model (or deployment) name to use
    pub model: String,
    /// Optional system prompt
    pub system_prompt: Option<String>,
    /// Conversation history
    pub messages: Vec<Message>,
    /// Optional temperature setting
    pub temperature: Option<f64>,
    /// Optional nucleus sampling setting
    pub top_p: Option<f64>,
    /// Optional max tokens
    pub max_tokens: Option<u64>,
    /// Stop sequences
    pub stop: Vec<String>,
}

/// Trait for LLM providers
///
/// Implement this trait to add support for a new LLM provider. Everything
/// above this layer talks to [`TextCompletion`](crate::ai::completion::TextCompletion)
/// and [`ChatCompletion`](crate::ai::completion::ChatCompletion) instead.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stream a completion request
    async fn stream_completion(&self, request: ChatRequest) -> Result<StreamingResponse>;

    /// Get provider name (for logging/debugging)
    fn name(&self) -> &'static str;
}
