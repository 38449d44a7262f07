//! Mock provider for testing

use async_trait::async_trait;
use parking_lot::Mutex;
use taskweave_core::ai::MockStreamBuilder;

use crate::{ChatRequest, Provider, Result, StreamingResponse};

/// Streams a fixed response and records every request it receives
pub struct MockProvider {
    response: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    /// Create a new mock provider with predefined response
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far, oldest first
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream_completion(&self, request: ChatRequest) -> Result<StreamingResponse> {
        self.requests.lock().push(request);
        // ten character chunks, like a real stream
        Ok(MockStreamBuilder::new()
            .chunked(&self.response, 10)
            .done()
            .build())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taskweave_core::ai::{ChatCompletion, CompletionOptions, Message, ProviderBackend, Role, TextCompletion};

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockProvider::new("Hello, world!");
        let stream = provider
            .stream_completion(ChatRequest {
                model: "test".to_string(),
                messages: vec![Message::user("Hi")],
                ..ChatRequest::default()
            })
            .await
            .expect("should succeed");

        let text = stream.collect_text().await.expect("collect should succeed");
        assert_eq!(text, "Hello, world!");
    }

    #[tokio::test]
    async fn test_backend_maps_options_onto_request() {
        let provider = Arc::new(MockProvider::new("64"));
        let backend = ProviderBackend::new(provider.clone(), "gpt-test").with_system_prompt("Be terse");

        let options = CompletionOptions::default().max_tokens(8);
        assert_eq!(backend.complete("(8)^2=", &options).await.expect("complete"), "64");
        backend
            .send_message(&[Message::user("again")], &options)
            .await
            .expect("chat");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].model, "gpt-test");
        assert_eq!(requests[0].system_prompt.as_deref(), Some("Be terse"));
        assert_eq!(requests[0].max_tokens, Some(8));
        assert_eq!(requests[0].messages[0].role, Role::User);
        assert_eq!(requests[0].messages[0].content, "(8)^2=");
        assert_eq!(requests[1].messages[0].content, "again");
    }
}
