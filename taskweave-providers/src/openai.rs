//! OpenAI and Azure OpenAI provider
//!
//! Both speak the same chat completions protocol; they differ in URL layout
//! and authentication header. Azure addresses a deployment instead of a model,
//! so the request's model name is used as the deployment name.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use taskweave_core::ai::Role;
use taskweave_core::config::{ServiceConfig, ServiceKind};
use taskweave_core::memory::Embeddings;
use tracing::{debug, warn};

use crate::utils::SseBuffer;
use crate::{ChatRequest, Error, HttpConfig, Message, Provider, Result, StreamingChoice, StreamingResponse};

/// Default OpenAI endpoint
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Azure `api-version` used when none is configured
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

/// GPT-4o
pub const GPT_4O: &str = "gpt-4o";
/// GPT-4o mini
pub const GPT_4O_MINI: &str = "gpt-4o-mini";
/// GPT-3.5 Turbo
pub const GPT_35_TURBO: &str = "gpt-3.5-turbo";
/// Small embedding model
pub const TEXT_EMBEDDING_3_SMALL: &str = "text-embedding-3-small";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Flavor {
    OpenAi,
    Azure { api_version: String },
}

/// OpenAI compatible API client
pub struct OpenAI {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    flavor: Flavor,
    idle_timeout: Duration,
}

impl OpenAI {
    /// Client for api.openai.com
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, OPENAI_BASE_URL)
    }

    /// Client using `OPENAI_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::ProviderAuth("OPENAI_API_KEY not set".to_string()))?;
        Self::new(api_key)
    }

    /// Client for an OpenAI compatible base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::build(api_key.into(), base_url.into(), Flavor::OpenAi, &HttpConfig::default())
    }

    /// Client for an Azure OpenAI resource, e.g. `https://contoso.openai.azure.com`
    pub fn azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: Option<String>,
    ) -> Result<Self> {
        let flavor = Flavor::Azure {
            api_version: api_version.unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
        };
        Self::build(api_key.into(), endpoint.into(), flavor, &HttpConfig::default())
    }

    /// Client described by a service section of the settings
    pub fn from_service(service: &ServiceConfig, http: &HttpConfig) -> Result<Self> {
        let api_key = service
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::ProviderAuth("api_key is not set".to_string()))?;

        match service.kind {
            ServiceKind::OpenAi => {
                let base_url = service
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
                Self::build(api_key, base_url, Flavor::OpenAi, http)
            }
            ServiceKind::AzureOpenAi => {
                let endpoint = service
                    .endpoint
                    .clone()
                    .ok_or_else(|| Error::Config("Azure services need an endpoint".to_string()))?;
                let flavor = Flavor::Azure {
                    api_version: service
                        .api_version
                        .clone()
                        .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
                };
                Self::build(api_key, endpoint, flavor, http)
            }
        }
    }

    fn build(api_key: String, base_url: String, flavor: Flavor, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: http.build_client()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            flavor,
            idle_timeout: Duration::from_secs(http.stream_idle_timeout_secs),
        })
    }

    /// True for Azure resources
    pub fn is_azure(&self) -> bool {
        matches!(self.flavor, Flavor::Azure { .. })
    }

    /// URL for `operation` (`chat/completions` or `embeddings`) on `model`
    fn url(&self, model: &str, operation: &str) -> String {
        match &self.flavor {
            Flavor::OpenAi => format!("{}/{}", self.base_url, operation),
            Flavor::Azure { api_version } => format!(
                "{}/openai/deployments/{}/{}?api-version={}",
                self.base_url, model, operation, api_version
            ),
        }
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match self.flavor {
            Flavor::OpenAi => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                        .map_err(|e| Error::Internal(e.to_string()))?,
                );
            }
            Flavor::Azure { .. } => {
                headers.insert(
                    HeaderName::from_static("api-key"),
                    HeaderValue::from_str(&self.api_key).map_err(|e| Error::Internal(e.to_string()))?,
                );
            }
        }
        Ok(headers)
    }

    async fn post<T: Serialize + ?Sized>(&self, url: String, body: &T) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .headers(self.build_headers()?)
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    fn convert_messages(system_prompt: Option<&str>, messages: Vec<Message>) -> Vec<WireMessage> {
        let mut result = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = system_prompt {
            result.push(WireMessage {
                role: Role::System.as_str(),
                content: prompt.to_string(),
            });
        }
        result.extend(messages.into_iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: m.content,
        }));
        result
    }
}

/// Map non-success statuses to provider errors
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let text = response.text().await.unwrap_or_default();
    warn!(status = %status, "Provider request rejected");

    Err(match status.as_u16() {
        401 | 403 => Error::ProviderAuth(format!("{}: {}", status, text)),
        429 => Error::ProviderRateLimit {
            retry_after_secs: retry_after.unwrap_or(1),
        },
        _ => Error::ProviderApi(format!("{}: {}", status, text)),
    })
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct WireRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    // reasoning models stream their thinking separately
    reasoning_content: Option<String>,
}

#[async_trait]
impl Provider for OpenAI {
    async fn stream_completion(&self, request: ChatRequest) -> Result<StreamingResponse> {
        let body = WireRequest {
            // Azure takes the deployment from the URL
            model: (!self.is_azure()).then(|| request.model.clone()),
            messages: Self::convert_messages(request.system_prompt.as_deref(), request.messages),
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
            stop: request.stop,
            stream: true,
        };

        debug!(provider = self.name(), model = %request.model, "Sending chat completion");
        let response = self
            .post(self.url(&request.model, "chat/completions"), &body)
            .await?;

        Ok(StreamingResponse::from_stream(parse_sse_stream(response.bytes_stream()))
            .with_idle_timeout(self.idle_timeout))
    }

    fn name(&self) -> &'static str {
        match self.flavor {
            Flavor::OpenAi => "openai",
            Flavor::Azure { .. } => "azure-openai",
        }
    }
}

/// Turn a chat completions byte stream into streaming choices
fn parse_sse_stream<S>(stream: S) -> impl Stream<Item = Result<StreamingChoice>>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures::stream::unfold(
        (stream, SseBuffer::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                while let Some(event) = buffer.next_event() {
                    if event.is_done() {
                        return Some((Ok(StreamingChoice::Done), (stream, buffer)));
                    }
                    match serde_json::from_str::<StreamChunk>(&event.data) {
                        Ok(chunk) => {
                            let Some(delta) = chunk.choices.into_iter().next().map(|c| c.delta) else {
                                continue;
                            };
                            let choice = match (delta.content, delta.reasoning_content) {
                                (Some(text), _) if !text.is_empty() => StreamingChoice::Message(text),
                                (_, Some(text)) if !text.is_empty() => StreamingChoice::Thought(text),
                                _ => continue,
                            };
                            return Some((Ok(choice), (stream, buffer)));
                        }
                        Err(e) => warn!("Failed to parse SSE chunk: {}", e),
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        if let Err(e) = buffer.push(&bytes) {
                            return Some((Err(e), (stream, buffer)));
                        }
                    }
                    Some(Err(e)) => return Some((Err(Error::Http(e)), (stream, buffer))),
                    None => return None,
                }
            }
        },
    )
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedding generation bound to one model or Azure deployment
pub struct OpenAIEmbeddings {
    client: Arc<OpenAI>,
    model: String,
}

impl OpenAIEmbeddings {
    /// Embeddings from `model` through `client`
    pub fn new(client: Arc<OpenAI>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embeddings for OpenAIEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            input: text,
            model: (!self.client.is_azure()).then_some(self.model.as_str()),
        };
        let response = self
            .client
            .post(self.client.url(&self.model, "embeddings"), &request)
            .await?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderApi(format!("Failed to parse embedding response: {}", e)))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::ProviderApi("No embedding returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_message_conversion() {
        let messages = vec![Message::user("Hello"), Message::assistant("Hi there!")];
        let converted = OpenAI::convert_messages(Some("Be helpful"), messages);

        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[1].role, "user");
        assert_eq!(converted[2].role, "assistant");
        assert_eq!(converted[2].content, "Hi there!");
    }

    #[test]
    fn test_openai_url() {
        let client = OpenAI::with_base_url("sk-test", "https://example.test/v1/").expect("client");
        assert_eq!(client.url(GPT_4O_MINI, "chat/completions"), "https://example.test/v1/chat/completions");
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn test_azure_url_and_header() {
        let client = OpenAI::azure("https://contoso.openai.azure.com/", "key", None).expect("client");
        assert_eq!(
            client.url("text-davinci", "chat/completions"),
            "https://contoso.openai.azure.com/openai/deployments/text-davinci/chat/completions?api-version=2024-02-01"
        );
        let headers = client.build_headers().expect("headers");
        assert_eq!(headers.get("api-key").and_then(|v| v.to_str().ok()), Some("key"));
        assert!(headers.get(AUTHORIZATION).is_none());
        assert_eq!(client.name(), "azure-openai");
    }

    #[test]
    fn test_from_service_requires_key() {
        let service = ServiceConfig {
            model: GPT_4O_MINI.to_string(),
            ..ServiceConfig::default()
        };
        let err = OpenAI::from_service(&service, &HttpConfig::default()).err();
        assert!(matches!(err, Some(Error::ProviderAuth(_))));
    }

    #[test]
    fn test_azure_request_omits_model() {
        let body = WireRequest {
            model: None,
            messages: OpenAI::convert_messages(None, vec![Message::user("4+4=")]),
            temperature: Some(0.0),
            top_p: None,
            max_tokens: Some(16),
            stop: Vec::new(),
            stream: true,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert!(json.get("model").is_none());
        assert!(json.get("stop").is_none());
        assert_eq!(json["messages"][0]["content"], "4+4=");
    }

    #[tokio::test]
    async fn test_sse_stream_parsing() {
        let chunks: Vec<std::result::Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n")),
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"8*8\"}}]}\n\n")),
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"6\"}}]}\n\ndata: {\"choi")),
            Ok(Bytes::from_static(b"ces\":[{\"delta\":{\"content\":\"4\"}}]}\n\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        ];
        let stream = parse_sse_stream(futures::stream::iter(chunks));
        let text = StreamingResponse::from_stream(stream)
            .collect_text()
            .await
            .expect("collect");
        assert_eq!(text, "64");
    }
}
