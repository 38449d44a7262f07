//! # Taskweave Providers
//!
//! HTTP completion backends for the taskweave kernel, and the glue that turns
//! a [`KernelConfig`] into [`KernelServices`].

#![warn(missing_docs)]

// Re-export core types for convenience
pub use taskweave_core::ai::{ChatRequest, Message, Provider, StreamingChoice, StreamingResponse};
pub use taskweave_core::error::{Error, Result};

#[cfg(feature = "openai")]
use taskweave_core::config::{KernelConfig, ServiceConfig};
#[cfg(feature = "openai")]
use taskweave_core::kernel::KernelServices;

pub mod mock;
pub mod utils;

#[cfg(feature = "openai")]
pub mod openai;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Connection pool idle timeout
    pub pool_idle_timeout_secs: u64,
    /// Max idle connections per host
    pub pool_max_idle_per_host: usize,
    /// Longest silence tolerated between two streamed chunks
    pub stream_idle_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
            stream_idle_timeout_secs: 30,
        }
    }
}

impl HttpConfig {
    /// Build a reqwest client
    pub fn build_client(&self) -> Result<reqwest::Client> {
        use std::time::Duration;

        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(self.pool_idle_timeout_secs))
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .build()
            .map_err(|e| Error::Internal(e.to_string()))
    }
}

/// Build the kernel's backends from validated settings.
///
/// Text completion is required. Chat and semantic memory are only wired up
/// when their sections are present.
#[cfg(feature = "openai")]
pub fn build_services(config: &KernelConfig, http: &HttpConfig) -> Result<KernelServices> {
    use std::sync::Arc;

    use openai::{OpenAI, OpenAIEmbeddings};
    use taskweave_core::ai::ProviderBackend;
    use taskweave_core::memory::SemanticMemory;
    use tracing::info;

    config.validate()?;
    let text_service = config
        .text_completion
        .as_ref()
        .ok_or_else(|| Error::Config("text_completion is not configured".to_string()))?;

    let backend = |service: &ServiceConfig| -> Result<Arc<ProviderBackend<OpenAI>>> {
        let provider = Arc::new(OpenAI::from_service(service, http)?);
        info!(provider = provider.name(), model = %service.model, "Completion service configured");
        Ok(Arc::new(ProviderBackend::new(provider, service.model.clone())))
    };

    let mut services = KernelServices::text_only(backend(text_service)?);
    if let Some(service) = &config.chat_completion {
        services.chat = Some(backend(service)?);
    }
    if let Some(service) = &config.text_embedding {
        let client = Arc::new(OpenAI::from_service(service, http)?);
        let embeddings = OpenAIEmbeddings::new(client, service.model.clone());
        info!(model = %service.model, "Semantic memory configured");
        services.memory = Some(Arc::new(SemanticMemory::new(Arc::new(embeddings))));
    }
    Ok(services)
}

#[cfg(all(test, feature = "openai"))]
mod tests {
    use super::*;
    use taskweave_core::config::ServiceKind;

    fn service(kind: ServiceKind, endpoint: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            kind,
            endpoint: endpoint.map(str::to_string),
            api_key: Some("test-key".to_string()),
            model: "gpt-4o-mini".to_string(),
            api_version: None,
        }
    }

    #[test]
    fn test_build_services_text_only() {
        let config = KernelConfig {
            text_completion: Some(service(ServiceKind::OpenAi, None)),
            ..KernelConfig::default()
        };
        let services = build_services(&config, &HttpConfig::default()).expect("services");
        assert!(services.chat.is_none());
        assert!(services.memory.is_none());
    }

    #[test]
    fn test_build_services_with_chat_and_memory() {
        let azure = service(ServiceKind::AzureOpenAi, Some("https://contoso.openai.azure.com"));
        let config = KernelConfig {
            text_completion: Some(azure.clone()),
            chat_completion: Some(azure.clone()),
            text_embedding: Some(azure),
            ..KernelConfig::default()
        };
        let services = build_services(&config, &HttpConfig::default()).expect("services");
        assert!(services.chat.is_some());
        assert!(services.memory.is_some());
    }

    #[test]
    fn test_build_services_rejects_missing_text() {
        let err = build_services(&KernelConfig::default(), &HttpConfig::default()).err();
        assert!(matches!(err, Some(Error::Config(_))));
    }
}
