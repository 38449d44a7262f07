//! Startup configuration
//!
//! A [`KernelConfig`] is loaded once (optional JSON settings file, then
//! environment overrides) and handed by reference to whatever needs it.
//!
//! ```json
//! {
//!   "text_completion": { "kind": "azure_open_ai", "endpoint": "https://x.openai.azure.com", "model": "text" },
//!   "chat_completion": { "kind": "azure_open_ai", "endpoint": "https://x.openai.azure.com", "model": "chat" },
//!   "logging": { "level": "debug" }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::planning::{ExecutorConfig, PlannerConfig};

/// Wire protocol spoken by a configured service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// api.openai.com or any OpenAI-compatible endpoint
    #[default]
    OpenAi,
    /// Azure OpenAI deployment
    AzureOpenAi,
}

/// One backend service (text completion, chat completion or embeddings)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Protocol flavour
    #[serde(default)]
    pub kind: ServiceKind,
    /// Base URL; provider default when absent (OpenAI only)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// API key
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name, or deployment name for Azure
    #[serde(default)]
    pub model: String,
    /// Azure `api-version` query parameter
    #[serde(default)]
    pub api_version: Option<String>,
}

impl ServiceConfig {
    fn validate(&self, section: &str) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::Config(format!("{}: model/deployment name is empty", section)));
        }
        if self.kind == ServiceKind::AzureOpenAi && self.endpoint.is_none() {
            return Err(Error::Config(format!("{}: Azure services need an endpoint", section)));
        }
        if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(Error::Config(format!("{}: api_key is not set", section)));
        }
        Ok(())
    }
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rotated log files
    pub directory: String,
    /// Log file prefix
    pub filename_prefix: String,
    /// Default level filter (overridden by `RUST_LOG`)
    pub level: String,
    /// Write the log file as JSON lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            filename_prefix: "taskweave.log".to_string(),
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Service used by prompt skills and the planner
    pub text_completion: Option<ServiceConfig>,
    /// Service used by chat sessions
    pub chat_completion: Option<ServiceConfig>,
    /// Service used by semantic memory
    pub text_embedding: Option<ServiceConfig>,
    /// Plan generation settings
    pub planner: PlannerConfig,
    /// Plan execution settings
    pub executor: ExecutorConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl KernelConfig {
    /// Load from an optional JSON file, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            info!(path = %path.display(), "Loading configuration file");
            Self::from_json(&raw)?
        } else {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Self::default()
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse from a JSON document
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Config(format!("Invalid settings JSON: {}", e)))
    }

    /// Apply overrides using the given variable lookup.
    ///
    /// Endpoint and key apply to every configured service; the deployment
    /// variables create the matching service entry when it is missing.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let deployments = [
            ("OPENAI_TEXT_DEPLOYMENT", &mut self.text_completion),
            ("OPENAI_CHAT_DEPLOYMENT", &mut self.chat_completion),
            ("OPENAI_EMBEDDING_DEPLOYMENT", &mut self.text_embedding),
        ];
        for (var, slot) in deployments {
            if let Some(model) = lookup(var) {
                slot.get_or_insert_with(ServiceConfig::default).model = model;
            }
        }

        let endpoint = lookup("OPENAI_ENDPOINT");
        let api_key = lookup("OPENAI_API_KEY");
        for service in [
            &mut self.text_completion,
            &mut self.chat_completion,
            &mut self.text_embedding,
        ]
        .into_iter()
        .flatten()
        {
            if let Some(endpoint) = &endpoint {
                service.endpoint = Some(endpoint.clone());
                if endpoint.contains(".openai.azure.com") {
                    service.kind = ServiceKind::AzureOpenAi;
                }
            }
            if let Some(key) = &api_key {
                service.api_key = Some(key.clone());
            }
        }

        if let Some(level) = lookup("TASKWEAVE_LOG") {
            self.logging.level = level;
        }
    }

    /// Check that every configured service is usable.
    ///
    /// Text completion is mandatory, the others are optional.
    pub fn validate(&self) -> Result<()> {
        match &self.text_completion {
            Some(service) => service.validate("text_completion")?,
            None => return Err(Error::Config("text_completion is not configured".to_string())),
        }
        if let Some(service) = &self.chat_completion {
            service.validate("chat_completion")?;
        }
        if let Some(service) = &self.text_embedding {
            service.validate("text_embedding")?;
        }
        if self.planner.max_steps == 0 {
            return Err(Error::Config("planner.max_steps must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = KernelConfig::load("does/not/exist/settings.json").expect("load should succeed");
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = KernelConfig::from_json(
            r#"{"text_completion": {"model": "gpt-4o-mini"}, "logging": {"level": "debug"}}"#,
        )
        .expect("valid json");

        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_ENDPOINT", "https://contoso.openai.azure.com"),
            ("OPENAI_CHAT_DEPLOYMENT", "chat-deploy"),
        ]
        .into_iter()
        .collect();
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));

        let text = config.text_completion.as_ref().expect("text service");
        assert_eq!(text.api_key.as_deref(), Some("sk-test"));
        assert_eq!(text.kind, ServiceKind::AzureOpenAi);
        let chat = config.chat_completion.as_ref().expect("chat service created");
        assert_eq!(chat.model, "chat-deploy");
        assert!(config.text_embedding.is_none());
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_text_completion() {
        let config = KernelConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
