//! Error types for the taskweave framework

use thiserror::Error;

/// Result type alias using taskweave's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the taskweave framework
#[derive(Debug, Error)]
pub enum Error {
    // ============ Registry Errors ============
    /// A skill with the same namespace and name is already registered
    #[error("Duplicate skill: {namespace}.{name} is already registered")]
    DuplicateSkill {
        /// Namespace of the rejected skill
        namespace: String,
        /// Name of the rejected skill
        name: String,
    },

    /// Lookup of a skill that is not in the registry
    #[error("Skill not found: {namespace}.{name}")]
    SkillNotFound {
        /// Requested namespace
        namespace: String,
        /// Requested name
        name: String,
    },

    // ============ Planning Errors ============
    /// The generated plan names a skill that is not registered (or excluded)
    #[error("Plan step {step_index} references unknown skill '{reference}'")]
    UnknownSkillReference {
        /// Index of the proposed call in the backend response
        step_index: usize,
        /// Skill reference exactly as proposed
        reference: String,
    },

    /// Backend output could not be turned into a valid plan
    #[error("Plan generation error: {0}")]
    PlanGeneration(String),

    /// The plan is in a state that does not allow stepping
    #[error("Plan is not runnable: {0}")]
    PlanNotRunnable(String),

    // ============ Execution Errors ============
    /// A step binding references a context variable that is absent
    #[error("Step {step_index} ({skill}): unresolved variable '{variable}'")]
    UnresolvedVariable {
        /// Index of the failing step
        step_index: usize,
        /// Fully qualified skill name
        skill: String,
        /// Name of the missing variable
        variable: String,
    },

    /// A skill rejected one of its arguments
    #[error("Invalid argument for {skill}: {message} (value: {value:?})")]
    InvalidArgument {
        /// Fully qualified skill name
        skill: String,
        /// Human readable reason
        message: String,
        /// Offending value
        value: String,
    },

    /// Execution was cancelled before the step started
    #[error("Plan cancelled before step {step_index}")]
    Cancelled {
        /// Index of the step that did not start
        step_index: usize,
    },

    /// A step exceeded the configured timeout
    #[error("Step {step_index} ({skill}) timed out after {timeout_ms}ms")]
    StepTimeout {
        /// Index of the failing step
        step_index: usize,
        /// Fully qualified skill name
        skill: String,
        /// Timeout that expired
        timeout_ms: u64,
    },

    /// A skill failed while running inside a plan
    #[error("Step {step_index} ({skill}) failed: {source}")]
    StepFailed {
        /// Index of the failing step
        step_index: usize,
        /// Fully qualified skill name
        skill: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    // ============ Template Errors ============
    /// Prompt template could not be parsed or loaded
    #[error("Template error: {0}")]
    Template(String),

    // ============ Backend Errors ============
    /// Generic backend failure (text, chat, embedding or memory service)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Provider API error
    #[error("Provider API error: {0}")]
    ProviderApi(String),

    /// Provider authentication failed
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider rate limit exceeded
    #[error("Provider rate limit exceeded: retry after {retry_after_secs}s")]
    ProviderRateLimit {
        /// Seconds to wait before retrying
        retry_after_secs: u64,
    },

    /// Stream interrupted
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Stream timeout
    #[error("Stream timeout after {timeout_secs}s")]
    StreamTimeout {
        /// Timeout duration in seconds
        timeout_secs: u64,
    },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ============ System Errors ============
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a new backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument(
        skill: impl Into<String>,
        message: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            skill: skill.into(),
            message: message.into(),
            value: value.into(),
        }
    }

    /// Create a new plan generation error
    pub fn plan_generation(msg: impl Into<String>) -> Self {
        Self::PlanGeneration(msg.into())
    }

    /// Strip a `StepFailed` wrapper and return the error raised by the skill
    pub fn root(&self) -> &Error {
        match self {
            Self::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Self::ProviderRateLimit { .. }
                | Self::StreamInterrupted(_)
                | Self::StreamTimeout { .. }
                | Self::StepTimeout { .. }
                | Self::Http(_)
        )
    }
}
