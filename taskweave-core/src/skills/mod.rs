//! Skills: named callable units registered under a namespace
//!
//! A skill is either a native async function or a prompt template that is
//! rendered and sent to a text completion backend. Both are described by a
//! [`SkillDescriptor`], which is what the planner shows the model.

pub mod loader;
pub mod math;
pub mod prompt;
pub mod registry;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::completion::TextCompletion;
use crate::context::ExecutionContext;
use crate::error::Result;

pub use loader::{import_prompt_skills, load_prompt_skills, PromptSkillConfig};
pub use math::MathSkill;
pub use prompt::{PromptSkill, PromptTemplate};
pub use registry::SkillRegistry;

/// Identity of a skill: namespace plus name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkillKey {
    /// Namespace (e.g. "Math")
    pub namespace: String,
    /// Name within the namespace (e.g. "Add")
    pub name: String,
}

impl SkillKey {
    /// Create a key
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse `Namespace.Name`. The last dot separates the name.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (namespace, name) = qualified.trim().rsplit_once('.')?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for SkillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// One declared input of a skill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Parameter name (`input` is the default input)
    pub name: String,
    /// Description shown to the planner
    #[serde(default)]
    pub description: String,
    /// Value used when the parameter is neither bound nor in context
    #[serde(default, rename = "defaultValue", alias = "default_value")]
    pub default_value: Option<String>,
}

impl ParameterDescriptor {
    /// Create a parameter without default
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default_value: None,
        }
    }

    /// Set a default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Public description of a skill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDescriptor {
    /// Namespace
    pub namespace: String,
    /// Name, unique within the namespace
    pub name: String,
    /// What the skill does
    pub description: String,
    /// Declared inputs, in order
    pub parameters: Vec<ParameterDescriptor>,
    /// True for native functions, false for prompt templates
    pub is_native: bool,
}

impl SkillDescriptor {
    /// Create a descriptor with no parameters
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            is_native: true,
        }
    }

    /// Append a declared parameter
    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Key of this skill
    pub fn key(&self) -> SkillKey {
        SkillKey::new(&self.namespace, &self.name)
    }

    /// `Namespace.Name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Find a declared parameter (case-insensitive)
    pub fn find_parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// A direct callable skill
#[async_trait]
pub trait NativeFunction: Send + Sync {
    /// Run with the default input and a read-only view of the context
    async fn invoke(&self, input: &str, context: &ExecutionContext) -> Result<String>;
}

/// Closure-backed native function
pub struct FnSkill<F> {
    func: F,
}

impl<F> FnSkill<F> {
    /// Wrap a closure receiving `(input, context)`
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> NativeFunction for FnSkill<F>
where
    F: Fn(String, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send,
{
    async fn invoke(&self, input: &str, context: &ExecutionContext) -> Result<String> {
        (self.func)(input.to_string(), context.clone()).await
    }
}

/// A registered skill: the closed set of callable kinds
#[derive(Clone)]
pub enum Skill {
    /// Direct function call
    Native {
        /// Public description
        descriptor: SkillDescriptor,
        /// Implementation
        function: Arc<dyn NativeFunction>,
    },
    /// Prompt template sent to the text completion backend
    Prompt(PromptSkill),
}

impl Skill {
    /// Wrap a native function
    pub fn native(mut descriptor: SkillDescriptor, function: impl NativeFunction + 'static) -> Self {
        descriptor.is_native = true;
        Self::Native {
            descriptor,
            function: Arc::new(function),
        }
    }

    /// Wrap a closure as a native skill
    pub fn from_fn<F, Fut>(descriptor: SkillDescriptor, func: F) -> Self
    where
        F: Fn(String, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self::native(descriptor, FnSkill::new(func))
    }

    /// Public description
    pub fn descriptor(&self) -> &SkillDescriptor {
        match self {
            Self::Native { descriptor, .. } => descriptor,
            Self::Prompt(prompt) => prompt.descriptor(),
        }
    }

    /// Invoke against `context`; prompt skills use `text` as backend
    pub async fn invoke(
        &self,
        context: &ExecutionContext,
        text: &dyn TextCompletion,
    ) -> Result<String> {
        match self {
            Self::Native { function, .. } => function.invoke(context.input(), context).await,
            Self::Prompt(prompt) => prompt.invoke(context, text).await,
        }
    }
}

impl fmt::Debug for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native { descriptor, .. } => f
                .debug_struct("Native")
                .field("descriptor", descriptor)
                .finish_non_exhaustive(),
            Self::Prompt(prompt) => f.debug_tuple("Prompt").field(prompt).finish(),
        }
    }
}

impl From<PromptSkill> for Skill {
    fn from(prompt: PromptSkill) -> Self {
        Self::Prompt(prompt)
    }
}
