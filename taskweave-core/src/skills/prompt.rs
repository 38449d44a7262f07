//! Prompt template skills
//!
//! Templates support variable blocks only: `{{$name}}`, whitespace allowed
//! inside the braces. `{{$input}}` renders the default input. Variables that
//! are not in the context render as an empty string.

use std::fmt;

use tracing::{debug, instrument};

use crate::ai::completion::{CompletionOptions, TextCompletion};
use crate::context::{ExecutionContext, INPUT_VAR};
use crate::error::{Error, Result};
use crate::skills::{ParameterDescriptor, SkillDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Text(String),
    Var(String),
}

/// A parsed prompt template
#[derive(Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    blocks: Vec<Block>,
}

impl PromptTemplate {
    /// Parse a template
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut blocks = Vec::new();
        let mut rest = source.as_str();

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                blocks.push(Block::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                Error::Template(format!("unclosed block at byte {}", source.len() - rest.len() + start))
            })?;
            let inner = after[..end].trim();
            let name = inner
                .strip_prefix('$')
                .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
                .ok_or_else(|| {
                    Error::Template(format!("unsupported block '{{{{{}}}}}', expected {{{{$variable}}}}", inner))
                })?;
            blocks.push(Block::Var(name.to_string()));
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            blocks.push(Block::Text(rest.to_string()));
        }

        Ok(Self { source, blocks })
    }

    /// Original template text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Referenced variable names, in order of first appearance, case-insensitively unique
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for block in &self.blocks {
            if let Block::Var(name) = block {
                if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute variables from `context`
    pub fn render(&self, context: &ExecutionContext) -> String {
        let mut out = String::with_capacity(self.source.len());
        for block in &self.blocks {
            match block {
                Block::Text(text) => out.push_str(text),
                Block::Var(name) => match context.get(name) {
                    Some(value) => out.push_str(value),
                    None => debug!(variable = %name, "template variable not set, rendering empty"),
                },
            }
        }
        out
    }
}

impl fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PromptTemplate").field(&self.source).finish()
    }
}

/// A skill backed by a prompt template
#[derive(Debug, Clone)]
pub struct PromptSkill {
    descriptor: SkillDescriptor,
    template: PromptTemplate,
    options: CompletionOptions,
}

impl PromptSkill {
    /// Create a prompt skill; parameters are derived from the template variables
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        template: &str,
    ) -> Result<Self> {
        let template = PromptTemplate::parse(template)?;
        let mut descriptor = SkillDescriptor::new(namespace, name, description);
        descriptor.is_native = false;
        descriptor.parameters = template
            .variables()
            .into_iter()
            .map(|v| {
                let description = if v.eq_ignore_ascii_case(INPUT_VAR) {
                    "Default input"
                } else {
                    ""
                };
                ParameterDescriptor::new(v, description)
            })
            .collect();

        Ok(Self {
            descriptor,
            template,
            options: CompletionOptions::default(),
        })
    }

    /// Replace the declared parameters (e.g. from a config file)
    pub fn with_parameters(mut self, parameters: Vec<ParameterDescriptor>) -> Self {
        self.descriptor.parameters = parameters;
        self
    }

    /// Set completion options
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Public description
    pub fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    /// Template
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Completion options
    pub fn options(&self) -> &CompletionOptions {
        &self.options
    }

    /// Render against `context` and complete with `backend`
    #[instrument(skip_all, fields(skill = %self.descriptor.qualified_name()))]
    pub async fn invoke(
        &self,
        context: &ExecutionContext,
        backend: &dyn TextCompletion,
    ) -> Result<String> {
        let prompt = self.template.render(context);
        debug!(prompt_len = prompt.len(), "rendered prompt");
        let output = backend.complete(&prompt, &self.options).await?;
        Ok(output.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::streaming::{MockStreamBuilder, StreamingResponse};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[test]
    fn test_render_variables() {
        let template = PromptTemplate::parse("{{$history}}\nHuman: {{ $human_input }}\nAI:")
            .expect("valid template");
        assert_eq!(template.variables(), vec!["history", "human_input"]);

        let ctx = ExecutionContext::default().with_variable("HUMAN_INPUT", "6+6=");
        assert_eq!(template.render(&ctx), "\nHuman: 6+6=\nAI:");
    }

    #[test]
    fn test_render_input() {
        let template = PromptTemplate::parse("({{$input}})^2=").expect("valid template");
        assert_eq!(template.render(&ExecutionContext::new("3+3")), "(3+3)^2=");
    }

    #[test]
    fn test_rejects_function_blocks() {
        assert!(matches!(
            PromptTemplate::parse("{{Math.Add $input}}"),
            Err(Error::Template(_))
        ));
        assert!(matches!(PromptTemplate::parse("{{$input"), Err(Error::Template(_))));
    }

    struct RecordingBackend {
        prompts: Mutex<Vec<String>>,
        reply: String,
    }

    #[async_trait]
    impl TextCompletion for RecordingBackend {
        async fn complete_stream(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<StreamingResponse> {
            self.prompts.lock().push(prompt.to_string());
            Ok(MockStreamBuilder::new().message(self.reply.clone()).done().build())
        }
    }

    #[tokio::test]
    async fn test_prompt_skill_invocation() {
        let skill = PromptSkill::new("Test", "Square", "Square a value", "({{$input}})^2=")
            .expect("valid template");
        assert!(!skill.descriptor().is_native);
        assert_eq!(skill.descriptor().parameters[0].name, "input");

        let backend = RecordingBackend {
            prompts: Mutex::new(Vec::new()),
            reply: " 36\n".to_string(),
        };
        let out = skill
            .invoke(&ExecutionContext::new("3+3"), &backend)
            .await
            .expect("invoke");
        assert_eq!(out, "36");
        assert_eq!(backend.prompts.lock().as_slice(), ["(3+3)^2="]);
    }
}
