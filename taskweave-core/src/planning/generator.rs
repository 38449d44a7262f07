//! Plan generation: catalog + goal in, validated [`Plan`] out
//!
//! The backend is asked for a JSON object of the form
//! `{"steps":[{"skill":"Ns.Name","args":{"param":"value"},"output":"VAR"}]}`.
//! Every proposed skill must resolve in the registry, otherwise the whole
//! generation fails. No retries are attempted.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::ai::completion::{CompletionOptions, TextCompletion};
use crate::context::INPUT_VAR;
use crate::error::{Error, Result};
use crate::planning::plan::{ParameterBinding, Plan, PlanStep};
use crate::skills::{SkillDescriptor, SkillRegistry};

const MAX_PROMPT_LOG_CHARS: usize = 2_000;
const MAX_OUTPUT_LOG_CHARS: usize = 4_000;

const PLAN_SHAPE: &str =
    r#"{"steps":[{"skill":"Namespace.Name","args":{"parameter":"value"},"output":"VARIABLE"}]}"#;

/// Planner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Options for the planning completion call
    pub options: CompletionOptions,
    /// Namespaces hidden from the planner
    pub excluded_namespaces: Vec<String>,
    /// Skills hidden from the planner (`Ns.Name` or bare name)
    pub excluded_skills: Vec<String>,
    /// Upper bound on proposed steps
    pub max_steps: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            options: CompletionOptions {
                max_tokens: Some(1024),
                ..CompletionOptions::default()
            },
            excluded_namespaces: Vec::new(),
            excluded_skills: Vec::new(),
            max_steps: 10,
        }
    }
}

impl PlannerConfig {
    /// Whether `descriptor` is hidden from planning
    pub fn is_excluded(&self, descriptor: &SkillDescriptor) -> bool {
        let qualified = descriptor.qualified_name();
        self.excluded_namespaces
            .iter()
            .any(|ns| ns.eq_ignore_ascii_case(&descriptor.namespace))
            || self.excluded_skills.iter().any(|s| {
                s.eq_ignore_ascii_case(&qualified) || s.eq_ignore_ascii_case(&descriptor.name)
            })
    }
}

#[derive(Debug, Deserialize)]
struct ProposedPlan {
    #[serde(default)]
    steps: Vec<ProposedStep>,
}

#[derive(Debug, Deserialize)]
struct ProposedStep {
    skill: String,
    #[serde(default)]
    args: serde_json::Map<String, Value>,
    #[serde(default)]
    output: Option<String>,
}

/// Turns a goal into a plan with a text completion backend
pub struct PlanGenerator {
    registry: Arc<SkillRegistry>,
    backend: Arc<dyn TextCompletion>,
    config: PlannerConfig,
}

impl PlanGenerator {
    /// Create a generator over a frozen registry
    pub fn new(
        registry: Arc<SkillRegistry>,
        backend: Arc<dyn TextCompletion>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            config,
        }
    }

    /// Planner settings
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Build the planning prompt for `goal`
    pub fn build_prompt(&self, goal: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "Create a plan as an ordered list of skill calls that achieves the goal.\n\
             Use only the skills listed under [AVAILABLE SKILLS].\n\n",
        );
        prompt.push_str("[AVAILABLE SKILLS]\n");
        for descriptor in self
            .registry
            .catalog()
            .filter(|d| !self.config.is_excluded(d))
        {
            append_catalog_entry(&mut prompt, descriptor);
        }

        let _ = write!(prompt, "\n[GOAL]\n{}\n\n", goal.trim());
        prompt.push_str("Return a JSON object with shape:\n");
        prompt.push_str(PLAN_SHAPE);
        prompt.push_str(
            "\nEach step receives the previous step's result as `input`. \
             To pass an earlier result to a parameter, set \"output\" on the earlier step \
             and use \"$VARIABLE\" as the argument value. Return JSON only.\n",
        );
        prompt
    }

    /// Ask the backend for a plan achieving `goal`
    #[instrument(skip(self, goal), fields(goal_len = goal.len()))]
    pub async fn create_plan(&self, goal: &str) -> Result<Plan> {
        if goal.trim().is_empty() {
            return Err(Error::plan_generation("goal is empty"));
        }

        let prompt = self.build_prompt(goal);
        info!(
            skill_count = self.registry.len(),
            max_steps = self.config.max_steps,
            "planner request prepared"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(prompt = %truncate_for_log(&prompt, MAX_PROMPT_LOG_CHARS), "planner prompt");
        }

        let output = self.backend.complete(&prompt, &self.config.options).await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                output = %truncate_for_log(&output, MAX_OUTPUT_LOG_CHARS),
                "planner raw backend output"
            );
        }

        let plan = self.parse_plan(goal, &output)?;
        info!(plan_id = %plan.id, step_count = plan.steps().len(), "planner parsed plan");
        Ok(plan)
    }

    /// Validate backend output into a plan
    pub fn parse_plan(&self, goal: &str, output: &str) -> Result<Plan> {
        let proposed = read_proposed_plan(output)?;

        if proposed.steps.is_empty() {
            return Err(Error::plan_generation("plan has no steps"));
        }
        if proposed.steps.len() > self.config.max_steps {
            return Err(Error::plan_generation(format!(
                "plan has {} steps, limit is {}",
                proposed.steps.len(),
                self.config.max_steps
            )));
        }

        let mut outputs: Vec<String> = Vec::new();
        let mut steps = Vec::with_capacity(proposed.steps.len());
        for (index, call) in proposed.steps.into_iter().enumerate() {
            let descriptor = self
                .registry
                .resolve(&call.skill)
                .map(|s| s.descriptor())
                .filter(|d| !self.config.is_excluded(d))
                .ok_or_else(|| Error::UnknownSkillReference {
                    step_index: index,
                    reference: call.skill.clone(),
                })?;

            let mut step = PlanStep::new(descriptor.key());
            for (parameter, value) in call.args {
                let undeclared = !descriptor.parameters.is_empty()
                    && !parameter.eq_ignore_ascii_case(INPUT_VAR)
                    && descriptor.find_parameter(&parameter).is_none();
                if undeclared {
                    warn!(
                        step_index = index,
                        skill = %descriptor.qualified_name(),
                        parameter = %parameter,
                        "planner bound an argument the skill does not declare"
                    );
                }
                let binding = bind_argument(&value, &outputs);
                step.bindings.push((parameter, binding));
            }
            if let Some(output) = call.output.map(|o| o.trim().trim_start_matches('$').to_string()) {
                if !output.is_empty() {
                    outputs.push(output.clone());
                    step.output = Some(output);
                }
            }
            steps.push(step);
        }

        Ok(Plan::new(goal, steps))
    }
}

fn append_catalog_entry(buf: &mut String, descriptor: &SkillDescriptor) {
    let _ = writeln!(buf, "{}: {}", descriptor.qualified_name(), descriptor.description);
    if descriptor.parameters.is_empty() {
        return;
    }
    buf.push_str("  inputs:\n");
    for parameter in &descriptor.parameters {
        let _ = write!(buf, "  - {}: {}", parameter.name, parameter.description);
        if let Some(default) = parameter.default_value.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(buf, " (default: {})", default);
        }
        buf.push('\n');
    }
}

/// A value naming an earlier output (optionally `$`-prefixed) binds to that variable
fn bind_argument(value: &Value, outputs: &[String]) -> ParameterBinding {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let candidate = text.trim().trim_start_matches('$');
    match outputs.iter().find(|o| o.eq_ignore_ascii_case(candidate)) {
        Some(output) => ParameterBinding::Variable(output.clone()),
        None => ParameterBinding::Literal(text),
    }
}

/// Read the first JSON object in `text`, ignoring whatever follows it
fn read_proposed_plan(text: &str) -> Result<ProposedPlan> {
    let start = text
        .find('{')
        .ok_or_else(|| Error::plan_generation("backend output did not contain JSON"))?;
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<ProposedPlan>()
        .next()
        .ok_or_else(|| Error::plan_generation("backend output did not contain JSON"))?
        .map_err(|e| Error::plan_generation(format!("invalid plan JSON: {}", e)))
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    let _ = write!(preview, "... [truncated, total_chars={}]", char_count);
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::streaming::{MockStreamBuilder, StreamingResponse};
    use crate::skills::{MathSkill, PromptSkill};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct ScriptedBackend {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextCompletion for ScriptedBackend {
        async fn complete_stream(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<StreamingResponse> {
            self.prompts.lock().push(prompt.to_string());
            Ok(MockStreamBuilder::new().chunked(&self.reply, 7).done().build())
        }
    }

    fn registry() -> Arc<SkillRegistry> {
        let mut registry = SkillRegistry::new();
        registry.register_all(MathSkill::skills()).expect("math");
        registry
            .register(
                PromptSkill::new("Writer", "Poem", "Write a short poem", "Poem about {{$input}}")
                    .expect("template"),
            )
            .expect("poem");
        Arc::new(registry)
    }

    fn make_generator(reply: &str, config: PlannerConfig) -> (PlanGenerator, Arc<ScriptedBackend>) {
        let backend = ScriptedBackend::new(reply);
        (PlanGenerator::new(registry(), backend.clone(), config), backend)
    }

    #[tokio::test]
    async fn test_create_plan_binds_earlier_outputs() {
        let reply = r#"Here is the plan:
```json
{"steps":[
  {"skill":"Math.Add","args":{"input":"3","Amount":"2"},"output":"SUM"},
  {"skill":"Subtract","args":{"Amount":"$SUM"}}
]}
```"#;
        let (generator, backend) = make_generator(reply, PlannerConfig::default());
        let plan = generator.create_plan("add then subtract").await.expect("plan");

        assert_eq!(plan.steps().len(), 2);
        assert_eq!(plan.steps()[0].output.as_deref(), Some("SUM"));
        assert_eq!(plan.steps()[1].skill.to_string(), "Math.Subtract");
        assert_eq!(
            plan.steps()[1].bindings,
            vec![("Amount".to_string(), ParameterBinding::Variable("SUM".to_string()))]
        );
        assert!(plan.steps()[0]
            .bindings
            .contains(&("Amount".to_string(), ParameterBinding::Literal("2".to_string()))));

        let prompts = backend.prompts.lock();
        assert!(prompts[0].contains("Math.Add: Adds an amount to a value"));
        assert!(prompts[0].contains("- Amount: Amount to add"));
        assert!(prompts[0].contains("add then subtract"));
    }

    #[tokio::test]
    async fn test_unknown_skill_fails_whole_plan() {
        let reply = r#"{"steps":[{"skill":"Math.Add"},{"skill":"Math.Divide"}]}"#;
        let (generator, _) = make_generator(reply, PlannerConfig::default());
        let err = generator.create_plan("divide").await.expect_err("unknown");
        assert!(matches!(
            err,
            Error::UnknownSkillReference { step_index: 1, ref reference } if reference == "Math.Divide"
        ));
    }

    #[tokio::test]
    async fn test_excluded_skills_are_hidden_and_rejected() {
        let config = PlannerConfig {
            excluded_namespaces: vec!["writer".to_string()],
            ..PlannerConfig::default()
        };
        let (generator, backend) = make_generator(r#"{"steps":[{"skill":"Writer.Poem"}]}"#, config);
        let err = generator.create_plan("poem").await.expect_err("excluded");
        assert!(matches!(err, Error::UnknownSkillReference { .. }));
        assert!(!backend.prompts.lock()[0].contains("Writer.Poem"));
    }

    #[tokio::test]
    async fn test_unparseable_output() {
        let (generator, _) = make_generator("I cannot help with that.", PlannerConfig::default());
        assert!(matches!(
            generator.create_plan("x").await,
            Err(Error::PlanGeneration(_))
        ));

        let (generator, _) = make_generator(r#"{"steps":[]}"#, PlannerConfig::default());
        assert!(matches!(
            generator.create_plan("x").await,
            Err(Error::PlanGeneration(_))
        ));
    }

    #[test]
    fn test_max_steps() {
        let config = PlannerConfig {
            max_steps: 1,
            ..PlannerConfig::default()
        };
        let (generator, _) = make_generator("", config);
        let output = r#"{"steps":[{"skill":"Math.Add"},{"skill":"Math.Add"}]}"#;
        assert!(matches!(
            generator.parse_plan("twice", output),
            Err(Error::PlanGeneration(_))
        ));
    }

    #[test]
    fn test_non_string_arguments_become_literals() {
        let (generator, _) = make_generator("", PlannerConfig::default());
        let plan = generator
            .parse_plan("g", r#"{"steps":[{"skill":"Math.Add","args":{"Amount":2}}]}"#)
            .expect("plan");
        assert_eq!(
            plan.steps()[0].bindings,
            vec![("Amount".to_string(), ParameterBinding::Literal("2".to_string()))]
        );
    }

    #[test]
    fn test_prose_after_the_plan_is_ignored() {
        let (generator, _) = make_generator("", PlannerConfig::default());
        let output = "```json\n{\"steps\":[{\"skill\":\"Math.Add\",\"args\":{\"Amount\":\"1\"}}]}\n```\n\
                      The Add step reads {input} and {Amount}.";
        let plan = generator.parse_plan("g", output).expect("plan");
        assert_eq!(plan.steps().len(), 1);
        assert_eq!(plan.steps()[0].skill.to_string(), "Math.Add");
    }

    #[test]
    fn test_undeclared_argument_is_still_bound() {
        crate::logging::init_test_logging();
        let (generator, _) = make_generator("", PlannerConfig::default());
        let plan = generator
            .parse_plan("g", r#"{"steps":[{"skill":"Math.Add","args":{"Amonut":"2"}}]}"#)
            .expect("plan");
        assert_eq!(
            plan.steps()[0].bindings,
            vec![("Amonut".to_string(), ParameterBinding::Literal("2".to_string()))]
        );
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert!(truncate_for_log("abcdefghij", 3).starts_with("abc... [truncated"));
    }
}
