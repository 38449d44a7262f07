//! Plan execution, one step at a time
//!
//! A plan is `Pending` while the cursor is before the end, `Complete` once it
//! reaches the end and `Failed` after a step raised or cancellation was
//! observed. Steps run strictly in order; each step's effects are committed to
//! the context before the next one starts.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::ai::completion::TextCompletion;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::planning::plan::{FailureReason, ParameterBinding, Plan, PlanState, PlanStep};
use crate::skills::{Skill, SkillRegistry};

/// Executor settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Per-step limit in milliseconds; expiry fails the step
    pub step_timeout_ms: Option<u64>,
}

impl ExecutorConfig {
    /// Per-step limit as a duration
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }
}

/// Outcome of [`PlanExecutor::step_once`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The step at `index` ran and the cursor moved past it
    Advanced {
        /// Index of the step that ran
        index: usize,
        /// Its result
        output: String,
    },
    /// Nothing left to run
    Complete,
}

/// Runs plans against an [`ExecutionContext`]
pub struct PlanExecutor {
    registry: Arc<SkillRegistry>,
    backend: Arc<dyn TextCompletion>,
    config: ExecutorConfig,
}

impl PlanExecutor {
    /// Create an executor over a frozen registry
    pub fn new(
        registry: Arc<SkillRegistry>,
        backend: Arc<dyn TextCompletion>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            config,
        }
    }

    /// Run the step at the cursor.
    ///
    /// On success the output is written to the step's output variable (if any)
    /// and to the default input, and the cursor advances by one. On failure the
    /// plan is marked failed and the cursor stays on the failing step.
    #[instrument(skip_all, fields(plan_id = %plan.id, cursor = plan.cursor()))]
    pub async fn step_once(
        &self,
        plan: &mut Plan,
        context: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<StepResult> {
        match plan.state() {
            PlanState::Complete => return Ok(StepResult::Complete),
            PlanState::Failed(reason) => {
                return Err(Error::PlanNotRunnable(format!(
                    "plan {} failed at step {}: {:?}",
                    plan.id,
                    plan.cursor(),
                    reason
                )))
            }
            PlanState::Pending => {}
        }

        let index = plan.cursor();
        let step = match plan.current() {
            Some(step) => step.clone(),
            None => return Err(Error::Internal(format!("plan {} has no step at {}", plan.id, index))),
        };

        if cancel.is_cancelled() {
            warn!(step_index = index, "Cancellation requested, stopping plan");
            plan.fail(FailureReason::Cancelled);
            return Err(Error::Cancelled { step_index: index });
        }

        match self.run_step(index, &step, context).await {
            Ok(output) => {
                if let Some(variable) = &step.output {
                    context.set(variable, output.clone());
                }
                context.set_input(output.clone());
                plan.advance();
                debug!(
                    step_index = index,
                    skill = %step.skill,
                    output_len = output.len(),
                    "Step completed"
                );
                Ok(StepResult::Advanced { index, output })
            }
            Err(e) => {
                warn!(step_index = index, skill = %step.skill, error = %e, "Step failed");
                plan.fail(FailureReason::StepFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Step until the plan completes; returns the final default input
    #[instrument(skip_all, fields(plan_id = %plan.id, steps = plan.steps().len()))]
    pub async fn run_to_completion(
        &self,
        plan: &mut Plan,
        context: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<String> {
        loop {
            match self.step_once(plan, context, cancel).await? {
                StepResult::Advanced { .. } => continue,
                StepResult::Complete => {
                    info!(goal = %plan.goal, "Plan completed");
                    return Ok(context.input().to_string());
                }
            }
        }
    }

    async fn run_step(
        &self,
        index: usize,
        step: &PlanStep,
        context: &ExecutionContext,
    ) -> Result<String> {
        let skill = self.registry.get(&step.skill).map_err(|e| wrap(index, step, e))?;
        let view = bind_parameters(index, step, skill, context)?;

        let invocation = skill.invoke(&view, self.backend.as_ref());
        let result = match self.config.step_timeout() {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .map_err(|_| Error::StepTimeout {
                    step_index: index,
                    skill: step.skill.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => invocation.await,
        };
        result.map_err(|e| wrap(index, step, e))
    }
}

fn wrap(index: usize, step: &PlanStep, source: Error) -> Error {
    Error::StepFailed {
        step_index: index,
        skill: step.skill.to_string(),
        source: Box::new(source),
    }
}

/// Step-local view: shared context, then parameter defaults, then bindings
fn bind_parameters(
    index: usize,
    step: &PlanStep,
    skill: &Skill,
    context: &ExecutionContext,
) -> Result<ExecutionContext> {
    let mut view = context.clone();
    for parameter in &skill.descriptor().parameters {
        if let Some(default) = &parameter.default_value {
            if !view.contains(&parameter.name) {
                view.set(&parameter.name, default.clone());
            }
        }
    }

    for (parameter, binding) in &step.bindings {
        let value = match binding {
            ParameterBinding::Literal(value) => value.clone(),
            ParameterBinding::Variable(variable) => context
                .get(variable)
                .ok_or_else(|| Error::UnresolvedVariable {
                    step_index: index,
                    skill: step.skill.to_string(),
                    variable: variable.clone(),
                })?
                .to_string(),
        };
        view.set(parameter, value);
    }
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::completion::CompletionOptions;
    use crate::ai::streaming::StreamingResponse;
    use crate::skills::{MathSkill, SkillDescriptor, SkillKey};
    use async_trait::async_trait;

    struct NoBackend;

    #[async_trait]
    impl TextCompletion for NoBackend {
        async fn complete_stream(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<StreamingResponse> {
            Err(Error::backend("offline"))
        }
    }

    fn executor(config: ExecutorConfig) -> PlanExecutor {
        let mut registry = SkillRegistry::new();
        registry.register_all(MathSkill::skills()).expect("math");
        registry
            .register(Skill::from_fn(
                SkillDescriptor::new("Test", "Slow", "Sleeps before echoing"),
                |input, _ctx| async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(input)
                },
            ))
            .expect("slow");
        PlanExecutor::new(Arc::new(registry), Arc::new(NoBackend), config)
    }

    fn add(amount: &str) -> PlanStep {
        PlanStep::new(SkillKey::new("Math", "Add")).literal("Amount", amount)
    }

    #[tokio::test]
    async fn test_step_once_advances_by_one() {
        let executor = executor(ExecutorConfig::default());
        let mut plan = Plan::new("add twice", vec![add("2").output("FIRST"), add("10")]);
        let mut ctx = ExecutionContext::new("3");
        let cancel = CancellationToken::new();

        let result = executor.step_once(&mut plan, &mut ctx, &cancel).await.expect("step");
        assert_eq!(result, StepResult::Advanced { index: 0, output: "5".to_string() });
        assert_eq!(plan.cursor(), 1);
        assert_eq!(ctx.get("first"), Some("5"));
        assert_eq!(ctx.input(), "5");
        // bindings stay step-local
        assert_eq!(ctx.get("Amount"), None);

        executor.step_once(&mut plan, &mut ctx, &cancel).await.expect("step");
        assert!(plan.is_complete());
        assert_eq!(ctx.input(), "15");

        let again = executor.step_once(&mut plan, &mut ctx, &cancel).await.expect("noop");
        assert_eq!(again, StepResult::Complete);
        assert_eq!(plan.cursor(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_cursor_and_prior_effects() {
        let executor = executor(ExecutorConfig::default());
        let mut plan = Plan::new("bad", vec![add("2"), add("two")]);
        let mut ctx = ExecutionContext::new("3");
        let cancel = CancellationToken::new();

        let err = executor
            .run_to_completion(&mut plan, &mut ctx, &cancel)
            .await
            .expect_err("second step fails");
        assert!(matches!(err, Error::StepFailed { step_index: 1, .. }));
        assert!(matches!(err.root(), Error::InvalidArgument { .. }));
        assert_eq!(plan.cursor(), 1);
        assert!(plan.is_failed());
        assert_eq!(ctx.input(), "5");

        let err = executor.step_once(&mut plan, &mut ctx, &cancel).await.expect_err("failed plan");
        assert!(matches!(err, Error::PlanNotRunnable(_)));
    }

    #[tokio::test]
    async fn test_unresolved_variable() {
        let executor = executor(ExecutorConfig::default());
        let step = PlanStep::new(SkillKey::new("Math", "Add")).variable("Amount", "MISSING");
        let mut plan = Plan::new("missing", vec![step]);
        let mut ctx = ExecutionContext::new("1");

        let err = executor
            .step_once(&mut plan, &mut ctx, &CancellationToken::new())
            .await
            .expect_err("unresolved");
        assert!(matches!(
            err,
            Error::UnresolvedVariable { step_index: 0, ref variable, .. } if variable == "MISSING"
        ));
        assert_eq!(plan.cursor(), 0);
        assert!(plan.is_failed());
    }

    #[tokio::test]
    async fn test_retry_resumes_at_cursor() {
        let executor = executor(ExecutorConfig::default());
        let step = PlanStep::new(SkillKey::new("Math", "Add")).variable("Amount", "LATER");
        let mut plan = Plan::new("resume", vec![step]);
        let mut ctx = ExecutionContext::new("1");
        let cancel = CancellationToken::new();

        assert!(executor.step_once(&mut plan, &mut ctx, &cancel).await.is_err());
        ctx.set("later", "41");
        assert!(plan.retry());
        let out = executor
            .run_to_completion(&mut plan, &mut ctx, &cancel)
            .await
            .expect("resumed");
        assert_eq!(out, "42");
    }

    #[tokio::test]
    async fn test_step_timeout() {
        let executor = executor(ExecutorConfig { step_timeout_ms: Some(20) });
        let mut plan = Plan::new("slow", vec![PlanStep::new(SkillKey::new("Test", "Slow"))]);
        let mut ctx = ExecutionContext::new("x");

        let err = executor
            .step_once(&mut plan, &mut ctx, &CancellationToken::new())
            .await
            .expect_err("timeout");
        assert!(matches!(err, Error::StepTimeout { step_index: 0, timeout_ms: 20, .. }));
        assert!(err.is_retryable());
        assert!(plan.is_failed());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let executor = executor(ExecutorConfig::default());
        let mut plan = Plan::new("never", vec![add("1")]);
        let mut ctx = ExecutionContext::new("1");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor
            .run_to_completion(&mut plan, &mut ctx, &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, Error::Cancelled { step_index: 0 }));
        assert_eq!(plan.state(), &PlanState::Failed(FailureReason::Cancelled));
        assert_eq!(ctx.input(), "1");
    }
}
