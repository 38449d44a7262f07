//! Explicit wiring of registry, backends, planner and executor
//!
//! A [`Kernel`] is an ordinary value built once at startup; nothing here is
//! global.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::ai::completion::{ChatCompletion, TextCompletion};
use crate::config::KernelConfig;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::memory::MemoryStore;
use crate::planning::{ExecutorConfig, Plan, PlanExecutor, PlanGenerator, PlannerConfig};
use crate::skills::{SkillKey, SkillRegistry};

/// Backends the kernel talks to
#[derive(Clone)]
pub struct KernelServices {
    /// Used by prompt skills and the planner
    pub text: Arc<dyn TextCompletion>,
    /// Chat backend, if configured
    pub chat: Option<Arc<dyn ChatCompletion>>,
    /// Semantic memory, if configured
    pub memory: Option<Arc<dyn MemoryStore>>,
}

impl KernelServices {
    /// Services with only a text backend
    pub fn text_only(text: Arc<dyn TextCompletion>) -> Self {
        Self {
            text,
            chat: None,
            memory: None,
        }
    }
}

/// Registry + services + planner + executor
pub struct Kernel {
    registry: Arc<SkillRegistry>,
    services: KernelServices,
    planner: PlanGenerator,
    executor: PlanExecutor,
}

impl Kernel {
    /// Kernel with default planner and executor settings
    pub fn new(registry: Arc<SkillRegistry>, services: KernelServices) -> Self {
        Self::with_settings(registry, services, PlannerConfig::default(), ExecutorConfig::default())
    }

    /// Kernel with planner and executor settings taken from `config`
    pub fn from_config(
        registry: Arc<SkillRegistry>,
        services: KernelServices,
        config: &KernelConfig,
    ) -> Self {
        Self::with_settings(
            registry,
            services,
            config.planner.clone(),
            config.executor.clone(),
        )
    }

    /// Kernel with explicit settings
    pub fn with_settings(
        registry: Arc<SkillRegistry>,
        services: KernelServices,
        planner: PlannerConfig,
        executor: ExecutorConfig,
    ) -> Self {
        let planner = PlanGenerator::new(registry.clone(), services.text.clone(), planner);
        let executor = PlanExecutor::new(registry.clone(), services.text.clone(), executor);
        info!(skills = registry.len(), "Kernel ready");
        Self {
            registry,
            services,
            planner,
            executor,
        }
    }

    /// Frozen skill registry
    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Text completion backend
    pub fn text(&self) -> &dyn TextCompletion {
        self.services.text.as_ref()
    }

    /// Chat backend or `Config` error
    pub fn chat(&self) -> Result<&dyn ChatCompletion> {
        self.services
            .chat
            .as_deref()
            .ok_or_else(|| Error::Config("no chat completion service configured".to_string()))
    }

    /// Memory or `Config` error
    pub fn memory(&self) -> Result<&dyn MemoryStore> {
        self.services
            .memory
            .as_deref()
            .ok_or_else(|| Error::Config("no semantic memory configured".to_string()))
    }

    /// Plan generator
    pub fn planner(&self) -> &PlanGenerator {
        &self.planner
    }

    /// Plan executor
    pub fn executor(&self) -> &PlanExecutor {
        &self.executor
    }

    /// Run one skill against `context`; its output becomes the new input
    pub async fn invoke(&self, key: &SkillKey, context: &mut ExecutionContext) -> Result<String> {
        let skill = self.registry.get(key)?;
        let output = skill.invoke(context, self.text()).await?;
        context.set_input(output.clone());
        Ok(output)
    }

    /// Chain skills from `input`: each output is the next skill's input
    pub async fn run(&self, input: &str, pipeline: &[SkillKey]) -> Result<String> {
        let mut context = ExecutionContext::new(input);
        self.run_with_context(&mut context, pipeline).await
    }

    /// Chain skills over an existing context
    #[instrument(skip_all, fields(skills = pipeline.len()))]
    pub async fn run_with_context(
        &self,
        context: &mut ExecutionContext,
        pipeline: &[SkillKey],
    ) -> Result<String> {
        for (index, key) in pipeline.iter().enumerate() {
            self.invoke(key, context)
                .await
                .map_err(|e| Error::StepFailed {
                    step_index: index,
                    skill: key.to_string(),
                    source: Box::new(e),
                })?;
        }
        Ok(context.input().to_string())
    }

    /// Generate a plan for `goal`
    pub async fn create_plan(&self, goal: &str) -> Result<Plan> {
        self.planner.create_plan(goal).await
    }

    /// Run `plan` to completion
    pub async fn execute_plan(
        &self,
        plan: &mut Plan,
        context: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.executor.run_to_completion(plan, context, cancel).await
    }
}
