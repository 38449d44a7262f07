//! Sequential planning: generate a plan from a goal, then execute it

pub mod executor;
pub mod generator;
pub mod plan;

pub use executor::{ExecutorConfig, PlanExecutor, StepResult};
pub use generator::{PlanGenerator, PlannerConfig};
pub use plan::{FailureReason, ParameterBinding, Plan, PlanState, PlanStep};
