//! Prelude: Re-exports common types for convenience
//!
//! # Usage
//! ```
//! use taskweave_core::prelude::*;
//! ```

pub use crate::error::{Error, Result};

// Backends
pub use crate::ai::{
    ChatCompletion, ChatRequest, CompletionOptions, Message, Provider, ProviderBackend, Role,
    StreamingChoice, StreamingResponse, TextCompletion,
};
pub use crate::memory::{Embeddings, MemoryRecord, MemoryStore, SemanticMemory, VolatileMemoryStore};

// Skills
pub use crate::context::ExecutionContext;
pub use crate::skills::{
    MathSkill, NativeFunction, ParameterDescriptor, PromptSkill, Skill, SkillDescriptor, SkillKey,
    SkillRegistry,
};

// Planning
pub use crate::planning::{
    ExecutorConfig, ParameterBinding, Plan, PlanExecutor, PlanGenerator, PlanState, PlanStep,
    PlannerConfig, StepResult,
};

// Wiring
pub use crate::chat::{ChatHistory, ConversationBot};
pub use crate::config::KernelConfig;
pub use crate::kernel::{Kernel, KernelServices};
