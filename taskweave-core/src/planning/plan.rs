//! Plan model: ordered skill invocations plus a cursor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::skills::SkillKey;

/// Value bound to one skill parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParameterBinding {
    /// Passed through as is
    Literal(String),
    /// Read from the context when the step runs
    Variable(String),
}

/// One invocation within a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Skill to invoke
    pub skill: SkillKey,
    /// Parameter name to binding, in proposal order
    #[serde(default)]
    pub bindings: Vec<(String, ParameterBinding)>,
    /// Context variable receiving the result
    #[serde(default)]
    pub output: Option<String>,
}

impl PlanStep {
    /// Step with no bindings
    pub fn new(skill: SkillKey) -> Self {
        Self {
            skill,
            bindings: Vec::new(),
            output: None,
        }
    }

    /// Bind a parameter to a literal
    pub fn literal(mut self, parameter: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings
            .push((parameter.into(), ParameterBinding::Literal(value.into())));
        self
    }

    /// Bind a parameter to a context variable
    pub fn variable(mut self, parameter: impl Into<String>, variable: impl Into<String>) -> Self {
        self.bindings
            .push((parameter.into(), ParameterBinding::Variable(variable.into())));
        self
    }

    /// Store the result under `variable`
    pub fn output(mut self, variable: impl Into<String>) -> Self {
        self.output = Some(variable.into());
        self
    }
}

/// Why a plan stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// Cancellation was requested before a step started
    Cancelled,
    /// The step at the cursor raised an error
    StepFailed {
        /// Rendered error
        message: String,
    },
}

/// Execution state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum PlanState {
    /// Steps remain
    Pending,
    /// Cursor reached the end
    Complete,
    /// Terminal until [`Plan::retry`]
    Failed(FailureReason),
}

/// Ordered, resumable sequence of skill invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PlanRepr")]
pub struct Plan {
    /// Plan id
    pub id: Uuid,
    /// Goal the plan was generated for
    pub goal: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    steps: Vec<PlanStep>,
    cursor: usize,
    state: PlanState,
}

/// Unchecked wire form of [`Plan`]
#[derive(Deserialize)]
struct PlanRepr {
    id: Uuid,
    goal: String,
    created_at: DateTime<Utc>,
    steps: Vec<PlanStep>,
    cursor: usize,
    state: PlanState,
}

impl TryFrom<PlanRepr> for Plan {
    type Error = String;

    fn try_from(raw: PlanRepr) -> std::result::Result<Self, Self::Error> {
        let len = raw.steps.len();
        if raw.cursor > len {
            return Err(format!("cursor {} is past the last of {} steps", raw.cursor, len));
        }
        let at_end = raw.cursor == len;
        let state = match raw.state {
            PlanState::Failed(_) if at_end => {
                return Err(format!("plan failed at cursor {} but has only {} steps", raw.cursor, len));
            }
            PlanState::Complete if !at_end => {
                return Err(format!("plan marked complete at cursor {} of {}", raw.cursor, len));
            }
            _ if at_end => PlanState::Complete,
            other => other,
        };
        Ok(Self {
            id: raw.id,
            goal: raw.goal,
            created_at: raw.created_at,
            steps: raw.steps,
            cursor: raw.cursor,
            state,
        })
    }
}

impl Plan {
    /// New plan positioned at the first step. An empty plan is already complete.
    pub fn new(goal: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let state = if steps.is_empty() {
            PlanState::Complete
        } else {
            PlanState::Pending
        };
        Self {
            id: Uuid::new_v4(),
            goal: goal.into(),
            created_at: Utc::now(),
            steps,
            cursor: 0,
            state,
        }
    }

    /// All steps
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Index of the next step to run
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Current state
    pub fn state(&self) -> &PlanState {
        &self.state
    }

    /// Step at the cursor
    pub fn current(&self) -> Option<&PlanStep> {
        match self.state {
            PlanState::Pending => self.steps.get(self.cursor),
            _ => None,
        }
    }

    /// Steps not yet run
    pub fn remaining(&self) -> usize {
        self.steps.len().saturating_sub(self.cursor)
    }

    /// Cursor reached the end
    pub fn is_complete(&self) -> bool {
        self.state == PlanState::Complete
    }

    /// Stopped by a failure or cancellation
    pub fn is_failed(&self) -> bool {
        matches!(self.state, PlanState::Failed(_))
    }

    /// Return a failed plan to `Pending` at the same cursor.
    ///
    /// Returns false if the plan was not failed.
    pub fn retry(&mut self) -> bool {
        if !self.is_failed() {
            return false;
        }
        self.state = PlanState::Pending;
        true
    }

    pub(crate) fn advance(&mut self) {
        self.cursor += 1;
        if self.cursor == self.steps.len() {
            self.state = PlanState::Complete;
        }
    }

    pub(crate) fn fail(&mut self, reason: FailureReason) {
        self.state = PlanState::Failed(reason);
    }
}
