//! Workflow definitions: an identity plus an ordered list of steps.

use crate::error::WorkflowError;
use crate::identity::WorkflowId;
use crate::input::StepInput;
use crate::step::{Deadline, StepName};
use std::fmt;

/// One planned step invocation inside a workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct StepPlan {
    /// Name of the payload function to run.
    pub step_name: StepName,
    /// Input handed to the payload.
    pub input: StepInput,
    /// Start-to-close budget for this step.
    pub deadline: Deadline,
}

/// A named, ordered sequence of steps.
///
/// Steps run strictly in the order they were added; the first failure
/// aborts the run. Inputs are fixed when the workflow is constructed.
///
/// # Examples
///
/// ```
/// use speechflow::{Deadline, StepInput, Workflow};
///
/// let workflow = Workflow::builder("TextToSpeechWorkflow")
///     .step("text_to_speech", StepInput::new().with("text", "hi"))
///     .build()
///     .expect("valid workflow");
///
/// assert_eq!(workflow.step_count(), 1);
/// assert_eq!(workflow.steps()[0].deadline, Deadline::default());
/// ```
#[derive(Clone)]
pub struct Workflow {
    id: WorkflowId,
    steps: Vec<StepPlan>,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field(
                "steps",
                &self.steps.iter().map(|s| &s.step_name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Workflow {
    /// Creates a new workflow builder.
    pub fn builder(id: impl Into<WorkflowId>) -> WorkflowBuilder {
        WorkflowBuilder::new(id)
    }

    /// Returns the workflow identity.
    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    /// Returns the planned steps in execution order.
    pub fn steps(&self) -> &[StepPlan] {
        &self.steps
    }

    /// Returns the number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// Builder for constructing [`Workflow`] instances.
#[derive(Debug)]
pub struct WorkflowBuilder {
    id: WorkflowId,
    steps: Vec<StepPlan>,
    default_deadline: Deadline,
}

impl WorkflowBuilder {
    /// Creates a builder for the given workflow identity.
    pub fn new(id: impl Into<WorkflowId>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            default_deadline: Deadline::default(),
        }
    }

    /// Sets the deadline used by steps added afterwards with [`step`](Self::step).
    pub fn default_deadline(mut self, deadline: Deadline) -> Self {
        self.default_deadline = deadline;
        self
    }

    /// Appends a step using the builder's default deadline.
    pub fn step(self, step_name: impl Into<StepName>, input: StepInput) -> Self {
        let deadline = self.default_deadline;
        self.step_with_deadline(step_name, input, deadline)
    }

    /// Appends a step with its own deadline.
    pub fn step_with_deadline(
        mut self,
        step_name: impl Into<StepName>,
        input: StepInput,
        deadline: Deadline,
    ) -> Self {
        self.steps.push(StepPlan {
            step_name: step_name.into(),
            input,
            deadline,
        });
        self
    }

    /// Builds the workflow.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Configuration`] when no step was added or a
    /// deadline is zero.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        if self.steps.is_empty() {
            return Err(WorkflowError::Configuration(format!(
                "Workflow '{}' must define at least one step",
                self.id
            )));
        }
        if let Some(plan) = self.steps.iter().find(|p| p.deadline.as_duration().is_zero()) {
            return Err(WorkflowError::Configuration(format!(
                "Step '{}' in workflow '{}' has a zero deadline",
                plan.step_name, self.id
            )));
        }

        Ok(Workflow {
            id: self.id,
            steps: self.steps,
        })
    }
}
