//! Workflow run state machine and its sequential driver.

use crate::error::{ErrorKind, WorkflowError};
use crate::executor::StepExecutor;
use crate::identity::{RunId, WorkflowId};
use crate::registry::RunRegistry;
use crate::step::{StepName, StepResult};
use crate::workflow::Workflow;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Lifecycle state of a run.
///
/// `Pending -> Running -> {Succeeded | Failed}`; the last two are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Registered, not yet started.
    Pending,
    /// Steps are executing.
    Running,
    /// Every step succeeded.
    Succeeded,
    /// A step failed; later steps never ran.
    Failed,
}

impl RunState {
    /// Returns `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Running => write!(f, "running"),
            RunState::Succeeded => write!(f, "succeeded"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// What happened to one step of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// The step that ran.
    pub step_name: StepName,
    /// When the step was handed to the executor.
    pub started_at: DateTime<Utc>,
    /// Wall-clock time the step took, bounded by its deadline.
    pub elapsed: Duration,
    /// `None` on success, otherwise the kind of the failure.
    pub error: Option<ErrorKind>,
}

/// Immutable snapshot of one workflow run.
///
/// The registry publishes a whole new snapshot on every change, so readers
/// never see a half-updated run. `completed_at` is set exactly when the
/// state is terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRun {
    workflow_id: WorkflowId,
    run_id: RunId,
    state: RunState,
    result: Option<StepResult>,
    registered_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    steps: Vec<StepRecord>,
}

impl WorkflowRun {
    pub(crate) fn pending(workflow_id: WorkflowId, run_id: RunId) -> Self {
        Self {
            workflow_id,
            run_id,
            state: RunState::Pending,
            result: None,
            registered_at: Utc::now(),
            started_at: None,
            completed_at: None,
            steps: Vec::new(),
        }
    }

    /// Returns the workflow identity.
    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    /// Returns the run identity.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Returns the current state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns `true` once the run has succeeded or failed.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns the terminal result, if any.
    pub fn result(&self) -> Option<&StepResult> {
        self.result.as_ref()
    }

    /// Returns when the run was registered.
    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Returns when the first step started.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the run reached a terminal state.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the records of the steps that have finished so far.
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Pending -> Running.
    pub(crate) fn started(&self) -> Result<Self, WorkflowError> {
        self.expect_state(RunState::Pending, RunState::Running)?;
        Ok(Self {
            state: RunState::Running,
            started_at: Some(Utc::now()),
            ..self.clone()
        })
    }

    /// Running -> Running with one more step record.
    pub(crate) fn with_step(&self, record: StepRecord) -> Result<Self, WorkflowError> {
        self.expect_state(RunState::Running, RunState::Running)?;
        let mut next = self.clone();
        next.steps.push(record);
        Ok(next)
    }

    /// Running -> Succeeded or Failed, depending on `result`.
    pub(crate) fn completed(&self, result: StepResult) -> Result<Self, WorkflowError> {
        let target = if result.is_ok() {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        self.expect_state(RunState::Running, target)?;
        Ok(Self {
            state: target,
            result: Some(result),
            completed_at: Some(Utc::now()),
            ..self.clone()
        })
    }

    fn expect_state(&self, required: RunState, to: RunState) -> Result<(), WorkflowError> {
        if self.state == required {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                run_id: self.run_id.clone(),
                from: self.state,
                to,
            })
        }
    }
}

/// Runs every step of `workflow` in order and publishes the outcome.
///
/// This is the only writer for the run after registration.
pub(crate) async fn drive(
    workflow: Arc<Workflow>,
    executor: Arc<StepExecutor>,
    registry: Arc<RunRegistry>,
    run_id: RunId,
) {
    if let Err(e) = registry.mark_running(&run_id) {
        warn!("Run '{}' could not start: {}", run_id, e);
        return;
    }
    info!("Workflow '{}' run '{}' started", workflow.id(), run_id);

    let result = execute_steps(&workflow, &executor, &registry, &run_id).await;

    match registry.mark_terminal(&run_id, result) {
        Ok(run) => match run.result() {
            Some(Err(e)) => warn!(
                "Workflow '{}' run '{}' failed: {}",
                workflow.id(),
                run_id,
                e
            ),
            _ => info!("Workflow '{}' run '{}' completed", workflow.id(), run_id),
        },
        Err(e) => warn!("Run '{}' could not record its result: {}", run_id, e),
    }
}

async fn execute_steps(
    workflow: &Workflow,
    executor: &StepExecutor,
    registry: &RunRegistry,
    run_id: &RunId,
) -> StepResult {
    let mut last = None;

    for plan in workflow.steps() {
        let started_at = Utc::now();
        let clock = Instant::now();
        let result = executor
            .execute(&plan.step_name, plan.input.clone(), plan.deadline)
            .await;

        registry.record_step(
            run_id,
            StepRecord {
                step_name: plan.step_name.clone(),
                started_at,
                elapsed: clock.elapsed(),
                error: result.as_ref().err().map(WorkflowError::kind),
            },
        )?;

        // First failure aborts the run; later steps never start.
        last = Some(result?);
    }

    last.ok_or_else(|| {
        WorkflowError::Configuration(format!("Workflow '{}' has no steps", workflow.id()))
    })
}
