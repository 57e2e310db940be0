use crate::identity::{RunId, WorkflowId};
use crate::run::RunState;
use crate::step::StepName;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`WorkflowError`].
///
/// Every failure recorded on a run carries exactly one kind, which is what
/// callers of the result waiter usually branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required input field was missing, empty or of the wrong type.
    Validation,
    /// The payload failed while doing its work (including transport failures).
    Application,
    /// A step ran past its deadline.
    Timeout,
    /// Caller or deployment misuse: unknown names, identity collisions.
    Configuration,
    /// The requested run does not exist.
    NotFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Application => write!(f, "application"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::NotFound => write!(f, "not_found"),
        }
    }
}

/// Errors that can occur while scheduling or executing a workflow.
///
/// A failing step's error is recorded on its run and handed, unchanged, to
/// every waiter.
///
/// # Non-Exhaustive
///
/// Match with a wildcard arm; new variants may be added.
///
/// ```
/// use speechflow::{ErrorKind, WorkflowError};
///
/// fn describe(error: &WorkflowError) -> String {
///     match error.kind() {
///         ErrorKind::Timeout => format!("too slow: {}", error),
///         ErrorKind::Validation => format!("bad input: {}", error.message()),
///         _ => error.to_string(),
///     }
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WorkflowError {
    /// Input rejected by a payload before any external call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The payload's external call failed.
    #[error("Transport failed: {0}")]
    Transport(String),

    /// A step failed for any other reason, e.g. the payload task panicked.
    #[error("Step failed: {step_name}, details: {details}")]
    StepError {
        /// The name of the step that failed
        step_name: StepName,
        /// Details about the failure
        details: String,
    },

    /// A step exceeded its deadline and was abandoned.
    #[error("Timeout occurred in step: {step_name} (deadline {deadline:?})")]
    Timeout {
        /// The name of the step that timed out
        step_name: StepName,
        /// The deadline that elapsed
        deadline: Duration,
    },

    /// No payload function is registered under this step name.
    #[error("Step not found: {0}")]
    StepNotFound(StepName),

    /// No workflow is registered under this identity.
    #[error("Workflow not registered: {0}")]
    UnknownWorkflow(WorkflowId),

    /// The run identity is already present in the registry.
    #[error("Run already registered: {0}")]
    DuplicateRun(RunId),

    /// A run state change that the state machine does not allow.
    #[error("Illegal transition for run {run_id}: {from} -> {to}")]
    InvalidTransition {
        /// The run whose update was rejected
        run_id: RunId,
        /// State the run was in
        from: RunState,
        /// State that was requested
        to: RunState,
    },

    /// The workflow or runtime configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The (workflow, run) pair is not known to the registry.
    #[error("Run not found: {workflow_id}/{run_id}")]
    RunNotFound {
        /// Workflow identity that was queried
        workflow_id: WorkflowId,
        /// Run identity that was queried
        run_id: RunId,
    },
}

impl WorkflowError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::Transport(_) | WorkflowError::StepError { .. } => {
                ErrorKind::Application
            }
            WorkflowError::Timeout { .. } => ErrorKind::Timeout,
            WorkflowError::StepNotFound(_)
            | WorkflowError::UnknownWorkflow(_)
            | WorkflowError::DuplicateRun(_)
            | WorkflowError::InvalidTransition { .. }
            | WorkflowError::Configuration(_) => ErrorKind::Configuration,
            WorkflowError::RunNotFound { .. } => ErrorKind::NotFound,
        }
    }

    /// Returns the human-readable message without the kind prefix.
    ///
    /// For payload failures this is exactly the message the payload raised.
    pub fn message(&self) -> String {
        match self {
            WorkflowError::Validation(msg)
            | WorkflowError::Transport(msg)
            | WorkflowError::Configuration(msg) => msg.clone(),
            WorkflowError::StepError { details, .. } => details.clone(),
            other => other.to_string(),
        }
    }
}
