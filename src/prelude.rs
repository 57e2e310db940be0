//! Commonly used types and traits

pub use crate::config::Settings;
pub use crate::error::{ErrorKind, WorkflowError};
pub use crate::identity::{RunId, WorkflowId};
pub use crate::input::{StepInput, StepOutput};
pub use crate::run::{RunState, WorkflowRun};
pub use crate::scheduler::Scheduler;
pub use crate::speech::{LoopbackSpeechClient, SpeechClient};
pub use crate::step::{step_fn, Deadline, StepFunction, StepName, StepResult};
pub use crate::waiter::ResultWaiter;
pub use crate::workflow::Workflow;
