//! # Speechflow
//!
//! A small workflow scheduler for speech and audio work.
//!
//! Callers start a named workflow and get a run identity back immediately.
//! The run executes in the background as a sequence of bounded steps, each
//! calling a registered payload function under a start-to-close deadline.
//! Any number of callers may later wait on the same run and receive the
//! identical recorded result.
//!
//! ## Features
//!
//! - **Fire and wait later**: [`Scheduler::schedule_workflow`] returns once
//!   the run is registered; [`ResultWaiter`] suspends until it is terminal
//! - **Bounded steps**: every step runs under a [`Deadline`] (default: 120s)
//!   and is abandoned when it elapses
//! - **Single writer**: each run is owned by one background task; observers
//!   only ever see whole snapshots
//! - **Error Handling**: Structured errors with `thiserror`, classified by
//!   [`ErrorKind`]
//! - **Speech payloads**: text-to-speech and audio isolation behind the
//!   [`SpeechClient`] seam
//!
//! ## Quick Start
//!
//! ```rust
//! use speechflow::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), WorkflowError> {
//! let scheduler = Scheduler::builder()
//!     .function(step_fn("shout", |input: StepInput| async move {
//!         let text = input.get_str("text").unwrap_or_default().to_uppercase();
//!         Ok(StepOutput::new().with("text", text))
//!     }))
//!     .workflow(
//!         Workflow::builder("ShoutWorkflow")
//!             .step("shout", StepInput::new().with("text", "hello"))
//!             .build()?,
//!     )
//!     .build()?;
//!
//! let workflow_id = WorkflowId::new("ShoutWorkflow");
//! let run_id = scheduler.schedule_workflow(&workflow_id, None)?;
//! let output = scheduler.waiter().await_result(&workflow_id, &run_id, None).await?;
//!
//! assert_eq!(output.get("text"), Some(&serde_json::json!("HELLO")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Speech Workflows
//!
//! ```rust
//! use speechflow::prelude::*;
//! use speechflow::workflows::{speech_scheduler, TEXT_TO_SPEECH_WORKFLOW};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), WorkflowError> {
//! let settings = Settings {
//!     api_key: Some("key".to_string()),
//!     ..Settings::default()
//! };
//! let scheduler = speech_scheduler(&settings, Arc::new(LoopbackSpeechClient))?;
//!
//! let workflow_id = WorkflowId::new(TEXT_TO_SPEECH_WORKFLOW);
//! let run_id = scheduler.schedule_workflow(&workflow_id, None)?;
//! let output = scheduler.waiter().await_result(&workflow_id, &run_id, None).await?;
//!
//! assert!(output.pointer("/media/payload").is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use speechflow::prelude::*;
//!
//! fn report(result: &StepResult) {
//!     match result {
//!         Ok(output) => println!("{output}"),
//!         Err(WorkflowError::Timeout { step_name, deadline }) => {
//!             eprintln!("Step {step_name} exceeded {deadline:?}");
//!         }
//!         Err(e) => eprintln!("{}: {}", e.kind(), e.message()),
//!     }
//! }
//! # report(&Ok(StepOutput::new()));
//! ```

mod error;
mod executor;
mod identity;
mod input;
mod registry;
mod run;
mod scheduler;
mod step;
mod waiter;
mod workflow;

pub mod config;
pub mod prelude;
pub mod speech;
pub mod workflows;

pub use config::Settings;
pub use error::{ErrorKind, WorkflowError};
pub use executor::StepExecutor;
pub use identity::{RunId, WorkflowId};
pub use input::{StepInput, StepOutput};
pub use registry::RunRegistry;
pub use run::{RunState, StepRecord, WorkflowRun};
pub use scheduler::{Scheduler, SchedulerBuilder};
pub use speech::{
    IsolateAudio, LoopbackSpeechClient, SpeechClient, SynthesisRequest, TextToSpeech, TtsOptions,
    VoiceSettings,
};
pub use step::{step_fn, Deadline, FnStep, StepFunction, StepName, StepResult};
pub use waiter::ResultWaiter;
pub use workflow::{StepPlan, Workflow, WorkflowBuilder};
