//! Runs one named step under a deadline.

use crate::error::WorkflowError;
use crate::input::StepInput;
use crate::step::{Deadline, StepFunction, StepName, StepResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Resolves step names to payload functions and runs them with a deadline.
///
/// The executor never retries. Each invocation is spawned on its own task so
/// that an expired deadline can abort it without waiting for the payload.
#[derive(Default)]
pub struct StepExecutor {
    functions: HashMap<StepName, Arc<dyn StepFunction>>,
}

impl fmt::Debug for StepExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepExecutor")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StepExecutor {
    /// Creates an executor with no registered functions.
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registers a payload function under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Configuration`] if the name is already taken.
    pub fn register<F: StepFunction + 'static>(
        &mut self,
        function: F,
    ) -> Result<(), WorkflowError> {
        self.register_arc(Arc::new(function))
    }

    /// Registers an already shared payload function.
    pub fn register_arc(&mut self, function: Arc<dyn StepFunction>) -> Result<(), WorkflowError> {
        let name = function.name();
        if self.functions.contains_key(&name) {
            return Err(WorkflowError::Configuration(format!(
                "Step function '{name}' is already registered"
            )));
        }
        self.functions.insert(name, function);
        Ok(())
    }

    /// Returns `true` if a function with the given name is registered.
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Returns an iterator over all registered step names.
    pub fn function_names(&self) -> impl Iterator<Item = &StepName> {
        self.functions.keys()
    }

    /// Executes `step_name` with `input`, failing once `deadline` elapses.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::StepNotFound`] when no function has this name
    /// - whatever the payload returned, unchanged
    /// - [`WorkflowError::StepError`] when the payload task panicked
    /// - [`WorkflowError::Timeout`] when the deadline elapsed first; the
    ///   payload task is aborted and its outcome discarded
    pub async fn execute(
        &self,
        step_name: &StepName,
        input: StepInput,
        deadline: Deadline,
    ) -> StepResult {
        let function = self
            .functions
            .get(step_name)
            .cloned()
            .ok_or_else(|| WorkflowError::StepNotFound(step_name.clone()))?;

        debug!("Step '{}' starting with deadline {}", step_name, deadline);
        let expires_at = Instant::now() + deadline.as_duration();
        let mut handle = tokio::spawn(async move { function.call(input).await });

        // Deadline first: a payload finishing after it still counts as late.
        let outcome = tokio::select! {
            biased;
            _ = sleep_until(expires_at) => None,
            joined = &mut handle => (Instant::now() < expires_at).then_some(joined),
        };

        match outcome {
            Some(Ok(Ok(output))) => {
                info!("Step '{}' completed successfully", step_name);
                Ok(output)
            }
            Some(Ok(Err(e))) => {
                warn!("Step '{}' failed: {}", step_name, e);
                Err(e)
            }
            Some(Err(join_error)) => {
                warn!("Step '{}' task aborted: {}", step_name, join_error);
                Err(WorkflowError::StepError {
                    step_name: step_name.clone(),
                    details: format!("payload task did not complete: {join_error}"),
                })
            }
            None => {
                handle.abort();
                warn!("Step '{}' timed out after {}", step_name, deadline);
                Err(WorkflowError::Timeout {
                    step_name: step_name.clone(),
                    deadline: deadline.as_duration(),
                })
            }
        }
    }
}
