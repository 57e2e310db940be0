//! Waiting for a run's terminal result.

use crate::error::WorkflowError;
use crate::identity::{RunId, WorkflowId};
use crate::registry::RunRegistry;
use crate::run::WorkflowRun;
use crate::step::StepResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Suspends callers until a run reaches `Succeeded` or `Failed`.
///
/// Waiting is read-only: any number of waiters may wait on the same run and
/// each receives an identical copy of the recorded result.
#[derive(Debug, Clone)]
pub struct ResultWaiter {
    registry: Arc<RunRegistry>,
    grace: Duration,
    poll_interval: Duration,
}

impl ResultWaiter {
    /// How long an unknown run is looked for before giving up.
    pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);
    /// How often an unknown run is looked up again.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Creates a waiter over the given registry.
    pub fn new(registry: Arc<RunRegistry>) -> Self {
        Self {
            registry,
            grace: Self::DEFAULT_GRACE,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets how long a missing run is looked for before `RunNotFound`.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Sets the default lookup interval used while a run is missing.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Waits for the run and returns its recorded result.
    ///
    /// A failed run re-surfaces its error verbatim as `Err`.
    ///
    /// # Errors
    ///
    /// Besides the run's own error, returns [`WorkflowError::RunNotFound`]
    /// when the pair is still unknown after the grace period.
    pub async fn await_result(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
        poll_interval: Option<Duration>,
    ) -> StepResult {
        let run = self.await_run(workflow_id, run_id, poll_interval).await?;
        run.result().cloned().unwrap_or_else(|| {
            Err(WorkflowError::Configuration(format!(
                "Run '{run_id}' is terminal without a result"
            )))
        })
    }

    /// Waits for the run and returns its terminal snapshot.
    pub async fn await_run(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
        poll_interval: Option<Duration>,
    ) -> Result<Arc<WorkflowRun>, WorkflowError> {
        let poll_interval = poll_interval.unwrap_or(self.poll_interval);
        let mut receiver = self.locate(workflow_id, run_id, poll_interval).await?;

        let run = {
            let terminal = receiver
                .wait_for(|run| run.is_terminal())
                .await
                .map_err(|_| WorkflowError::RunNotFound {
                    workflow_id: workflow_id.clone(),
                    run_id: run_id.clone(),
                })?;
            Arc::clone(&terminal)
        };

        self.registry.mark_observed(run_id);
        debug!("Run '{}' observed in state {}", run_id, run.state());
        Ok(run)
    }

    async fn locate(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
        poll_interval: Duration,
    ) -> Result<watch::Receiver<Arc<WorkflowRun>>, WorkflowError> {
        let started = Instant::now();
        loop {
            match self.registry.subscribe(workflow_id, run_id) {
                Ok(receiver) => return Ok(receiver),
                Err(e) if started.elapsed() >= self.grace => return Err(e),
                Err(_) => {
                    debug!("Run '{}' not registered yet, retrying", run_id);
                    sleep(poll_interval).await;
                }
            }
        }
    }
}
