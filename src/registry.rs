//! Process-wide map of runs.

use crate::error::WorkflowError;
use crate::identity::{RunId, WorkflowId};
use crate::run::{StepRecord, WorkflowRun};
use crate::step::StepResult;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

struct RunEntry {
    sender: watch::Sender<Arc<WorkflowRun>>,
    observed: AtomicBool,
}

impl RunEntry {
    fn snapshot(&self) -> Arc<WorkflowRun> {
        Arc::clone(&self.sender.borrow())
    }
}

/// Maps run identities to their latest [`WorkflowRun`] snapshot.
///
/// Each run lives behind a `watch` channel: writers replace the whole
/// snapshot in one step and waiters subscribe to changes. Once a run is
/// terminal its snapshot is never replaced again, so repeated lookups return
/// the same `Arc`.
pub struct RunRegistry {
    runs: RwLock<HashMap<RunId, Arc<RunEntry>>>,
    sequence: AtomicU64,
}

impl fmt::Debug for RunRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunRegistry")
            .field("runs", &self.len())
            .finish()
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Registers a new pending run with a generated identity.
    pub fn register(&self, workflow_id: &WorkflowId) -> Result<RunId, WorkflowError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.register_with_id(workflow_id, RunId::generate(workflow_id, sequence))
    }

    /// Registers a new pending run under a caller-chosen identity.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::DuplicateRun`] if the identity is already
    /// present. The existing run is left untouched.
    pub fn register_with_id(
        &self,
        workflow_id: &WorkflowId,
        run_id: RunId,
    ) -> Result<RunId, WorkflowError> {
        let mut runs = self.write();
        if runs.contains_key(&run_id) {
            return Err(WorkflowError::DuplicateRun(run_id));
        }

        let run = WorkflowRun::pending(workflow_id.clone(), run_id.clone());
        let (sender, _) = watch::channel(Arc::new(run));
        runs.insert(
            run_id.clone(),
            Arc::new(RunEntry {
                sender,
                observed: AtomicBool::new(false),
            }),
        );
        debug!("Registered run '{}' for workflow '{}'", run_id, workflow_id);
        Ok(run_id)
    }

    /// Returns the latest snapshot of a run.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::RunNotFound`] if the run is unknown or
    /// belongs to a different workflow.
    pub fn get(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
    ) -> Result<Arc<WorkflowRun>, WorkflowError> {
        Ok(self.entry_for(workflow_id, run_id)?.snapshot())
    }

    /// Returns snapshots of every registered run.
    pub fn list(&self) -> Vec<Arc<WorkflowRun>> {
        self.read().values().map(|entry| entry.snapshot()).collect()
    }

    /// Returns the number of registered runs.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if no run is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Publishes the terminal result of a running run.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidTransition`] unless the run is
    /// `Running`; a terminal run is never overwritten.
    pub(crate) fn mark_terminal(
        &self,
        run_id: &RunId,
        result: StepResult,
    ) -> Result<Arc<WorkflowRun>, WorkflowError> {
        self.update(run_id, |run| run.completed(result))
    }

    /// Removes terminal runs that were observed by a waiter or completed
    /// more than `retention` ago. Returns how many runs were removed.
    pub fn prune(&self, retention: Duration) -> usize {
        let now = Utc::now();
        let mut runs = self.write();
        let before = runs.len();

        runs.retain(|_, entry| {
            let run = entry.snapshot();
            let Some(completed_at) = run.completed_at() else {
                return true;
            };
            let expired = (now - completed_at)
                .to_std()
                .map(|age| age >= retention)
                .unwrap_or(false);
            !(expired || entry.observed.load(Ordering::Acquire))
        });

        let removed = before - runs.len();
        if removed > 0 {
            debug!("Pruned {} terminal runs", removed);
        }
        removed
    }

    pub(crate) fn mark_running(&self, run_id: &RunId) -> Result<Arc<WorkflowRun>, WorkflowError> {
        self.update(run_id, WorkflowRun::started)
    }

    pub(crate) fn record_step(
        &self,
        run_id: &RunId,
        record: StepRecord,
    ) -> Result<Arc<WorkflowRun>, WorkflowError> {
        self.update(run_id, |run| run.with_step(record))
    }

    pub(crate) fn subscribe(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
    ) -> Result<watch::Receiver<Arc<WorkflowRun>>, WorkflowError> {
        Ok(self.entry_for(workflow_id, run_id)?.sender.subscribe())
    }

    /// Records that the run's result has been delivered to a caller, making
    /// it eligible for [`prune`](Self::prune).
    pub(crate) fn mark_observed(&self, run_id: &RunId) {
        if let Some(entry) = self.read().get(run_id) {
            entry.observed.store(true, Ordering::Release);
        }
    }

    /// Applies a state-machine transition and publishes the new snapshot.
    ///
    /// The transition runs while the channel's value is locked, so two
    /// updates to the same run can never interleave.
    fn update<F>(&self, run_id: &RunId, transition: F) -> Result<Arc<WorkflowRun>, WorkflowError>
    where
        F: FnOnce(&WorkflowRun) -> Result<WorkflowRun, WorkflowError>,
    {
        let entry = self.read().get(run_id).cloned().ok_or_else(|| {
            WorkflowError::Configuration(format!("Run '{run_id}' is not registered"))
        })?;

        let mut outcome = Err(WorkflowError::Configuration(format!(
            "Run '{run_id}' was not updated"
        )));
        entry.sender.send_if_modified(|current| match transition(&**current) {
            Ok(next) => {
                *current = Arc::new(next);
                outcome = Ok(Arc::clone(current));
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    fn entry_for(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
    ) -> Result<Arc<RunEntry>, WorkflowError> {
        self.read()
            .get(run_id)
            .filter(|entry| entry.sender.borrow().workflow_id() == workflow_id)
            .cloned()
            .ok_or_else(|| WorkflowError::RunNotFound {
                workflow_id: workflow_id.clone(),
                run_id: run_id.clone(),
            })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<RunId, Arc<RunEntry>>> {
        self.runs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RunId, Arc<RunEntry>>> {
        self.runs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
