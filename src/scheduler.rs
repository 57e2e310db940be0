//! Front door: accepts start requests and hands runs to the runtime.

use crate::error::WorkflowError;
use crate::executor::StepExecutor;
use crate::identity::{RunId, WorkflowId};
use crate::registry::RunRegistry;
use crate::run;
use crate::step::StepFunction;
use crate::waiter::ResultWaiter;
use crate::workflow::Workflow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Starts workflow runs without waiting for them.
///
/// Construct one per process with [`Scheduler::builder`] and pass it to
/// whatever needs to start runs; it owns no global state.
///
/// # Examples
///
/// ```
/// use speechflow::{step_fn, Scheduler, StepInput, StepOutput, Workflow, WorkflowId};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), speechflow::WorkflowError> {
/// let scheduler = Scheduler::builder()
///     .function(step_fn("greet", |_input| async {
///         Ok(StepOutput::new().with("greeting", "hello"))
///     }))
///     .workflow(
///         Workflow::builder("GreetingWorkflow")
///             .step("greet", StepInput::new())
///             .build()?,
///     )
///     .build()?;
///
/// let workflow_id = WorkflowId::new("GreetingWorkflow");
/// let run_id = scheduler.schedule_workflow(&workflow_id, None)?;
/// let output = scheduler.waiter().await_result(&workflow_id, &run_id, None).await?;
/// assert_eq!(output.get("greeting"), Some(&serde_json::json!("hello")));
/// # Ok(())
/// # }
/// ```
pub struct Scheduler {
    registry: Arc<RunRegistry>,
    executor: Arc<StepExecutor>,
    workflows: HashMap<WorkflowId, Arc<Workflow>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("workflows", &self.workflows.keys().collect::<Vec<_>>())
            .field("executor", &self.executor)
            .field("registry", &self.registry)
            .finish()
    }
}

impl Scheduler {
    /// Creates a new scheduler builder.
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Registers a run of `workflow_id` and starts it in the background.
    ///
    /// Returns as soon as the run is registered and spawned. When `run_id`
    /// is `None` a timestamp-derived identity is generated. Must be called
    /// from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::UnknownWorkflow`] if the workflow is not registered
    /// - [`WorkflowError::DuplicateRun`] if `run_id` is already in use
    /// - [`WorkflowError::Configuration`] outside a Tokio runtime
    pub fn schedule_workflow(
        &self,
        workflow_id: &WorkflowId,
        run_id: Option<RunId>,
    ) -> Result<RunId, WorkflowError> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownWorkflow(workflow_id.clone()))?;
        let runtime = Handle::try_current()
            .map_err(|e| WorkflowError::Configuration(format!("no Tokio runtime: {e}")))?;

        let run_id = match run_id {
            Some(run_id) => self.registry.register_with_id(workflow_id, run_id)?,
            None => self.registry.register(workflow_id)?,
        };

        runtime.spawn(run::drive(
            workflow,
            Arc::clone(&self.executor),
            Arc::clone(&self.registry),
            run_id.clone(),
        ));
        info!("Scheduled workflow '{}' as run '{}'", workflow_id, run_id);
        Ok(run_id)
    }

    /// Returns a result waiter sharing this scheduler's registry.
    pub fn waiter(&self) -> ResultWaiter {
        ResultWaiter::new(Arc::clone(&self.registry))
    }

    /// Returns the run registry.
    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Returns the step executor.
    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    /// Returns an iterator over registered workflow identities.
    pub fn workflow_ids(&self) -> impl Iterator<Item = &WorkflowId> {
        self.workflows.keys()
    }

    /// Returns `true` if a workflow with the given identity is registered.
    pub fn has_workflow(&self, workflow_id: &str) -> bool {
        self.workflows.contains_key(workflow_id)
    }

    /// Spawns a task that prunes retained runs every `interval`.
    ///
    /// A zero interval is raised to one millisecond.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Configuration`] outside a Tokio runtime.
    pub fn spawn_pruner(
        &self,
        interval: Duration,
        retention: Duration,
    ) -> Result<JoinHandle<()>, WorkflowError> {
        let runtime = Handle::try_current()
            .map_err(|e| WorkflowError::Configuration(format!("no Tokio runtime: {e}")))?;
        let registry = Arc::clone(&self.registry);
        let interval = interval.max(Duration::from_millis(1));
        Ok(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = registry.prune(retention);
                if removed > 0 {
                    debug!("Pruner removed {} runs", removed);
                }
            }
        }))
    }
}

/// Builder for constructing a [`Scheduler`].
///
/// Registration problems are collected and reported by [`build`](Self::build).
pub struct SchedulerBuilder {
    registry: Option<Arc<RunRegistry>>,
    executor: StepExecutor,
    workflows: HashMap<WorkflowId, Arc<Workflow>>,
    error: Option<WorkflowError>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            registry: None,
            executor: StepExecutor::new(),
            workflows: HashMap::new(),
            error: None,
        }
    }

    /// Uses an existing registry instead of creating a new one.
    pub fn registry(mut self, registry: Arc<RunRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Registers a payload function.
    pub fn function<F: StepFunction + 'static>(self, function: F) -> Self {
        self.function_arc(Arc::new(function))
    }

    /// Registers an already shared payload function.
    pub fn function_arc(mut self, function: Arc<dyn StepFunction>) -> Self {
        if let Err(e) = self.executor.register_arc(function) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Registers a workflow definition.
    pub fn workflow(mut self, workflow: Workflow) -> Self {
        let id = workflow.id().clone();
        if self.workflows.contains_key(&id) {
            self.error.get_or_insert(WorkflowError::Configuration(format!(
                "Workflow '{id}' is already registered"
            )));
            return self;
        }
        self.workflows.insert(id, Arc::new(workflow));
        self
    }

    /// Builds the scheduler.
    ///
    /// # Errors
    ///
    /// - the first duplicate function or workflow registration
    /// - [`WorkflowError::StepNotFound`] if a workflow step names an
    ///   unregistered function
    pub fn build(self) -> Result<Scheduler, WorkflowError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        for workflow in self.workflows.values() {
            if let Some(plan) = workflow
                .steps()
                .iter()
                .find(|plan| !self.executor.has_function(plan.step_name.as_str()))
            {
                return Err(WorkflowError::StepNotFound(plan.step_name.clone()));
            }
        }

        Ok(Scheduler {
            registry: self.registry.unwrap_or_default(),
            executor: Arc::new(self.executor),
            workflows: self.workflows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::input::{StepInput, StepOutput};
    use crate::run::RunState;
    use crate::step::step_fn;

    fn scheduler() -> Scheduler {
        Scheduler::builder()
            .function(step_fn("noop", |_input| async { Ok(StepOutput::new()) }))
            .workflow(
                Workflow::builder("NoopWorkflow")
                    .step("noop", StepInput::new())
                    .build()
                    .expect("valid workflow"),
            )
            .build()
            .expect("valid scheduler")
    }

    #[tokio::test]
    async fn test_schedule_returns_before_completion() {
        let scheduler = Scheduler::builder()
            .function(step_fn("sleepy", |_input| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(StepOutput::new())
            }))
            .workflow(
                Workflow::builder("SleepyWorkflow")
                    .step("sleepy", StepInput::new())
                    .build()
                    .expect("valid workflow"),
            )
            .build()
            .expect("valid scheduler");

        let workflow_id = WorkflowId::new("SleepyWorkflow");
        let run_id = scheduler
            .schedule_workflow(&workflow_id, None)
            .expect("scheduled");

        let run = scheduler
            .registry()
            .get(&workflow_id, &run_id)
            .expect("registered");
        assert!(!run.is_terminal());

        let run = scheduler
            .waiter()
            .await_run(&workflow_id, &run_id, None)
            .await
            .expect("terminal");
        assert_eq!(run.state(), RunState::Succeeded);
    }

    #[tokio::test]
    async fn test_unknown_workflow_rejected() {
        let err = scheduler()
            .schedule_workflow(&WorkflowId::new("Missing"), None)
            .expect_err("not registered");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_explicit_run_id_is_used() {
        let scheduler = scheduler();
        let workflow_id = WorkflowId::new("NoopWorkflow");
        let run_id = scheduler
            .schedule_workflow(&workflow_id, Some(RunId::new("1700000000000-NoopWorkflow")))
            .expect("scheduled");
        assert_eq!(run_id, "1700000000000-NoopWorkflow");
    }

    #[test]
    fn test_build_rejects_unresolved_step() {
        let result = Scheduler::builder()
            .workflow(
                Workflow::builder("Orphan")
                    .step("missing", StepInput::new())
                    .build()
                    .expect("valid workflow"),
            )
            .build();
        assert!(matches!(result, Err(WorkflowError::StepNotFound(_))));
    }

    #[test]
    fn test_build_rejects_duplicate_workflow() {
        let workflow = Workflow::builder("Twice")
            .step("noop", StepInput::new())
            .build()
            .expect("valid workflow");
        let result = Scheduler::builder()
            .function(step_fn("noop", |_input| async { Ok(StepOutput::new()) }))
            .workflow(workflow.clone())
            .workflow(workflow)
            .build();
        assert!(matches!(result, Err(WorkflowError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_pruner_removes_observed_runs() {
        let scheduler = scheduler();
        let workflow_id = WorkflowId::new("NoopWorkflow");
        let run_id = scheduler
            .schedule_workflow(&workflow_id, None)
            .expect("scheduled");
        scheduler
            .waiter()
            .await_run(&workflow_id, &run_id, None)
            .await
            .expect("terminal");

        let pruner = scheduler
            .spawn_pruner(Duration::from_millis(10), Duration::from_secs(3600))
            .expect("inside a runtime");
        tokio::time::sleep(Duration::from_millis(100)).await;
        pruner.abort();
        assert!(scheduler.registry().is_empty());
    }

    #[test]
    fn test_pruner_outside_runtime_is_configuration_error() {
        let err = scheduler()
            .spawn_pruner(Duration::from_secs(1), Duration::from_secs(1))
            .expect_err("no runtime");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_schedule_outside_runtime_is_configuration_error() {
        let err = scheduler()
            .schedule_workflow(&WorkflowId::new("NoopWorkflow"), None)
            .expect_err("no runtime");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
