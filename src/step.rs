//! Step names, deadlines and the payload function trait.

use crate::error::WorkflowError;
use crate::identity::string_newtype;
use crate::input::{StepInput, StepOutput};
use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::future::Future;
use std::time::Duration;

string_newtype!(
    /// Type-safe step name wrapper.
    ///
    /// A step name resolves to a registered [`StepFunction`].
    ///
    /// ```
    /// use speechflow::StepName;
    ///
    /// let name = StepName::new("text_to_speech");
    /// assert_eq!(name.as_str(), "text_to_speech");
    ///
    /// let name: StepName = "isolate_audio".into();
    /// ```
    StepName
);

/// Outcome of a single step: the payload's mapping or the recorded error.
pub type StepResult = Result<StepOutput, WorkflowError>;

/// Start-to-close time budget for one step invocation.
///
/// When it elapses the step fails with [`WorkflowError::Timeout`] no matter
/// what the payload does afterwards.
///
/// ```
/// use speechflow::Deadline;
/// use std::time::Duration;
///
/// assert_eq!(Deadline::default().as_duration(), Duration::from_secs(120));
/// assert_eq!(Deadline::from_secs(5).as_duration(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(Duration);

impl Deadline {
    /// Default deadline used by both speech workflows.
    pub const DEFAULT: Deadline = Deadline(Duration::from_secs(120));

    /// Creates a deadline from a duration.
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// Creates a deadline of whole seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Returns the deadline as a duration.
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<Duration> for Deadline {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// A named unit of work a step executes.
///
/// Implementations validate their own input and either return a mapping or
/// fail with an error carrying a human-readable message.
///
/// # Examples
///
/// ```
/// use speechflow::{StepFunction, StepInput, StepName, StepOutput, WorkflowError};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct Shout;
///
/// #[async_trait]
/// impl StepFunction for Shout {
///     async fn call(&self, input: StepInput) -> Result<StepOutput, WorkflowError> {
///         let text = input
///             .get_str("text")
///             .ok_or_else(|| WorkflowError::Validation("Text is empty.".into()))?;
///         Ok(StepOutput::new().with("text", text.to_uppercase()))
///     }
///
///     fn name(&self) -> StepName {
///         StepName::new("shout")
///     }
/// }
/// ```
#[async_trait]
pub trait StepFunction: Send + Sync + Debug {
    /// Runs the payload.
    ///
    /// # Returns
    ///
    /// - `Ok(output)` - the step succeeded
    /// - `Err(error)` - the step failed; the owning run fails with this error
    async fn call(&self, input: StepInput) -> Result<StepOutput, WorkflowError>;

    /// Returns the name the function is registered under.
    fn name(&self) -> StepName;
}

/// Adapts an async closure into a [`StepFunction`].
///
/// ```
/// use speechflow::{step_fn, StepFunction, StepOutput};
///
/// let echo = step_fn("echo", |input| async move {
///     Ok(StepOutput::new().with("keys", input.len()))
/// });
/// assert_eq!(echo.name(), "echo");
/// ```
pub fn step_fn<F, Fut>(name: impl Into<StepName>, f: F) -> FnStep<F>
where
    F: Fn(StepInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StepOutput, WorkflowError>> + Send + 'static,
{
    FnStep {
        name: name.into(),
        f,
    }
}

/// Closure-backed step function created by [`step_fn`].
pub struct FnStep<F> {
    name: StepName,
    f: F,
}

impl<F> Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> StepFunction for FnStep<F>
where
    F: Fn(StepInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StepOutput, WorkflowError>> + Send + 'static,
{
    async fn call(&self, input: StepInput) -> Result<StepOutput, WorkflowError> {
        (self.f)(input).await
    }

    fn name(&self) -> StepName {
        self.name.clone()
    }
}
