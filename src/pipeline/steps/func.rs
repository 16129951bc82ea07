use crate::error::StrataResult;
use crate::pipeline::{PipelineContext, PipelineStep};
use std::fmt;

type StepFn<R> = dyn Fn(&mut PipelineContext, &mut R) -> StrataResult<()> + Send + Sync;

/// Step backed by a closure
///
/// # Example
/// ```
/// use strata::pipeline::{PipelineContext, PipelineStep};
/// use strata::steps::FnStep;
///
/// let step = FnStep::new("greet", |_ctx, out: &mut String| {
///     out.push_str("hello");
///     Ok(())
/// });
///
/// let mut response = String::new();
/// step.execute(&mut PipelineContext::new(), &mut response).unwrap();
/// assert_eq!(response, "hello");
/// ```
pub struct FnStep<R> {
    id: String,
    name: Option<String>,
    func: Box<StepFn<R>>,
}

impl<R> FnStep<R> {
    pub fn new<F>(id: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut PipelineContext, &mut R) -> StrataResult<()> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: None,
            func: Box::new(func),
        }
    }

    /// Set a display name distinct from the id
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl<R> fmt::Debug for FnStep<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<R> PipelineStep<R> for FnStep<R> {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self, context: &mut PipelineContext, response: &mut R) -> StrataResult<()> {
        (self.func)(context, response)
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
