use super::context::{PipelineContext, REQUEST_KEY};
use super::core::ExecutionReport;
use super::events::PipelineListener;
use super::executor::ResolvedPipeline;
use super::registry::PipelineRegistry;
use crate::error::StrataResult;
use std::any::Any;
use std::sync::Arc;

/// Entry point used by domain code to run pipelines
///
/// Wraps a shared, read-only registry. Cloning the service is cheap and every
/// clone resolves against the same registry.
///
/// # Example
/// ```
/// use strata::pipeline::{PipelineDefinition, PipelineRegistry, PipelineService, REQUEST_KEY};
/// use strata::steps::FnStep;
///
/// let mut registry = PipelineRegistry::<String>::new();
/// registry
///     .register(
///         PipelineDefinition::builder("echo")
///             .add_step(FnStep::new("echo", |ctx, out: &mut String| {
///                 out.push_str(ctx.get_as::<String>(REQUEST_KEY)?);
///                 Ok(())
///             }))
///             .build()
///             .unwrap(),
///     )
///     .unwrap();
///
/// let service = PipelineService::new(registry);
/// let mut response = String::new();
/// service
///     .resolve_and_execute("echo", None, "ping".to_string(), &mut response)
///     .unwrap();
/// assert_eq!(response, "ping");
/// ```
pub struct PipelineService<R> {
    registry: Arc<PipelineRegistry<R>>,
    listener: Option<Arc<dyn PipelineListener>>,
}

impl<R> Clone for PipelineService<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            listener: self.listener.clone(),
        }
    }
}

impl<R> PipelineService<R> {
    /// Freeze `registry` and serve pipelines from it
    pub fn new(mut registry: PipelineRegistry<R>) -> Self {
        registry.freeze();
        Self::from_shared(Arc::new(registry))
    }

    /// Serve pipelines from an already shared registry
    pub fn from_shared(registry: Arc<PipelineRegistry<R>>) -> Self {
        Self {
            registry,
            listener: None,
        }
    }

    /// Report every execution to `listener`
    pub fn with_listener(mut self, listener: Arc<dyn PipelineListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn registry(&self) -> &PipelineRegistry<R> {
        &self.registry
    }

    /// See [`PipelineRegistry::resolve`]
    pub fn resolve(&self, name: &str, layer_key: Option<&str>) -> StrataResult<ResolvedPipeline<R>> {
        self.registry.resolve(name, layer_key)
    }

    /// See [`PipelineRegistry::get_pipeline`]
    pub fn get_pipeline(&self, name: &str, layer_key: Option<&str>) -> StrataResult<ResolvedPipeline<R>> {
        self.registry.get_pipeline(name, layer_key)
    }

    /// Run an already resolved pipeline
    pub fn execute(
        &self,
        pipeline: &ResolvedPipeline<R>,
        context: &mut PipelineContext,
        response: &mut R,
    ) -> StrataResult<ExecutionReport> {
        match &self.listener {
            Some(listener) => pipeline.execute_with_listener(context, response, listener.as_ref()),
            None => pipeline.execute(context, response),
        }
    }

    /// Resolve and run against a caller-prepared context
    pub fn execute_with_context(
        &self,
        name: &str,
        layer_key: Option<&str>,
        context: &mut PipelineContext,
        response: &mut R,
    ) -> StrataResult<ExecutionReport> {
        let pipeline = self.resolve(name, layer_key)?;
        self.execute(&pipeline, context, response)
    }

    /// Resolve `(name, layer_key)`, seed a fresh context with `request` under
    /// [`REQUEST_KEY`] and run the pipeline
    pub fn resolve_and_execute<Q>(
        &self,
        name: &str,
        layer_key: Option<&str>,
        request: Q,
        response: &mut R,
    ) -> StrataResult<ExecutionReport>
    where
        Q: Any + Send + Sync,
    {
        let pipeline = self.resolve(name, layer_key)?;
        let mut context = PipelineContext::new();
        context.put(REQUEST_KEY, request)?;
        self.execute(&pipeline, &mut context, response)
    }
}
