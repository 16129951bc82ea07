use super::context::PipelineContext;
use super::core::{ExecutionReport, ExecutionState, PipelineStep, StepReport};
use super::definition::{DelegateRef, PipelineDefinition, StepList};
use super::events::{timestamp, PipelineEvent, PipelineListener};
use crate::error::{StrataError, StrataResult};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// A pipeline ready to run, as returned by the registry
///
/// Keeps the identity of the definition that was resolved (name and layer key)
/// while exposing the effective step list, which for a delegate is the target's.
///
/// # Example
/// ```
/// use strata::pipeline::{PipelineContext, PipelineDefinition, PipelineRegistry};
/// use strata::steps::FnStep;
///
/// let mut registry = PipelineRegistry::<String>::new();
/// registry
///     .register(
///         PipelineDefinition::builder("renderTile")
///             .add_step(FnStep::new("a", |_ctx, out: &mut String| {
///                 out.push('a');
///                 Ok(())
///             }))
///             .build()
///             .unwrap(),
///     )
///     .unwrap();
///
/// let pipeline = registry.resolve("renderTile", None).unwrap();
/// let mut response = String::new();
/// let report = pipeline.execute(&mut PipelineContext::new(), &mut response).unwrap();
/// assert_eq!(response, "a");
/// assert_eq!(report.executed_steps(), 1);
/// ```
pub struct ResolvedPipeline<R> {
    definition: Arc<PipelineDefinition<R>>,
    delegate_target: Option<DelegateRef>,
    steps: StepList<R>,
}

impl<R> Clone for ResolvedPipeline<R> {
    fn clone(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            delegate_target: self.delegate_target.clone(),
            steps: Arc::clone(&self.steps),
        }
    }
}

impl<R> fmt::Debug for ResolvedPipeline<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPipeline")
            .field("name", &self.name())
            .field("layer_key", &self.layer_key())
            .field("delegate_target", &self.delegate_target)
            .field("steps", &self.step_ids())
            .finish()
    }
}

impl<R> ResolvedPipeline<R> {
    pub(crate) fn new(
        definition: Arc<PipelineDefinition<R>>,
        delegate_target: Option<DelegateRef>,
        steps: StepList<R>,
    ) -> Self {
        Self {
            definition,
            delegate_target,
            steps,
        }
    }

    /// Get the pipeline name
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Layer key of the resolved definition (`None` when the default was used)
    pub fn layer_key(&self) -> Option<&str> {
        self.definition.layer_key()
    }

    pub fn definition(&self) -> &PipelineDefinition<R> {
        &self.definition
    }

    /// The definition whose steps are used, if this one is a delegate
    pub fn delegate_target(&self) -> Option<&DelegateRef> {
        self.delegate_target.as_ref()
    }

    pub fn steps(&self) -> &[Arc<dyn PipelineStep<R>>] {
        &self.steps
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id()).collect()
    }

    /// Get the number of steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Sum of the steps' estimates; `None` unless every step has one
    pub fn estimated_duration(&self) -> Option<Duration> {
        self.steps
            .iter()
            .map(|s| s.estimated_duration())
            .sum::<Option<Duration>>()
    }

    /// Whether both pipelines run the very same step list
    pub fn shares_steps_with(&self, other: &ResolvedPipeline<R>) -> bool {
        Arc::ptr_eq(&self.steps, &other.steps)
    }

    /// Run the steps in order against `context` and `response`
    ///
    /// Stops at the first error, which is returned as `StepFailed` carrying the
    /// step id and pipeline identity. Stops successfully after any step that
    /// sets the context's finished flag.
    pub fn execute(&self, context: &mut PipelineContext, response: &mut R) -> StrataResult<ExecutionReport> {
        self.execute_internal(context, response, None)
    }

    /// Same as `execute()` but reports progress to `listener`
    pub fn execute_with_listener(
        &self,
        context: &mut PipelineContext,
        response: &mut R,
        listener: &dyn PipelineListener,
    ) -> StrataResult<ExecutionReport> {
        self.execute_internal(context, response, Some(listener))
    }

    fn execute_internal(
        &self,
        context: &mut PipelineContext,
        response: &mut R,
        listener: Option<&dyn PipelineListener>,
    ) -> StrataResult<ExecutionReport> {
        let total_steps = self.steps.len();
        let execution_id = context.execution_id();
        let mut state = ExecutionState::NotStarted;

        info!(
            pipeline = self.name(),
            layer_key = ?self.layer_key(),
            steps = total_steps,
            %execution_id,
            "Starting pipeline"
        );

        if let Some(listener) = listener {
            listener.on_event(&PipelineEvent::Started {
                execution_id,
                pipeline_name: self.name().to_string(),
                layer_key: self.layer_key().map(str::to_string),
                total_steps,
                state,
                timestamp: timestamp(),
            });
        }

        context.set_metadata("pipeline_name", self.name());
        match self.layer_key() {
            Some(layer_key) => context.set_metadata("layer_key", layer_key),
            None => {
                context.remove_metadata("layer_key");
            }
        }

        let started_at = Utc::now();
        let pipeline_start = Instant::now();
        let mut step_reports = Vec::with_capacity(total_steps);
        let mut finished_by = None;

        for (index, step) in self.steps.iter().enumerate() {
            let step_id = step.id();

            debug!(
                pipeline = self.name(),
                step = step_id,
                step_name = step.name(),
                index = index + 1,
                total = total_steps,
                %execution_id,
                "Executing step"
            );
            self.transition(&mut state, ExecutionState::Running);

            if let Some(listener) = listener {
                listener.on_event(&PipelineEvent::StepStarted {
                    execution_id,
                    pipeline_name: self.name().to_string(),
                    step_id: step_id.to_string(),
                    step_index: index,
                    total_steps,
                    state,
                    timestamp: timestamp(),
                });
            }

            let step_start = Instant::now();
            let result = step.execute(context, response);
            let duration = step_start.elapsed();

            if let Err(e) = result {
                self.transition(&mut state, ExecutionState::Failed);
                error!(
                    pipeline = self.name(),
                    layer_key = ?self.layer_key(),
                    step = step_id,
                    %execution_id,
                    error = %e,
                    "Step failed"
                );

                if let Some(listener) = listener {
                    listener.on_event(&PipelineEvent::Failed {
                        execution_id,
                        pipeline_name: self.name().to_string(),
                        failed_step: step_id.to_string(),
                        error: e.to_string(),
                        state,
                        timestamp: timestamp(),
                    });
                }

                debug!(
                    pipeline = self.name(),
                    ?state,
                    "Pipeline stopped"
                );
                return Err(StrataError::StepFailed {
                    pipeline: self.name().to_string(),
                    layer_key: self.layer_key().map(str::to_string),
                    step_id: step_id.to_string(),
                    source: Box::new(e),
                });
            }

            if let Some(listener) = listener {
                listener.on_event(&PipelineEvent::StepCompleted {
                    execution_id,
                    pipeline_name: self.name().to_string(),
                    step_id: step_id.to_string(),
                    step_index: index,
                    total_steps,
                    duration_ms: duration.as_millis() as u64,
                    state,
                    timestamp: timestamp(),
                });
            }

            step_reports.push(StepReport::success(step_id, duration));

            if context.is_finished() {
                debug!(
                    pipeline = self.name(),
                    step = step_id,
                    skipped = total_steps - index - 1,
                    "Step finished the pipeline early"
                );
                finished_by = Some(step_id.to_string());
                break;
            }
        }

        let terminal = if finished_by.is_some() {
            ExecutionState::FinishedEarly
        } else {
            ExecutionState::FinishedNormally
        };
        self.transition(&mut state, terminal);

        let total_duration = pipeline_start.elapsed();
        info!(
            pipeline = self.name(),
            layer_key = ?self.layer_key(),
            %execution_id,
            ?state,
            elapsed_ms = total_duration.as_millis() as u64,
            "Pipeline completed"
        );

        if let Some(listener) = listener {
            listener.on_event(&PipelineEvent::Completed {
                execution_id,
                pipeline_name: self.name().to_string(),
                steps_completed: step_reports.len(),
                state,
                total_duration_ms: total_duration.as_millis() as u64,
                timestamp: timestamp(),
            });
        }

        Ok(ExecutionReport {
            pipeline_name: self.name().to_string(),
            layer_key: self.layer_key().map(str::to_string),
            delegate_target: self
                .delegate_target
                .as_ref()
                .map(|t| (t.name.clone(), t.layer_key.clone())),
            execution_id,
            started_at,
            step_reports,
            finished_by,
            total_duration,
            state,
        })
    }

    fn transition(&self, state: &mut ExecutionState, next: ExecutionState) {
        debug_assert!(
            state.can_transition_to(next),
            "illegal execution state change {:?} -> {:?}",
            state,
            next
        );
        trace!(pipeline = self.name(), from = ?*state, to = ?next, "Execution state changed");
        *state = next;
    }
}
