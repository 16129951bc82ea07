use crate::error::StrataResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::context::PipelineContext;

/// A single step in a pipeline
///
/// Steps are built once at configuration time and may be invoked by many
/// executions at the same time, so they must not keep per-call state in their
/// own fields. Anything an execution needs to carry between steps goes into the
/// [`PipelineContext`]; the caller's output goes into `response`.
///
/// # Example
/// ```
/// use strata::error::StrataResult;
/// use strata::pipeline::{PipelineContext, PipelineStep};
///
/// struct Append(&'static str);
///
/// impl PipelineStep<String> for Append {
///     fn id(&self) -> &str {
///         self.0
///     }
///
///     fn execute(&self, _context: &mut PipelineContext, response: &mut String) -> StrataResult<()> {
///         response.push_str(self.0);
///         Ok(())
///     }
/// }
/// ```
pub trait PipelineStep<R>: Send + Sync {
    /// Identifier, unique within one resolved step list
    fn id(&self) -> &str;

    /// Execute this step
    ///
    /// Returning an error stops the pipeline; the executor annotates it with
    /// the step id and pipeline identity. Calling `context.set_finished(true)`
    /// stops the pipeline successfully after this step.
    fn execute(&self, context: &mut PipelineContext, response: &mut R) -> StrataResult<()>;

    /// Human readable name for logging
    fn name(&self) -> &str {
        self.id()
    }

    /// Get estimated duration for diagnostics
    ///
    /// Returns `None` if duration cannot be estimated.
    fn estimated_duration(&self) -> Option<Duration> {
        None
    }
}

/// Lifecycle of one pipeline execution
///
/// `NotStarted -> Running -> {FinishedNormally | FinishedEarly | Failed}`
///
/// `Running` is re-entered once per step. An empty pipeline goes straight from
/// `NotStarted` to `FinishedNormally`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionState {
    NotStarted,
    Running,
    /// Every step ran
    FinishedNormally,
    /// A step set the finished flag
    FinishedEarly,
    Failed,
}

impl ExecutionState {
    /// Whether an execution may move from `self` to `next`
    pub fn can_transition_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (*self, next),
            (NotStarted, Running)
                | (NotStarted, FinishedNormally)
                | (Running, Running)
                | (Running, FinishedNormally)
                | (Running, FinishedEarly)
                | (Running, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::FinishedNormally
                | ExecutionState::FinishedEarly
                | ExecutionState::Failed
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecutionState::FinishedNormally | ExecutionState::FinishedEarly
        )
    }
}

/// Result of a single step execution
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step_id: String,

    /// Duration of execution
    pub duration: Duration,
}

impl StepReport {
    pub fn success(step_id: impl Into<String>, duration: Duration) -> Self {
        Self {
            step_id: step_id.into(),
            duration,
        }
    }
}

/// Diagnostics for a completed pipeline execution
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub pipeline_name: String,

    /// Layer key of the definition that was resolved (`None` for the default)
    pub layer_key: Option<String>,

    /// `(name, layer_key)` of the delegate target, when the steps came from one
    pub delegate_target: Option<(String, Option<String>)>,

    pub execution_id: Uuid,

    pub started_at: DateTime<Utc>,

    /// Results from each step that ran, in order
    pub step_reports: Vec<StepReport>,

    /// Step that set the finished flag, if the run stopped early
    pub finished_by: Option<String>,

    pub total_duration: Duration,

    pub state: ExecutionState,
}

impl ExecutionReport {
    /// Get the number of steps that were executed
    pub fn executed_steps(&self) -> usize {
        self.step_reports.len()
    }

    /// Ids of the executed steps, in execution order
    pub fn executed_step_ids(&self) -> Vec<&str> {
        self.step_reports
            .iter()
            .map(|r| r.step_id.as_str())
            .collect()
    }

    pub fn finished_early(&self) -> bool {
        self.state == ExecutionState::FinishedEarly
    }
}
