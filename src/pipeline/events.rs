use super::core::ExecutionState;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// Event names - centralized for consistency
pub mod event_names {
    pub const PIPELINE_STARTED: &str = "pipeline:started";
    pub const PIPELINE_STEP_STARTED: &str = "pipeline:step-started";
    pub const PIPELINE_STEP_COMPLETED: &str = "pipeline:step-completed";
    pub const PIPELINE_COMPLETED: &str = "pipeline:completed";
    pub const PIPELINE_FAILED: &str = "pipeline:failed";
}

/// Progress of one execution, as reported to a [`PipelineListener`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PipelineEvent {
    #[serde(rename_all = "camelCase")]
    Started {
        execution_id: Uuid,
        pipeline_name: String,
        layer_key: Option<String>,
        total_steps: usize,
        state: ExecutionState,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    StepStarted {
        execution_id: Uuid,
        pipeline_name: String,
        step_id: String,
        step_index: usize,
        total_steps: usize,
        state: ExecutionState,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    StepCompleted {
        execution_id: Uuid,
        pipeline_name: String,
        step_id: String,
        step_index: usize,
        total_steps: usize,
        duration_ms: u64,
        state: ExecutionState,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        execution_id: Uuid,
        pipeline_name: String,
        steps_completed: usize,
        state: ExecutionState,
        total_duration_ms: u64,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        execution_id: Uuid,
        pipeline_name: String,
        failed_step: String,
        error: String,
        state: ExecutionState,
        timestamp: String,
    },
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Started { .. } => event_names::PIPELINE_STARTED,
            PipelineEvent::StepStarted { .. } => event_names::PIPELINE_STEP_STARTED,
            PipelineEvent::StepCompleted { .. } => event_names::PIPELINE_STEP_COMPLETED,
            PipelineEvent::Completed { .. } => event_names::PIPELINE_COMPLETED,
            PipelineEvent::Failed { .. } => event_names::PIPELINE_FAILED,
        }
    }

    pub fn execution_id(&self) -> Uuid {
        match self {
            PipelineEvent::Started { execution_id, .. }
            | PipelineEvent::StepStarted { execution_id, .. }
            | PipelineEvent::StepCompleted { execution_id, .. }
            | PipelineEvent::Completed { execution_id, .. }
            | PipelineEvent::Failed { execution_id, .. } => *execution_id,
        }
    }

    /// Execution state at the time of the event
    pub fn state(&self) -> ExecutionState {
        match self {
            PipelineEvent::Started { state, .. }
            | PipelineEvent::StepStarted { state, .. }
            | PipelineEvent::StepCompleted { state, .. }
            | PipelineEvent::Completed { state, .. }
            | PipelineEvent::Failed { state, .. } => *state,
        }
    }
}

/// Observer of pipeline executions
///
/// Listeners are shared by concurrent executions and must not block for long;
/// the executor calls them inline.
pub trait PipelineListener: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Listener that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.name()).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl PipelineListener for RecordingListener {
    fn on_event(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
