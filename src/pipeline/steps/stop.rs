use crate::error::StrataResult;
use crate::pipeline::{PipelineContext, PipelineStep};
use tracing::debug;

type Condition = dyn Fn(&PipelineContext) -> bool + Send + Sync;

/// Step that finishes the pipeline early
///
/// Without a condition the step always stops; with one it stops only when the
/// condition holds. Stopping is a successful outcome, the remaining steps are
/// simply not run.
///
/// # Context Requirements
/// - Whatever the condition reads; the step itself writes nothing
///
/// # Example
/// ```
/// use strata::pipeline::{PipelineContext, PipelineStep};
/// use strata::steps::StopStep;
///
/// let step = StopStep::when("cached", |ctx| ctx.contains_key("cached_tile"));
///
/// let mut context = PipelineContext::new();
/// context.put("cached_tile", vec![0u8; 4]).unwrap();
/// PipelineStep::<()>::execute(&step, &mut context, &mut ()).unwrap();
/// assert!(context.is_finished());
/// ```
pub struct StopStep {
    id: String,
    condition: Option<Box<Condition>>,
}

impl StopStep {
    /// Stop unconditionally
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            condition: None,
        }
    }

    /// Stop when `condition` returns true
    pub fn when<F>(id: impl Into<String>, condition: F) -> Self
    where
        F: Fn(&PipelineContext) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            condition: Some(Box::new(condition)),
        }
    }

    /// Stop when the context holds a `bool` under `key` that is `true`
    pub fn when_flag(id: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self::when(id, move |ctx| {
            matches!(ctx.get_optional_as::<bool>(&key), Ok(Some(&true)))
        })
    }
}

impl<R> PipelineStep<R> for StopStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self, context: &mut PipelineContext, _response: &mut R) -> StrataResult<()> {
        let stop = self
            .condition
            .as_ref()
            .map(|condition| condition(&*context))
            .unwrap_or(true);

        if stop {
            debug!(
                step = %self.id,
                execution_id = %context.execution_id(),
                "Stop condition met"
            );
            context.set_finished(true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(step: &StopStep, context: &mut PipelineContext) {
        PipelineStep::<String>::execute(step, context, &mut String::new()).unwrap();
    }

    #[test]
    fn test_unconditional_stop() {
        let mut context = PipelineContext::new();
        run(&StopStep::new("stop"), &mut context);
        assert!(context.is_finished());
    }

    #[test]
    fn test_condition_not_met() {
        let step = StopStep::when("stop", |ctx| ctx.contains_key("done"));
        let mut context = PipelineContext::new();
        run(&step, &mut context);
        assert!(!context.is_finished());
    }

    #[test]
    fn test_flag_condition() {
        let step = StopStep::when_flag("stop", "skip_render");

        let mut context = PipelineContext::new();
        context.put("skip_render", false).unwrap();
        run(&step, &mut context);
        assert!(!context.is_finished());

        context.put("skip_render", true).unwrap();
        run(&step, &mut context);
        assert!(context.is_finished());
    }

    #[test]
    fn test_flag_of_wrong_type_does_not_stop() {
        let step = StopStep::when_flag("stop", "skip_render");
        let mut context = PipelineContext::new();
        context.put("skip_render", "yes".to_string()).unwrap();
        run(&step, &mut context);
        assert!(!context.is_finished());
    }
}
