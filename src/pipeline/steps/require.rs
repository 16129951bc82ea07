use crate::error::StrataResult;
use crate::pipeline::{PipelineContext, PipelineStep};

/// Step that fails with `ContextMissingKey` unless every listed key is present
///
/// Placed in front of steps that depend on upstream values, so that a
/// misconfigured pipeline fails loudly instead of producing an empty response.
pub struct RequireKeysStep {
    id: String,
    keys: Vec<String>,
}

impl RequireKeysStep {
    pub fn new<I, S>(id: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl<R> PipelineStep<R> for RequireKeysStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self, context: &mut PipelineContext, _response: &mut R) -> StrataResult<()> {
        for key in &self.keys {
            context.get(key)?;
        }
        Ok(())
    }
}
