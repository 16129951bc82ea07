use crate::error::{StrataError, StrataResult};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::core::PipelineStep;

/// Shared, immutable step list
///
/// A delegate resolves to its target's list by cloning this `Arc`, never the
/// steps themselves.
pub type StepList<R> = Arc<Vec<Arc<dyn PipelineStep<R>>>>;

/// Named insertion point declared by a default definition
///
/// Layer definitions that claim the slot must contain every required step id,
/// in this relative order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSlot {
    pub name: String,
    pub required_steps: Vec<String>,
}

impl ExtensionSlot {
    pub fn new<I, S>(name: impl Into<String>, required_steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            required_steps: required_steps.into_iter().map(Into::into).collect(),
        }
    }

    /// First required step id that cannot be matched, in order, within `step_ids`
    ///
    /// Non-required steps may sit anywhere between the required ones.
    pub fn first_missing<'a, I>(&self, step_ids: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ids = step_ids.into_iter();
        self.required_steps
            .iter()
            .find(|required| !ids.any(|id| id == required.as_str()))
            .map(|s| s.as_str())
    }
}

/// Reference from a delegate definition to the definition whose steps it reuses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DelegateRef {
    pub name: String,
    pub layer_key: Option<String>,
}

pub(crate) enum DefinitionBody<R> {
    Steps(StepList<R>),
    Delegate(DelegateRef),
}

/// An ordered, named list of steps, optionally scoped to a layer key
///
/// Built with [`PipelineDefinition::builder`]. Once built a definition is
/// immutable.
pub struct PipelineDefinition<R> {
    name: String,
    layer_key: Option<String>,
    body: DefinitionBody<R>,
    extension_slots: Vec<ExtensionSlot>,
    implements: Vec<String>,
}

impl<R> PipelineDefinition<R> {
    /// Create a new definition builder
    pub fn builder(name: impl Into<String>) -> PipelineDefinitionBuilder<R> {
        PipelineDefinitionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` for the default definition of this name
    pub fn layer_key(&self) -> Option<&str> {
        self.layer_key.as_deref()
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self.body, DefinitionBody::Delegate(_))
    }

    pub fn delegate(&self) -> Option<&DelegateRef> {
        match &self.body {
            DefinitionBody::Delegate(target) => Some(target),
            DefinitionBody::Steps(_) => None,
        }
    }

    /// Own steps; `None` for a delegate
    pub fn steps(&self) -> Option<&StepList<R>> {
        match &self.body {
            DefinitionBody::Steps(steps) => Some(steps),
            DefinitionBody::Delegate(_) => None,
        }
    }

    pub fn extension_slots(&self) -> &[ExtensionSlot] {
        &self.extension_slots
    }

    pub fn extension_slot(&self, name: &str) -> Option<&ExtensionSlot> {
        self.extension_slots.iter().find(|slot| slot.name == name)
    }

    /// Names of the slots this definition claims to satisfy
    pub fn implements(&self) -> &[String] {
        &self.implements
    }

    pub(crate) fn key(&self) -> (String, Option<String>) {
        (self.name.clone(), self.layer_key.clone())
    }
}

impl<R> fmt::Debug for PipelineDefinition<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("PipelineDefinition");
        debug
            .field("name", &self.name)
            .field("layer_key", &self.layer_key);
        match &self.body {
            DefinitionBody::Steps(steps) => {
                let ids: Vec<&str> = steps.iter().map(|s| s.id()).collect();
                debug.field("steps", &ids);
            }
            DefinitionBody::Delegate(target) => {
                debug.field("delegate", target);
            }
        }
        debug
            .field("extension_slots", &self.extension_slots)
            .field("implements", &self.implements)
            .finish()
    }
}

/// Builder for constructing pipeline definitions
///
/// # Example
/// ```
/// use strata::pipeline::PipelineDefinition;
///
/// let alias = PipelineDefinition::<String>::builder("getConfiguration")
///     .layer("roads")
///     .delegate_to("getConfiguration", None)
///     .build()
///     .unwrap();
/// assert!(alias.is_delegate());
/// ```
pub struct PipelineDefinitionBuilder<R> {
    name: String,
    layer_key: Option<String>,
    steps: Vec<Arc<dyn PipelineStep<R>>>,
    delegate: Option<DelegateRef>,
    extension_slots: Vec<ExtensionSlot>,
    implements: Vec<String>,
}

impl<R> PipelineDefinitionBuilder<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layer_key: None,
            steps: Vec::new(),
            delegate: None,
            extension_slots: Vec::new(),
            implements: Vec::new(),
        }
    }

    /// Scope the definition to a layer key
    pub fn layer(mut self, layer_key: impl Into<String>) -> Self {
        self.layer_key = Some(layer_key.into());
        self
    }

    /// Scope the definition to an optional layer key (`None` = default)
    pub fn layer_key(mut self, layer_key: Option<String>) -> Self {
        self.layer_key = layer_key;
        self
    }

    /// Add a step to the pipeline
    pub fn add_step<S: PipelineStep<R> + 'static>(mut self, step: S) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Add an already shared step
    pub fn add_shared_step(mut self, step: Arc<dyn PipelineStep<R>>) -> Self {
        self.steps.push(step);
        self
    }

    /// Reuse the steps of another definition instead of declaring any
    pub fn delegate_to(mut self, name: impl Into<String>, layer_key: Option<&str>) -> Self {
        self.delegate = Some(DelegateRef {
            name: name.into(),
            layer_key: layer_key.map(str::to_string),
        });
        self
    }

    pub fn extension_slot<I, S>(mut self, name: impl Into<String>, required_steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extension_slots
            .push(ExtensionSlot::new(name, required_steps));
        self
    }

    /// Claim that this definition satisfies a slot declared by the default definition
    pub fn implements(mut self, slot: impl Into<String>) -> Self {
        self.implements.push(slot.into());
        self
    }

    /// Build the definition
    ///
    /// # Errors
    /// - `InvalidDefinition` for an empty name, a delegate that also carries
    ///   steps or declares slots, or a duplicated slot name
    /// - `DuplicateStepId` when two steps share an id
    pub fn build(self) -> StrataResult<PipelineDefinition<R>> {
        if self.name.is_empty() {
            return Err(StrataError::InvalidDefinition(
                "pipeline name must not be empty".to_string(),
            ));
        }

        let mut slot_names = HashSet::new();
        for slot in &self.extension_slots {
            if !slot_names.insert(slot.name.as_str()) {
                return Err(StrataError::InvalidDefinition(format!(
                    "extension slot '{}' declared twice in pipeline '{}'",
                    slot.name, self.name
                )));
            }
        }

        let body = match self.delegate {
            Some(target) => {
                if !self.steps.is_empty() {
                    return Err(StrataError::InvalidDefinition(format!(
                        "delegate pipeline '{}' must not declare its own steps",
                        self.name
                    )));
                }
                if !self.extension_slots.is_empty() {
                    return Err(StrataError::InvalidDefinition(format!(
                        "delegate pipeline '{}' must not declare extension slots",
                        self.name
                    )));
                }
                if target.name == self.name && target.layer_key == self.layer_key {
                    return Err(StrataError::InvalidDefinition(format!(
                        "pipeline '{}' cannot delegate to itself",
                        self.name
                    )));
                }
                DefinitionBody::Delegate(target)
            }
            None => {
                let mut seen = HashSet::new();
                for step in &self.steps {
                    if !seen.insert(step.id()) {
                        return Err(StrataError::DuplicateStepId {
                            pipeline: self.name.clone(),
                            step_id: step.id().to_string(),
                        });
                    }
                }
                DefinitionBody::Steps(Arc::new(self.steps))
            }
        };

        Ok(PipelineDefinition {
            name: self.name,
            layer_key: self.layer_key,
            body,
            extension_slots: self.extension_slots,
            implements: self.implements,
        })
    }
}
