//! Pipeline configuration documents
//!
//! Hosts describe their pipelines in JSON and supply a [`StepCatalog`] that
//! knows how to build each step type. The engine itself never looks types up
//! by name: the catalog is filled by the host with plain constructors.
//!
//! ```json
//! {
//!   "pipelines": [
//!     {
//!       "name": "saveOrUpdate",
//!       "steps": [
//!         { "id": "core", "type": "save" },
//!         { "id": "finish", "type": "commit" }
//!       ],
//!       "extensionSlots": [{ "name": "commit", "requiredSteps": ["core", "finish"] }]
//!     },
//!     {
//!       "name": "saveOrUpdate",
//!       "layerKey": "roads",
//!       "implements": ["commit"],
//!       "steps": [
//!         { "id": "snap", "type": "snapToGrid", "params": { "tolerance": 0.5 } },
//!         { "id": "core", "type": "save" },
//!         { "id": "finish", "type": "commit" }
//!       ]
//!     },
//!     { "name": "update", "delegate": { "name": "saveOrUpdate" } }
//!   ]
//! }
//! ```

use crate::error::{StrataError, StrataResult};
use crate::pipeline::{PipelineDefinition, PipelineRegistry, PipelineStep};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub pipelines: Vec<PipelineSpec>,
}

/// One pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineSpec {
    pub name: String,

    /// Absent for the default definition of this name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_key: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate: Option<DelegateSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension_slots: Vec<SlotSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepSpec {
    pub id: String,

    /// Catalog key of the step constructor
    #[serde(rename = "type")]
    pub step_type: String,

    /// Free-form parameters handed to the constructor
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DelegateSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SlotSpec {
    pub name: String,
    pub required_steps: Vec<String>,
}

impl PipelineConfig {
    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> StrataResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> StrataResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrataError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json_str(&content)?;
        debug!(
            path = %path.display(),
            pipelines = config.pipelines.len(),
            "Loaded pipeline configuration"
        );
        Ok(config)
    }

    /// Build every definition, constructing steps through `catalog`
    pub fn into_definitions<R>(&self, catalog: &StepCatalog<R>) -> StrataResult<Vec<PipelineDefinition<R>>> {
        self.pipelines
            .iter()
            .map(|spec| spec.to_definition(catalog))
            .collect()
    }
}

impl PipelineSpec {
    pub fn to_definition<R>(&self, catalog: &StepCatalog<R>) -> StrataResult<PipelineDefinition<R>> {
        let mut builder = PipelineDefinition::builder(self.name.clone()).layer_key(self.layer_key.clone());

        for step in &self.steps {
            builder = builder.add_shared_step(catalog.create(step)?);
        }
        if let Some(delegate) = &self.delegate {
            builder = builder.delegate_to(delegate.name.clone(), delegate.layer_key.as_deref());
        }
        for slot in &self.extension_slots {
            builder = builder.extension_slot(slot.name.clone(), slot.required_steps.iter().cloned());
        }
        for slot in &self.implements {
            builder = builder.implements(slot.clone());
        }

        builder.build()
    }
}

type StepFactory<R> = dyn Fn(&str, &Value) -> StrataResult<Arc<dyn PipelineStep<R>>> + Send + Sync;

/// Host-supplied constructors for the step types a configuration may name
pub struct StepCatalog<R> {
    factories: HashMap<String, Box<StepFactory<R>>>,
}

impl<R> Default for StepCatalog<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> StepCatalog<R> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register the constructor for `step_type`, replacing any previous one
    ///
    /// The constructor receives the step id and its `params` value.
    pub fn register<F>(&mut self, step_type: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str, &Value) -> StrataResult<Arc<dyn PipelineStep<R>>> + Send + Sync + 'static,
    {
        self.factories.insert(step_type.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.factories.contains_key(step_type)
    }

    /// Registered step types, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(|t| t.as_str()).collect();
        types.sort_unstable();
        types
    }

    pub fn create(&self, spec: &StepSpec) -> StrataResult<Arc<dyn PipelineStep<R>>> {
        let factory = self
            .factories
            .get(&spec.step_type)
            .ok_or_else(|| StrataError::UnknownStepType {
                step_type: spec.step_type.clone(),
                step_id: spec.id.clone(),
            })?;
        let step = factory(&spec.id, &spec.params)?;
        if step.id() != spec.id {
            return Err(StrataError::Config(format!(
                "constructor for '{}' returned step '{}' instead of '{}'",
                spec.step_type,
                step.id(),
                spec.id
            )));
        }
        Ok(step)
    }
}

impl<R> PipelineRegistry<R> {
    /// Build every definition of `config` and register them as one batch
    pub fn load_config(&mut self, config: &PipelineConfig, catalog: &StepCatalog<R>) -> StrataResult<()> {
        let definitions = config.into_definitions(catalog)?;
        self.register_all(definitions)?;
        info!(
            pipelines = config.pipelines.len(),
            "Pipeline configuration registered"
        );
        Ok(())
    }
}
