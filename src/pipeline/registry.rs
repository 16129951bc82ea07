//! Registry of pipeline definitions keyed by `(name, layer_key)`
//!
//! The registry is filled once at startup (or per test), optionally frozen,
//! and then only read. Resolution falls back from a layer-specific definition
//! to the default one of the same name and follows a single delegate hop.
//!
//! Each pipeline name is validated the first time any of its layers is
//! resolved: delegate targets must exist and must not be delegates, and every
//! claimed extension slot must be satisfied. The outcome is memoized, so later
//! resolutions replay the same result without re-checking.

use crate::error::{StrataError, StrataResult};
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::definition::{DelegateRef, PipelineDefinition};
use super::executor::ResolvedPipeline;

/// All definitions sharing one pipeline name
struct PipelineFamily<R> {
    definitions: HashMap<Option<String>, Arc<PipelineDefinition<R>>>,
    validation: OnceCell<StrataResult<()>>,
}

impl<R> PipelineFamily<R> {
    fn new() -> Self {
        Self {
            definitions: HashMap::new(),
            validation: OnceCell::new(),
        }
    }
}

/// Holds every pipeline definition of one response type
///
/// # Example
/// ```
/// use strata::pipeline::{PipelineDefinition, PipelineRegistry};
/// use strata::steps::FnStep;
///
/// let mut registry = PipelineRegistry::<String>::new();
/// registry
///     .register(
///         PipelineDefinition::builder("pipelineTest")
///             .add_step(FnStep::new("default", |_ctx, out: &mut String| {
///                 out.push_str("default");
///                 Ok(())
///             }))
///             .build()
///             .unwrap(),
///     )
///     .unwrap();
///
/// let resolved = registry.resolve("pipelineTest", Some("someLayer")).unwrap();
/// assert_eq!(resolved.step_ids(), vec!["default"]);
/// ```
pub struct PipelineRegistry<R> {
    families: BTreeMap<String, PipelineFamily<R>>,
    frozen: bool,
}

impl<R> Default for PipelineRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> PipelineRegistry<R> {
    pub fn new() -> Self {
        Self {
            families: BTreeMap::new(),
            frozen: false,
        }
    }

    /// Insert a definition under its `(name, layer_key)`
    ///
    /// # Errors
    /// - `PipelineDuplicate` if the key pair is already taken
    /// - `RegistryFrozen` after [`freeze`](Self::freeze)
    pub fn register(&mut self, definition: PipelineDefinition<R>) -> StrataResult<()> {
        self.ensure_not_frozen(definition.name())?;
        let (name, layer_key) = definition.key();
        if self.contains(&name, layer_key.as_deref()) {
            return Err(StrataError::PipelineDuplicate { name, layer_key });
        }
        self.insert(definition);
        Ok(())
    }

    /// Register a batch of definitions atomically
    ///
    /// Duplicates (within the batch or against existing entries) and delegates
    /// pointing at a missing definition or at another delegate fail the whole
    /// call; nothing is inserted in that case. Extension slots are still checked
    /// lazily on first resolution.
    pub fn register_all<I>(&mut self, definitions: I) -> StrataResult<()>
    where
        I: IntoIterator<Item = PipelineDefinition<R>>,
    {
        let definitions: Vec<PipelineDefinition<R>> = definitions.into_iter().collect();

        let mut batch_keys: HashMap<(String, Option<String>), &PipelineDefinition<R>> =
            HashMap::new();
        for definition in &definitions {
            self.ensure_not_frozen(definition.name())?;
            let (name, layer_key) = definition.key();
            if self.contains(&name, layer_key.as_deref())
                || batch_keys.contains_key(&(name.clone(), layer_key.clone()))
            {
                return Err(StrataError::PipelineDuplicate { name, layer_key });
            }
            batch_keys.insert((name, layer_key), definition);
        }

        for definition in &definitions {
            if let Some(target) = definition.delegate() {
                let key = (target.name.clone(), target.layer_key.clone());
                let target_is_delegate = match batch_keys.get(&key) {
                    Some(batch_target) => Some(batch_target.is_delegate()),
                    None => self
                        .definition(&target.name, target.layer_key.as_deref())
                        .map(|existing| existing.is_delegate()),
                };
                check_delegate_target(definition, target, target_is_delegate)?;
            }
        }

        let count = definitions.len();
        for definition in definitions {
            self.insert(definition);
        }
        info!(count, "Registered pipeline definitions");
        Ok(())
    }

    /// Stop accepting registrations
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Whether a definition is registered under exactly this key pair
    pub fn contains(&self, name: &str, layer_key: Option<&str>) -> bool {
        self.definition(name, layer_key).is_some()
    }

    /// Registered pipeline names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.families.keys().map(|name| name.as_str()).collect()
    }

    /// Number of registered definitions
    pub fn len(&self) -> usize {
        self.families.values().map(|f| f.definitions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Exact lookup without fallback, delegation or validation
    pub fn definition(&self, name: &str, layer_key: Option<&str>) -> Option<&Arc<PipelineDefinition<R>>> {
        self.families
            .get(name)?
            .definitions
            .get(&layer_key.map(str::to_string))
    }

    /// Resolve the pipeline to run for `name` and `layer_key`
    ///
    /// Looks up `(name, layer_key)`, then `(name, None)`. A delegate is
    /// followed one hop; the result keeps the identity of the definition that
    /// was found and exposes the target's steps.
    ///
    /// # Errors
    /// - `PipelineUnknown` if neither the layer nor the default definition exists
    /// - any validation error of this pipeline name (memoized)
    pub fn resolve(&self, name: &str, layer_key: Option<&str>) -> StrataResult<ResolvedPipeline<R>> {
        let family = self
            .families
            .get(name)
            .ok_or_else(|| StrataError::PipelineUnknown {
                name: name.to_string(),
                layer_key: layer_key.map(str::to_string),
            })?;

        self.validate_family(name, family)?;

        let definition = layer_key
            .and_then(|key| family.definitions.get(&Some(key.to_string())))
            .or_else(|| family.definitions.get(&None))
            .ok_or_else(|| StrataError::PipelineUnknown {
                name: name.to_string(),
                layer_key: layer_key.map(str::to_string),
            })?;

        debug!(
            pipeline = name,
            requested_layer = ?layer_key,
            resolved_layer = ?definition.layer_key(),
            "Resolved pipeline"
        );

        self.resolve_definition(definition)
    }

    /// Alias of [`resolve`](Self::resolve), for callers inspecting a pipeline
    pub fn get_pipeline(&self, name: &str, layer_key: Option<&str>) -> StrataResult<ResolvedPipeline<R>> {
        self.resolve(name, layer_key)
    }

    /// Run the validation pass for every registered name
    ///
    /// Results are memoized exactly like the lazy pass, so this only moves the
    /// failure to startup. Returns the first error found.
    pub fn validate_all(&self) -> StrataResult<()> {
        for (name, family) in &self.families {
            self.validate_family(name, family)?;
        }
        Ok(())
    }

    fn resolve_definition(
        &self,
        definition: &Arc<PipelineDefinition<R>>,
    ) -> StrataResult<ResolvedPipeline<R>> {
        match definition.delegate() {
            None => {
                let steps = definition.steps().cloned().unwrap_or_default();
                Ok(ResolvedPipeline::new(Arc::clone(definition), None, steps))
            }
            Some(target_ref) => {
                let target = self.delegate_target(definition, target_ref)?;
                let steps = target.steps().cloned().unwrap_or_default();
                Ok(ResolvedPipeline::new(
                    Arc::clone(definition),
                    Some(target_ref.clone()),
                    steps,
                ))
            }
        }
    }

    fn delegate_target(
        &self,
        definition: &PipelineDefinition<R>,
        target_ref: &DelegateRef,
    ) -> StrataResult<&Arc<PipelineDefinition<R>>> {
        let target = self.definition(&target_ref.name, target_ref.layer_key.as_deref());
        check_delegate_target(definition, target_ref, target.map(|t| t.is_delegate()))?;
        target.ok_or_else(|| invalid_delegate(definition, "target not registered"))
    }

    fn validate_family(&self, name: &str, family: &PipelineFamily<R>) -> StrataResult<()> {
        family
            .validation
            .get_or_init(|| {
                let result = self.check_family(name, family);
                match &result {
                    Ok(()) => debug!(pipeline = name, "Pipeline validated"),
                    Err(e) => warn!(pipeline = name, error = %e, "Pipeline validation failed"),
                }
                result
            })
            .clone()
    }

    fn check_family(&self, name: &str, family: &PipelineFamily<R>) -> StrataResult<()> {
        let base = family.definitions.get(&None);

        // Deterministic order: default first, then layers alphabetically
        let mut definitions: Vec<&Arc<PipelineDefinition<R>>> = family.definitions.values().collect();
        definitions.sort_by(|a, b| a.layer_key().cmp(&b.layer_key()));

        for definition in definitions {
            let resolved = self.resolve_definition(definition)?;

            if definition.implements().is_empty() {
                continue;
            }

            let step_ids = resolved.step_ids();
            for slot_name in definition.implements() {
                let slot = base
                    .and_then(|b| b.extension_slot(slot_name))
                    .ok_or_else(|| StrataError::PipelineUnknownExtension {
                        pipeline: name.to_string(),
                        layer_key: definition.layer_key().map(str::to_string),
                        slot: slot_name.clone(),
                    })?;

                if let Some(missing) = slot.first_missing(step_ids.iter().copied()) {
                    return Err(StrataError::PipelineUnsatisfiedExtension {
                        pipeline: name.to_string(),
                        layer_key: definition.layer_key().map(str::to_string),
                        slot: slot_name.clone(),
                        missing_step: missing.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn insert(&mut self, definition: PipelineDefinition<R>) {
        let (name, layer_key) = definition.key();
        let family = self
            .families
            .entry(name.clone())
            .or_insert_with(PipelineFamily::new);
        // Any earlier validation result is stale now
        family.validation = OnceCell::new();
        family.definitions.insert(layer_key.clone(), Arc::new(definition));

        // Delegates of other names may point here
        for (other, family) in self.families.iter_mut() {
            if *other != name {
                let points_here = family.definitions.values().any(|d| {
                    d.delegate()
                        .map(|target| target.name == name)
                        .unwrap_or(false)
                });
                if points_here {
                    family.validation = OnceCell::new();
                }
            }
        }

        debug!(pipeline = %name, layer_key = ?layer_key, "Registered pipeline definition");
    }

    fn ensure_not_frozen(&self, name: &str) -> StrataResult<()> {
        if self.frozen {
            return Err(StrataError::RegistryFrozen(name.to_string()));
        }
        Ok(())
    }
}

fn check_delegate_target<R>(
    definition: &PipelineDefinition<R>,
    target: &DelegateRef,
    target_is_delegate: Option<bool>,
) -> StrataResult<()> {
    match target_is_delegate {
        None => Err(invalid_delegate(
            definition,
            &format!(
                "target '{}' (layer {:?}) is not registered",
                target.name, target.layer_key
            ),
        )),
        Some(true) => Err(invalid_delegate(
            definition,
            &format!(
                "target '{}' (layer {:?}) is itself a delegate",
                target.name, target.layer_key
            ),
        )),
        Some(false) => Ok(()),
    }
}

fn invalid_delegate<R>(definition: &PipelineDefinition<R>, reason: &str) -> StrataError {
    StrataError::PipelineInvalidDelegate {
        pipeline: definition.name().to_string(),
        layer_key: definition.layer_key().map(str::to_string),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::steps::FnStep;

    fn append(id: &'static str) -> FnStep<String> {
        FnStep::new(id, move |_ctx, out: &mut String| {
            out.push_str(id);
            Ok(())
        })
    }

    fn definition(name: &str, layer: Option<&str>, ids: &[&'static str]) -> PipelineDefinition<String> {
        let mut builder = PipelineDefinition::builder(name).layer_key(layer.map(str::to_string));
        for id in ids {
            builder = builder.add_step(append(id));
        }
        builder.build().unwrap()
    }

    fn slot_registry(layer_steps: &[&'static str]) -> PipelineRegistry<String> {
        let mut registry = PipelineRegistry::new();
        registry
            .register(
                PipelineDefinition::builder("save")
                    .add_step(append("core"))
                    .add_step(append("finish"))
                    .extension_slot("commit", ["core", "finish"])
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let mut builder = PipelineDefinition::builder("save")
            .layer("roads")
            .implements("commit");
        for id in layer_steps {
            builder = builder.add_step(append(id));
        }
        registry.register(builder.build().unwrap()).unwrap();
        registry
    }

    #[test]
    fn test_resolution_fallback() {
        let mut registry = PipelineRegistry::new();
        registry
            .register(definition("pipelineTest", None, &["default"]))
            .unwrap();
        registry
            .register(definition("pipelineTest", Some("aLayer"), &["layer"]))
            .unwrap();

        let layer = registry.resolve("pipelineTest", Some("aLayer")).unwrap();
        assert_eq!(layer.step_ids(), vec!["layer"]);
        assert_eq!(layer.layer_key(), Some("aLayer"));

        let other = registry
            .resolve("pipelineTest", Some("someOtherLayer"))
            .unwrap();
        assert_eq!(other.step_ids(), vec!["default"]);
        assert_eq!(other.layer_key(), None);

        let default = registry.resolve("pipelineTest", None).unwrap();
        assert_eq!(default.step_ids(), vec!["default"]);
    }

    #[test]
    fn test_unknown_pipeline() {
        let registry = PipelineRegistry::<String>::new();
        let result = registry.resolve("unknown", Some("anything"));
        assert!(matches!(result, Err(StrataError::PipelineUnknown { .. })));
    }

    #[test]
    fn test_layer_only_without_default() {
        let mut registry = PipelineRegistry::new();
        registry
            .register(definition("print", Some("roads"), &["a"]))
            .unwrap();

        assert!(registry.resolve("print", Some("roads")).is_ok());
        let result = registry.resolve("print", Some("rivers"));
        assert!(matches!(
            result,
            Err(StrataError::PipelineUnknown { ref layer_key, .. }) if layer_key.as_deref() == Some("rivers")
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = PipelineRegistry::new();
        registry.register(definition("save", None, &["a"])).unwrap();
        let result = registry.register(definition("save", None, &["b"]));

        assert!(matches!(result, Err(StrataError::PipelineDuplicate { .. })));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_frozen_registry_rejects_registration() {
        let mut registry = PipelineRegistry::new();
        registry.register(definition("save", None, &["a"])).unwrap();
        registry.freeze();

        assert!(registry.is_frozen());
        let result = registry.register(definition("save", Some("roads"), &["a"]));
        assert!(matches!(result, Err(StrataError::RegistryFrozen(_))));
        assert!(registry.resolve("save", Some("roads")).is_ok());
    }

    #[test]
    fn test_extension_satisfied() {
        let registry = slot_registry(&["pre", "core", "finish"]);
        let resolved = registry.resolve("save", Some("roads")).unwrap();
        assert_eq!(resolved.step_ids(), vec!["pre", "core", "finish"]);
    }

    #[test]
    fn test_extension_wrong_order() {
        let registry = slot_registry(&["pre", "finish", "core"]);
        let result = registry.resolve("save", Some("roads"));

        match result {
            Err(StrataError::PipelineUnsatisfiedExtension {
                pipeline,
                layer_key,
                slot,
                missing_step,
            }) => {
                assert_eq!(pipeline, "save");
                assert_eq!(layer_key.as_deref(), Some("roads"));
                assert_eq!(slot, "commit");
                assert_eq!(missing_step, "finish");
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.step_ids().len())),
        }
    }

    #[test]
    fn test_extension_missing_step_fails_for_whole_name() {
        let registry = slot_registry(&["pre", "finish"]);

        // Any layer of the name triggers the pass, including the default
        let result = registry.resolve("save", None);
        assert!(matches!(
            result,
            Err(StrataError::PipelineUnsatisfiedExtension { ref missing_step, .. }) if missing_step == "core"
        ));
        assert_eq!(
            registry.validate_all().unwrap_err().kind(),
            ErrorKind::PipelineUnsatisfiedExtension
        );
    }

    #[test]
    fn test_undeclared_extension() {
        let mut registry = PipelineRegistry::new();
        registry.register(definition("save", None, &["a"])).unwrap();
        registry
            .register(
                PipelineDefinition::builder("save")
                    .layer("roads")
                    .add_step(append("a"))
                    .implements("commit")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let result = registry.resolve("save", Some("roads"));
        assert!(matches!(
            result,
            Err(StrataError::PipelineUnknownExtension { ref slot, .. }) if slot == "commit"
        ));
    }

    #[test]
    fn test_reregistration_resets_validation() {
        let mut registry = PipelineRegistry::new();
        registry.register(definition("save", None, &["core"])).unwrap();
        assert!(registry.resolve("save", None).is_ok());

        registry
            .register(
                PipelineDefinition::builder("save")
                    .layer("roads")
                    .add_step(append("other"))
                    .implements("commit")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        // The cached success must not hide the new, invalid layer
        assert!(matches!(
            registry.resolve("save", None),
            Err(StrataError::PipelineUnknownExtension { .. })
        ));
    }

    #[test]
    fn test_delegate_reuses_target_steps() {
        let mut registry = PipelineRegistry::new();
        registry
            .register(definition("getConfiguration", None, &["load", "filter", "send"]))
            .unwrap();
        registry
            .register(
                PipelineDefinition::builder("getVectorConfiguration")
                    .delegate_to("getConfiguration", None)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let target = registry.resolve("getConfiguration", None).unwrap();
        let delegate = registry.resolve("getVectorConfiguration", None).unwrap();

        assert_eq!(delegate.step_ids(), target.step_ids());
        assert_eq!(delegate.name(), "getVectorConfiguration");
        assert!(delegate.shares_steps_with(&target));
        assert_eq!(
            delegate.delegate_target().map(|t| t.name.as_str()),
            Some("getConfiguration")
        );
    }

    #[test]
    fn test_delegate_to_missing_target_fails_on_resolve() {
        let mut registry = PipelineRegistry::<String>::new();
        registry
            .register(
                PipelineDefinition::builder("save")
                    .layer("roads")
                    .delegate_to("saveTemplate", None)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let result = registry.resolve("save", Some("roads"));
        assert!(matches!(
            result,
            Err(StrataError::PipelineInvalidDelegate { .. })
        ));
    }

    #[test]
    fn test_delegate_chain_rejected() {
        let mut registry = PipelineRegistry::new();
        registry.register(definition("a", None, &["x"])).unwrap();
        registry
            .register(
                PipelineDefinition::builder("b")
                    .delegate_to("a", None)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                PipelineDefinition::builder("c")
                    .delegate_to("b", None)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        assert!(registry.resolve("b", None).is_ok());
        assert!(matches!(
            registry.resolve("c", None),
            Err(StrataError::PipelineInvalidDelegate { .. })
        ));
    }

    #[test]
    fn test_register_all_is_atomic() {
        let mut registry = PipelineRegistry::new();
        let result = registry.register_all(vec![
            definition("save", None, &["a"]),
            PipelineDefinition::builder("update")
                .delegate_to("missing", None)
                .build()
                .unwrap(),
        ]);

        assert!(matches!(
            result,
            Err(StrataError::PipelineInvalidDelegate { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_all_duplicate_within_batch() {
        let mut registry = PipelineRegistry::new();
        let result = registry.register_all(vec![
            definition("save", Some("roads"), &["a"]),
            definition("save", Some("roads"), &["b"]),
        ]);

        assert!(matches!(result, Err(StrataError::PipelineDuplicate { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_all_delegate_within_batch() {
        let mut registry = PipelineRegistry::new();
        registry
            .register_all(vec![
                PipelineDefinition::builder("update")
                    .delegate_to("save", None)
                    .build()
                    .unwrap(),
                definition("save", None, &["a", "b"]),
            ])
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["save", "update"]);
        assert_eq!(
            registry.resolve("update", None).unwrap().step_ids(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_idempotent_resolution() {
        let mut registry = PipelineRegistry::new();
        registry
            .register(definition("renderTile", None, &["a", "b", "c"]))
            .unwrap();

        let first = registry.resolve("renderTile", Some("roads")).unwrap();
        let second = registry.resolve("renderTile", Some("roads")).unwrap();
        assert_eq!(first.step_ids(), second.step_ids());
    }

    fn delegating_slot_registry(template_steps: &[&'static str]) -> PipelineRegistry<String> {
        let mut registry = PipelineRegistry::new();
        registry
            .register(
                PipelineDefinition::builder("save")
                    .add_step(append("core"))
                    .add_step(append("finish"))
                    .extension_slot("commit", ["core", "finish"])
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(definition("tmpl", None, template_steps))
            .unwrap();
        registry
            .register(
                PipelineDefinition::builder("save")
                    .layer("roads")
                    .delegate_to("tmpl", None)
                    .implements("commit")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_delegate_claiming_slot_checked_against_target_steps() {
        let registry = delegating_slot_registry(&["pre", "core", "finish"]);

        let resolved = registry.resolve("save", Some("roads")).unwrap();
        assert_eq!(resolved.step_ids(), vec!["pre", "core", "finish"]);
        assert!(resolved.delegate_target().is_some());
    }

    #[test]
    fn test_delegate_claiming_slot_with_unsatisfying_target() {
        let registry = delegating_slot_registry(&["finish", "core"]);

        let result = registry.resolve("save", Some("roads"));
        assert!(matches!(
            result,
            Err(StrataError::PipelineUnsatisfiedExtension { ref layer_key, ref slot, ref missing_step, .. })
                if layer_key.as_deref() == Some("roads") && slot == "commit" && missing_step == "finish"
        ));
    }

    #[test]
    fn test_validation_cell_filled_on_first_resolution() {
        let mut registry = slot_registry(&["pre", "core", "finish"]);
        assert!(registry.families["save"].validation.get().is_none());

        registry.resolve("save", None).unwrap();
        assert!(matches!(
            registry.families["save"].validation.get(),
            Some(Ok(()))
        ));

        // A later resolution replays the stored result
        registry.resolve("save", Some("roads")).unwrap();
        assert!(registry.families["save"].validation.get().is_some());

        registry
            .register(definition("save", Some("rivers"), &["core", "finish"]))
            .unwrap();
        assert!(registry.families["save"].validation.get().is_none());
    }

    #[test]
    fn test_registering_target_resets_delegating_family() {
        let mut registry = PipelineRegistry::new();
        registry
            .register(definition("save", None, &["a"]))
            .unwrap();
        registry
            .register(
                PipelineDefinition::builder("update")
                    .delegate_to("save", None)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        registry.resolve("update", None).unwrap();
        assert!(registry.families["update"].validation.get().is_some());

        registry
            .register(definition("save", Some("roads"), &["b"]))
            .unwrap();
        assert!(registry.families["update"].validation.get().is_none());
        assert!(registry.families["save"].validation.get().is_none());
    }

    #[test]
    fn test_concurrent_first_resolutions_share_one_result() {
        let registry = slot_registry(&["pre", "finish"]);

        let errors: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let registry = &registry;
                    scope.spawn(move || {
                        let layer = if i % 2 == 0 { Some("roads") } else { None };
                        registry.resolve("save", layer).unwrap_err().to_string()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(errors.iter().all(|e| e == &errors[0]));
        assert!(matches!(
            registry.families["save"].validation.get(),
            Some(Err(StrataError::PipelineUnsatisfiedExtension { .. }))
        ));
    }
}
