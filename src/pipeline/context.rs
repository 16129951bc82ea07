use crate::error::{StrataError, StrataResult};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Well-known key under which the request payload is seeded before the first step
pub const REQUEST_KEY: &str = "request";

/// A single value stored in the context, remembering its concrete type name
pub struct ContextValue {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ContextValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the stored type, as reported by `std::any::type_name`
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut::<T>()
    }

    /// Take the value back out, or return `self` unchanged on a type mismatch
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self { value, type_name }),
        }
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Pipeline context that holds data passed between steps
///
/// The context is a typed key/value bag scoped to one execution. Values are
/// arbitrary `Send + Sync` Rust values; typed reads downcast and report a
/// `ContextTypeMismatch` when the stored type differs. The `finished` flag lets
/// a step end the pipeline early without an error.
///
/// # Example
/// ```
/// use strata::pipeline::PipelineContext;
///
/// let mut context = PipelineContext::new();
/// context.put("layer", "roads".to_string()).unwrap();
/// context.put("zoom", 12u32).unwrap();
///
/// assert_eq!(context.get_as::<u32>("zoom").unwrap(), &12);
/// assert!(context.get_as::<u32>("layer").is_err());
/// assert!(context.get_optional("missing").is_none());
/// ```
#[derive(Debug)]
pub struct PipelineContext {
    /// Id of the execution this context belongs to
    execution_id: Uuid,

    /// Key-value store for pipeline data
    data: HashMap<String, ContextValue>,

    /// Early termination flag
    finished: bool,

    /// Metadata about the pipeline execution
    metadata: HashMap<String, String>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    /// Create a new, empty context with a fresh execution id
    pub fn new() -> Self {
        Self::with_execution_id(Uuid::new_v4())
    }

    pub fn with_execution_id(execution_id: Uuid) -> Self {
        Self {
            execution_id,
            data: HashMap::new(),
            finished: false,
            metadata: HashMap::new(),
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Store a value, returning whatever was stored under the key before
    ///
    /// The returned entry can be put back later to restore the previous state.
    pub fn put<T: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> StrataResult<Option<ContextValue>> {
        self.put_value(key, ContextValue::new(value))
    }

    /// Store an already wrapped value (e.g. one previously returned by `put`)
    pub fn put_value(
        &mut self,
        key: impl Into<String>,
        value: ContextValue,
    ) -> StrataResult<Option<ContextValue>> {
        let key = key.into();
        if key.is_empty() {
            return Err(StrataError::InvalidContextKey(
                "context keys must not be empty".to_string(),
            ));
        }
        Ok(self.data.insert(key, value))
    }

    /// Get a value or fail with `ContextMissingKey`
    pub fn get(&self, key: &str) -> StrataResult<&ContextValue> {
        self.data
            .get(key)
            .ok_or_else(|| StrataError::ContextMissingKey {
                key: key.to_string(),
            })
    }

    /// Get a value of type `T`, failing when it is absent or of another type
    pub fn get_as<T: Any>(&self, key: &str) -> StrataResult<&T> {
        let entry = self.get(key)?;
        entry
            .downcast_ref::<T>()
            .ok_or_else(|| StrataError::ContextTypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
                found: entry.type_name(),
            })
    }

    /// Mutable variant of [`get_as`](Self::get_as)
    pub fn get_as_mut<T: Any>(&mut self, key: &str) -> StrataResult<&mut T> {
        let entry = self
            .data
            .get_mut(key)
            .ok_or_else(|| StrataError::ContextMissingKey {
                key: key.to_string(),
            })?;
        let found = entry.type_name();
        entry
            .downcast_mut::<T>()
            .ok_or_else(|| StrataError::ContextTypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
                found,
            })
    }

    /// Get a value if present; never fails
    pub fn get_optional(&self, key: &str) -> Option<&ContextValue> {
        self.data.get(key)
    }

    /// Get a value of type `T` if present
    ///
    /// Absence is `Ok(None)`; a present value of another type is still an error.
    pub fn get_optional_as<T: Any>(&self, key: &str) -> StrataResult<Option<&T>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(entry) => entry.downcast_ref::<T>().map(Some).ok_or_else(|| {
                StrataError::ContextTypeMismatch {
                    key: key.to_string(),
                    expected: type_name::<T>(),
                    found: entry.type_name(),
                }
            }),
        }
    }

    /// Check if a key exists in the context
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Remove a value from the context
    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.data.remove(key)
    }

    /// Get all data keys
    pub fn keys(&self) -> Vec<&str> {
        self.data.keys().map(|k| k.as_str()).collect()
    }

    pub fn set_finished(&mut self, finished: bool) {
        self.finished = finished;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Set metadata
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Get metadata
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<String> {
        self.metadata.remove(key)
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}
