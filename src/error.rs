use std::sync::Arc;
use thiserror::Error;

/// Central error type for the pipeline engine
///
/// Configuration errors (unknown, duplicate, invalid delegate, unsatisfied
/// extension, ...) are meant to fail process startup. Context and step errors
/// are per-request and only fail the execution that raised them.
#[derive(Error, Debug, Clone)]
pub enum StrataError {
    // ============================================================================
    // Registry / Definition Errors
    // ============================================================================
    #[error("No pipeline '{name}' registered for layer {} and no default", display_layer(.layer_key))]
    PipelineUnknown {
        name: String,
        layer_key: Option<String>,
    },

    #[error("Pipeline '{name}' already registered for layer {}", display_layer(.layer_key))]
    PipelineDuplicate {
        name: String,
        layer_key: Option<String>,
    },

    #[error(
        "Pipeline '{pipeline}' (layer {}) does not satisfy extension slot '{slot}': missing step '{missing_step}'",
        display_layer(.layer_key)
    )]
    PipelineUnsatisfiedExtension {
        pipeline: String,
        layer_key: Option<String>,
        slot: String,
        missing_step: String,
    },

    #[error(
        "Pipeline '{pipeline}' (layer {}) claims extension slot '{slot}' which is not declared by its default definition",
        display_layer(.layer_key)
    )]
    PipelineUnknownExtension {
        pipeline: String,
        layer_key: Option<String>,
        slot: String,
    },

    #[error(
        "Pipeline '{pipeline}' (layer {}) has an invalid delegate: {reason}",
        display_layer(.layer_key)
    )]
    PipelineInvalidDelegate {
        pipeline: String,
        layer_key: Option<String>,
        reason: String,
    },

    #[error("Step id '{step_id}' appears more than once in pipeline '{pipeline}'")]
    DuplicateStepId { pipeline: String, step_id: String },

    #[error("Invalid pipeline definition: {0}")]
    InvalidDefinition(String),

    #[error("Registry is frozen, cannot register pipeline '{0}'")]
    RegistryFrozen(String),

    // ============================================================================
    // Context Errors
    // ============================================================================
    #[error("Required context key not found: {key}")]
    ContextMissingKey { key: String },

    #[error("Context key '{key}' holds a {found}, expected {expected}")]
    ContextTypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid context key: {0}")]
    InvalidContextKey(String),

    // ============================================================================
    // Execution Errors
    // ============================================================================
    #[error(
        "Step '{step_id}' of pipeline '{pipeline}' (layer {}) failed: {source}",
        display_layer(.layer_key)
    )]
    StepFailed {
        pipeline: String,
        layer_key: Option<String>,
        step_id: String,
        #[source]
        source: Box<StrataError>,
    },

    #[error("{0}")]
    Step(String),

    #[error(transparent)]
    Custom(Arc<dyn std::error::Error + Send + Sync>),

    // ============================================================================
    // Configuration Loading Errors
    // ============================================================================
    #[error("Unknown step type '{step_type}' for step '{step_id}'")]
    UnknownStepType { step_type: String, step_id: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`StrataError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PipelineUnknown,
    PipelineDuplicate,
    PipelineUnsatisfiedExtension,
    PipelineInvalid,
    ContextMissingKey,
    ContextTypeMismatch,
    /// A context key that can never be stored, such as the empty key
    InvalidContextKey,
    StepFailure,
    Config,
}

impl StrataError {
    /// Wrap any error raised inside a step
    pub fn custom<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StrataError::Custom(Arc::new(err))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::PipelineUnknown { .. } => ErrorKind::PipelineUnknown,
            StrataError::PipelineDuplicate { .. } => ErrorKind::PipelineDuplicate,
            StrataError::PipelineUnsatisfiedExtension { .. }
            | StrataError::PipelineUnknownExtension { .. } => {
                ErrorKind::PipelineUnsatisfiedExtension
            }
            StrataError::PipelineInvalidDelegate { .. }
            | StrataError::DuplicateStepId { .. }
            | StrataError::InvalidDefinition(_)
            | StrataError::RegistryFrozen(_) => ErrorKind::PipelineInvalid,
            StrataError::ContextMissingKey { .. } => ErrorKind::ContextMissingKey,
            StrataError::InvalidContextKey(_) => ErrorKind::InvalidContextKey,
            StrataError::ContextTypeMismatch { .. } => ErrorKind::ContextTypeMismatch,
            StrataError::StepFailed { .. } | StrataError::Step(_) | StrataError::Custom(_) => {
                ErrorKind::StepFailure
            }
            StrataError::UnknownStepType { .. } | StrataError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether this error should abort startup rather than a single request
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PipelineUnknown
                | ErrorKind::PipelineDuplicate
                | ErrorKind::PipelineUnsatisfiedExtension
                | ErrorKind::PipelineInvalid
                | ErrorKind::Config
        )
    }

    /// The error a step originally returned, with executor annotations removed
    pub fn root_cause(&self) -> &StrataError {
        match self {
            StrataError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Id of the failing step, if this error came out of the executor
    pub fn step_id(&self) -> Option<&str> {
        match self {
            StrataError::StepFailed { step_id, .. } => Some(step_id),
            _ => None,
        }
    }
}

fn display_layer(layer_key: &Option<String>) -> String {
    match layer_key {
        Some(key) => format!("'{}'", key),
        None => "<default>".to_string(),
    }
}

// Automatic conversion from String
impl From<String> for StrataError {
    fn from(err: String) -> Self {
        StrataError::Step(err)
    }
}

// Automatic conversion from &str
impl From<&str> for StrataError {
    fn from(err: &str) -> Self {
        StrataError::Step(err.to_string())
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Config(format!("JSON error: {}", err))
    }
}

// Helper type alias for Results
pub type StrataResult<T> = Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StrataError::PipelineUnknown {
            name: "renderTile".to_string(),
            layer_key: None,
        };
        assert_eq!(
            err.to_string(),
            "No pipeline 'renderTile' registered for layer <default> and no default"
        );
    }

    #[test]
    fn test_unsatisfied_extension_names_everything() {
        let err = StrataError::PipelineUnsatisfiedExtension {
            pipeline: "save".to_string(),
            layer_key: Some("roads".to_string()),
            slot: "commit".to_string(),
            missing_step: "core".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("save"));
        assert!(msg.contains("'roads'"));
        assert!(msg.contains("commit"));
        assert!(msg.contains("core"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_root_cause_unwraps_step_failure() {
        let err = StrataError::StepFailed {
            pipeline: "save".to_string(),
            layer_key: None,
            step_id: "validate".to_string(),
            source: Box::new(StrataError::ContextMissingKey {
                key: "feature".to_string(),
            }),
        };
        assert_eq!(err.kind(), ErrorKind::StepFailure);
        assert_eq!(err.step_id(), Some("validate"));
        assert_eq!(err.root_cause().kind(), ErrorKind::ContextMissingKey);
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_string_conversion() {
        let err: StrataError = "boom".into();
        assert!(matches!(err, StrataError::Step(ref m) if m == "boom"));
    }

    #[test]
    fn test_custom_error_is_transparent() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "tile missing");
        let err = StrataError::custom(io_err);
        assert_eq!(err.to_string(), "tile missing");
        assert_eq!(err.kind(), ErrorKind::StepFailure);
    }

    #[test]
    fn test_invalid_context_key_is_not_a_missing_key() {
        let err = StrataError::InvalidContextKey("context keys must not be empty".to_string());
        assert_eq!(err.kind(), ErrorKind::InvalidContextKey);
        assert_ne!(err.kind(), ErrorKind::ContextMissingKey);
        assert!(!err.is_configuration_error());
    }
}
