//! Configuration-driven pipeline engine
//!
//! A pipeline is a named, ordered list of steps. Definitions can be
//! specialized per layer key, can reuse another definition's steps as a
//! delegate, and can declare extension slots that layer definitions must fill.
//! Each step reads and writes a per-execution [`PipelineContext`] and a shared
//! response value; the executor runs the steps in order, stops on the first
//! error and stops successfully as soon as a step sets the finished flag.
//!
//! # Example
//! ```
//! use strata::error::StrataResult;
//! use strata::pipeline::{PipelineContext, PipelineDefinition, PipelineRegistry, PipelineStep};
//!
//! // Define a custom step
//! struct Append(&'static str);
//!
//! impl PipelineStep<String> for Append {
//!     fn id(&self) -> &str {
//!         self.0
//!     }
//!
//!     fn execute(&self, _context: &mut PipelineContext, response: &mut String) -> StrataResult<()> {
//!         response.push_str(self.0);
//!         Ok(())
//!     }
//! }
//!
//! // Register a default definition and a layer override
//! let mut registry = PipelineRegistry::new();
//! registry.register(
//!     PipelineDefinition::builder("renderTile")
//!         .add_step(Append("default"))
//!         .build()?,
//! )?;
//! registry.register(
//!     PipelineDefinition::builder("renderTile")
//!         .layer("roads")
//!         .add_step(Append("roads"))
//!         .build()?,
//! )?;
//!
//! let mut response = String::new();
//! registry
//!     .resolve("renderTile", Some("roads"))?
//!     .execute(&mut PipelineContext::new(), &mut response)?;
//! assert_eq!(response, "roads");
//! # Ok::<(), strata::error::StrataError>(())
//! ```

pub mod context;
pub mod core;
pub mod definition;
pub mod events;
pub mod executor;
pub mod registry;
pub mod service;
pub mod steps;

// Re-export main types
pub use context::{ContextValue, PipelineContext, REQUEST_KEY};
pub use self::core::{ExecutionReport, ExecutionState, PipelineStep, StepReport};
pub use definition::{DelegateRef, ExtensionSlot, PipelineDefinition, PipelineDefinitionBuilder, StepList};
pub use events::{PipelineEvent, PipelineListener, RecordingListener};
pub use executor::ResolvedPipeline;
pub use registry::PipelineRegistry;
pub use service::PipelineService;
