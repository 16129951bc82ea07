//! strata: configuration-driven pipeline engine
//!
//! Operations such as "save", "render tile" or "print" are expressed as named
//! pipelines of small steps. A registry holds a default definition per name
//! plus per-layer overrides; resolving `(name, layer_key)` falls back to the
//! default, follows delegates and checks extension slots once per name.
//!
//! - [`pipeline`]: context, steps, definitions, registry, executor, service
//! - [`config`]: JSON pipeline documents and the host step catalog
//! - [`error`]: the crate error type
//! - [`logging`]: optional `tracing` subscriber setup

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use pipeline::steps;

pub use config::{PipelineConfig, StepCatalog};
pub use error::{ErrorKind, StrataError, StrataResult};
pub use pipeline::{
    PipelineContext, PipelineDefinition, PipelineRegistry, PipelineService, PipelineStep, ResolvedPipeline,
};
