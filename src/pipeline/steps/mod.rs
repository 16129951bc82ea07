//! Reusable pipeline steps
//!
//! Domain steps (rendering, saving, printing, ...) live with the features that
//! own them. This module only holds the generic building blocks:
//! 1. FnStep - Wrap a closure as a step
//! 2. StopStep - Finish the pipeline early when a condition holds
//! 3. RequireKeysStep - Fail fast when upstream context values are missing

pub mod func;
pub mod require;
pub mod stop;

// Re-export steps
pub use func::FnStep;
pub use require::RequireKeysStep;
pub use stop::StopStep;
