//! Campaign configuration
//!
//! Loading and validation of campaign files. The campaign schema itself
//! lives in `popwise-core` and is re-exported here.

pub mod loader;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning};
pub use popwise_core::config::*;
pub use validation::{ValidationResult, Validator};
