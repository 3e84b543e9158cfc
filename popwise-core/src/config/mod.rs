//! Campaign configuration module
//!
//! Serde types for campaign definitions as delivered by the campaign
//! backend or loaded from YAML/JSON files.

pub mod schema;

pub use schema::*;
