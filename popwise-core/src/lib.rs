//! Popwise Core: campaign schema and shared types
//!
//! This crate provides the campaign configuration types and error types
//! shared by the `popwise` engine and its command-line tooling.

pub mod config;
pub mod error;
