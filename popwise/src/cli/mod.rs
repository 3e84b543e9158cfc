//! Command-line interface
//!
//! Argument definitions and command handlers for the `popwise` binary.

pub mod args;
pub mod commands;
