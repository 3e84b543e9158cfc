//! `Popwise` - trigger evaluation and campaign selection for storefront popups
//!
//! For one page visit the engine decides whether, which, and when popup
//! campaigns are shown: detectors watch page signals, a combinator folds
//! their outcomes, session rules gate the result, and the selector keeps at
//! most one campaign per surface.

pub mod cli;
pub mod collab;
pub mod combinator;
pub mod config;
pub mod detector;
pub mod error;
pub mod observability;
pub mod orchestrator;
pub mod page;
pub mod selector;
pub mod session;
pub mod session_rules;
pub mod simulation;
