//! StoryReel Common Utilities
//!
//! Shared infrastructure for all StoryReel crates:
//! - Error taxonomy and result aliases
//! - Tracing/logging initialization
//! - Configuration loading with environment overrides

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
