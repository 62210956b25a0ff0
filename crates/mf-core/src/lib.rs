//! mf-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for all other mf-* crates,
//! providing the job model and its state machine, a unified error type,
//! typed identifiers, and the application configuration.

pub mod config;
pub mod error;
pub mod ids;
pub mod job;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use job::*;
