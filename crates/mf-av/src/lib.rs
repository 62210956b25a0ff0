//! # mf-av
//!
//! External tool management and the transformation engine for mediaflow.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Recipes** ([`Recipe`]) -- engine-neutral transformation descriptions
//!   and their ffmpeg argument rendering.
//! - **Engines** ([`TransformEngine`], [`FfmpegEngine`]) -- the seam the
//!   dispatcher calls to produce an output file.

pub mod command;
pub mod engine;
pub mod recipe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use engine::{FfmpegEngine, TransformEngine};
pub use recipe::{OutputOption, Recipe};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
