//! mediaflow - asynchronous media transformation worker
//!
//! This library crate backs the `mediaflow` binary and exposes its config
//! discovery and one-shot runner for integration testing.

pub mod config;
pub mod runner;
