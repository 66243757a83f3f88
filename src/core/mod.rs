//! Core building blocks shared by every stage
//!
//! - **config**: optional `release.toml` parsing and validation
//! - **error**: error taxonomy with exit codes and contextual help
//! - **logging**: tracing subscriber setup
//! - **process**: subprocess execution with timeout and cancellation

pub mod config;
pub mod error;
pub mod logging;
pub mod process;
