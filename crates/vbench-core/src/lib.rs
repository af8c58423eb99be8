//! Shared types, configuration and error taxonomy for the vbench harness.

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod traits;
pub mod types;
