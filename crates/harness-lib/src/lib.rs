//! Measurement harness for comparing resource-allocation controllers
//!
//! This crate provides the core functionality for:
//! - Timed telemetry sampling of a workload through kubectl
//! - Parsing heterogeneous CPU-quantity and timestamp encodings
//! - Loading persisted run records (current and legacy layouts)
//! - Temporal alignment of independently started runs
//! - Allocation-change detection and efficiency statistics

pub mod analysis;
pub mod error;
pub mod kubectl;
pub mod loader;
pub mod models;
pub mod parse;
pub mod sampler;

pub use error::HarnessError;
pub use models::{Reading, Run, RunKind, Sample};
