// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! sonicbench Core Library
//!
//! Comparative load-testing harness for HTTP clients. Starts a disposable
//! responder, measures each client adapter against it in turn, prints a
//! comparison report and fails unless the target client is the fastest.

pub mod adapter;
pub mod config;
pub mod error;
pub mod gate;
pub mod load;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod reporter;
pub mod server;
pub mod sonic;
pub mod types;

// Re-export commonly used types
pub use adapter::{registry, Adapter, AdapterDescriptor, Availability, BenchRuntime, RunStats};
pub use config::{BenchmarkConfig, ConfigLoader, ConfigOverrides, HarnessConfig};
pub use error::{BenchError, BenchResult, ConfigError, RegressionError};
pub use load::{AdapterResult, LoadGenerator, Measurement};
pub use orchestrator::{Orchestrator, RunOutcome, ServerSource};
pub use report::BenchmarkReport;
pub use reporter::JsonReporter;
pub use server::{ServerHandle, ServerLauncher, ServerState};
pub use types::{AdapterKind, ExecutionCategory, Port};
