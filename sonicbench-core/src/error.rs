// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for sonicbench.
//!
//! Every failure the harness can hit is an explicit enum variant.
//! No `Box<dyn Error>`, no `anyhow::Result` inside the library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::Port;

/// Top-level error type for a benchmark run.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Fail-Fast before any process is spawned
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // =========================================================================
    // Server Lifecycle Errors
    // =========================================================================
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Readiness probe failed: {0}")]
    Probe(#[from] ProbeError),

    // =========================================================================
    // Measurement Errors
    // =========================================================================
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Adapter {adapter} completed {completed} of {expected} requests")]
    IncompleteRun {
        adapter: String,
        completed: u64,
        expected: u64,
    },

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    // =========================================================================
    // Verdict
    // =========================================================================
    #[error("Regression: {0}")]
    Regression(#[from] RegressionError),

    #[error("Failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Configuration errors. Any of these prevents the run from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid port: {port} - {reason}")]
    InvalidPort { port: u16, reason: String },

    #[error("Unknown adapter: {name}")]
    UnknownAdapter { name: String },
}

/// Errors raised while starting the disposable responder.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to spawn responder {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start embedded responder on port {port}: {reason}")]
    EmbeddedFailed { port: Port, reason: String },

    #[error("Failed to build responder from {source_path}: {reason}")]
    BuildFailed { source_path: PathBuf, reason: String },
}

/// Readiness probe outcome when the responder never answers.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Server at {url} did not answer within {deadline:?} ({attempts} attempts)")]
    StartupTimeout {
        url: String,
        deadline: Duration,
        attempts: u32,
    },

    #[error("Failed to build probe client: {reason}")]
    Client { reason: String },
}

/// Errors raised by an adapter's measurement.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter cannot execute on this host or build. Recovered locally.
    #[error("Adapter {adapter} unavailable: {reason}")]
    Unavailable { adapter: String, reason: String },

    #[error("Adapter {adapter} request failed: {reason}")]
    Request { adapter: String, reason: String },

    #[error("Adapter {adapter} worker pool failed: {reason}")]
    WorkerPool { adapter: String, reason: String },
}

/// Errors raised by the sonic HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Connection to {authority} failed: {source}")]
    Connect {
        authority: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed before a response was received")]
    ConnectionClosed,

    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },

    #[error("Connection pool is closed")]
    PoolClosed,
}

/// Errors raised while building the comparison report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Baseline adapter {baseline} has no completed result")]
    BaselineMissing { baseline: String },

    #[error("Baseline adapter {baseline} reported a zero elapsed time")]
    ZeroBaseline { baseline: String },

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The target adapter was not the fastest.
#[derive(Debug, Error)]
pub enum RegressionError {
    #[error("{baseline} is not the fastest: {fastest} finished in {fastest_ms:.2} ms vs {baseline_ms:.2} ms")]
    NotFastest {
        baseline: String,
        fastest: String,
        fastest_ms: f64,
        baseline_ms: f64,
    },

    #[error("{baseline} was not measured; {fastest} is the fastest")]
    BaselineNotMeasured { baseline: String, fastest: String },

    #[error("No completed results to compare")]
    NoResults,
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;
