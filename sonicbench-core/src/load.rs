// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Load generator: drives one adapter through a full batch.
//!
//! Only one measurement window is open at a time, so two adapters never
//! compete for the responder.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::adapter::{Adapter, Availability, BenchRuntime};
use crate::config::BenchmarkConfig;
use crate::error::{AdapterError, BenchError};

/// Timing of one adapter's batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResult {
    pub name: String,
    pub elapsed_ms: f64,
    pub requests: u64,
    /// Set when the adapter could not run. Such results carry no timing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl AdapterResult {
    pub fn completed(name: impl Into<String>, elapsed_ms: f64, requests: u64) -> Self {
        Self {
            name: name.into(),
            elapsed_ms,
            requests,
            failure: None,
        }
    }

    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elapsed_ms: 0.0,
            requests: 0,
            failure: Some(reason.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.failure.is_none()
    }

    /// `"<N> requests in <ms> ms"`
    pub fn summary_line(&self) -> String {
        format!("{} requests in {:.2} ms", self.requests, self.elapsed_ms)
    }
}

/// Outcome of measuring one adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    Completed(AdapterResult),
    Skipped { name: String, reason: String },
}

impl Measurement {
    pub fn name(&self) -> &str {
        match self {
            Self::Completed(result) => &result.name,
            Self::Skipped { name, .. } => name,
        }
    }

    /// Flatten into a result, marking skips as failed.
    pub fn into_result(self) -> AdapterResult {
        match self {
            Self::Completed(result) => result,
            Self::Skipped { name, reason } => AdapterResult::failed(name, reason),
        }
    }
}

/// Runs adapters one at a time.
#[derive(Default)]
pub struct LoadGenerator {
    window: Mutex<()>,
}

impl LoadGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Measure one adapter against `url`.
    ///
    /// Unavailable adapters come back as [`Measurement::Skipped`]; any other
    /// adapter failure, or a batch that lost requests, is fatal.
    pub fn measure(
        &self,
        adapter: &dyn Adapter,
        runtime: &BenchRuntime,
        url: &str,
        config: &BenchmarkConfig,
    ) -> Result<Measurement, BenchError> {
        let name = adapter.descriptor().name.clone();

        if let Availability::Unavailable { reason } = adapter.availability() {
            return Ok(Measurement::Skipped { name, reason });
        }

        let _window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(
            adapter = %name,
            category = %adapter.descriptor().category,
            requests = config.requests(),
            concurrency = config.concurrency(),
            "Measurement window open"
        );

        let stats = match adapter.run(runtime, url, config.requests(), config.concurrency()) {
            Ok(stats) => stats,
            Err(AdapterError::Unavailable { reason, .. }) => {
                return Ok(Measurement::Skipped { name, reason });
            }
            Err(e) => return Err(e.into()),
        };

        if stats.completed != config.requests() {
            return Err(BenchError::IncompleteRun {
                adapter: name,
                completed: stats.completed,
                expected: config.requests(),
            });
        }

        let elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0;
        tracing::info!(adapter = %name, elapsed_ms, "Adapter finished");

        Ok(Measurement::Completed(AdapterResult::completed(
            name,
            elapsed_ms,
            stats.completed,
        )))
    }
}
