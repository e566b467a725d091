// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Regression gate: the target adapter must be the fastest.

use crate::error::RegressionError;
use crate::load::AdapterResult;

/// Fail unless `baseline` has the lowest elapsed time among completed results.
///
/// Sorting is stable, so on an exact tie the adapter measured first wins.
pub fn assert_fastest(baseline: &str, results: &[AdapterResult]) -> Result<(), RegressionError> {
    let mut ranked: Vec<&AdapterResult> = results.iter().filter(|r| r.is_completed()).collect();
    ranked.sort_by(|a, b| a.elapsed_ms.total_cmp(&b.elapsed_ms));

    let fastest = ranked.first().ok_or(RegressionError::NoResults)?;
    if fastest.name == baseline {
        tracing::info!(baseline, elapsed_ms = fastest.elapsed_ms, "Target is the fastest");
        return Ok(());
    }

    match ranked.iter().find(|r| r.name == baseline) {
        Some(target) => Err(RegressionError::NotFastest {
            baseline: baseline.to_string(),
            fastest: fastest.name.clone(),
            fastest_ms: fastest.elapsed_ms,
            baseline_ms: target.elapsed_ms,
        }),
        None => Err(RegressionError::BaselineNotMeasured {
            baseline: baseline.to_string(),
            fastest: fastest.name.clone(),
        }),
    }
}
