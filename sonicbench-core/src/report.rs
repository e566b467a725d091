// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Comparison report built from the completed adapter results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ReportError;
use crate::load::AdapterResult;

/// How much slower one competitor was than the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speedup {
    pub competitor: String,
    /// `(competitor / baseline - 1) * 100`, rounded to two decimals.
    pub percent: f64,
}

/// Baseline, results in execution order and the derived speedup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub baseline: String,
    pub results: Vec<AdapterResult>,
    pub speedups: Vec<Speedup>,
}

/// Percentage by which `baseline_ms` beats `competitor_ms`, two decimals.
pub fn speedup_percent(baseline_ms: f64, competitor_ms: f64) -> f64 {
    let percent = (competitor_ms / baseline_ms - 1.0) * 100.0;
    let rounded = (percent * 100.0).round() / 100.0;
    // Normalise -0.0 so a tie prints as 0.00
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

impl BenchmarkReport {
    /// Build the report. Results that carry a failure marker are left out.
    pub fn build(baseline: &str, results: &[AdapterResult]) -> Result<Self, ReportError> {
        let results: Vec<AdapterResult> = results
            .iter()
            .filter(|r| r.is_completed())
            .cloned()
            .collect();

        let baseline_ms = results
            .iter()
            .find(|r| r.name == baseline)
            .map(|r| r.elapsed_ms)
            .ok_or_else(|| ReportError::BaselineMissing {
                baseline: baseline.to_string(),
            })?;
        if baseline_ms <= 0.0 {
            return Err(ReportError::ZeroBaseline {
                baseline: baseline.to_string(),
            });
        }

        let speedups = results
            .iter()
            .filter(|r| r.name != baseline)
            .map(|r| Speedup {
                competitor: r.name.clone(),
                percent: speedup_percent(baseline_ms, r.elapsed_ms),
            })
            .collect();

        Ok(Self {
            baseline: baseline.to_string(),
            results,
            speedups,
        })
    }

    /// Adapter name to summary line, in execution order.
    pub fn summary(&self) -> Map<String, Value> {
        self.results
            .iter()
            .map(|r| (r.name.clone(), Value::String(r.summary_line())))
            .collect()
    }

    pub fn summary_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(&self.summary())?)
    }

    /// `"<baseline> is <percent>% faster than <competitor>"`, one per competitor.
    pub fn comparison_lines(&self) -> Vec<String> {
        self.speedups
            .iter()
            .map(|s| {
                format!(
                    "{} is {:.2}% faster than {}",
                    self.baseline, s.percent, s.competitor
                )
            })
            .collect()
    }

    /// Full stdout rendering: summary JSON then the comparison lines.
    pub fn render(&self) -> Result<String, ReportError> {
        let mut out = self.summary_json()?;
        out.push('\n');
        for line in self.comparison_lines() {
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }
}
