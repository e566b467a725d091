// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Persisting comparison reports as timestamped JSON files.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::config::BenchmarkConfig;
use crate::error::ReportError;
use crate::report::BenchmarkReport;

/// Host the run was measured on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub os_version: String,
    pub kernel_version: Option<String>,
    pub cpu_model: String,
    pub cpu_cores: usize,
    /// Total memory in bytes
    pub memory_bytes: u64,
    pub hostname: String,
}

impl SystemInfo {
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        let unknown = || "Unknown".to_string();

        Self {
            os: System::name().unwrap_or_else(unknown),
            os_version: System::os_version().unwrap_or_else(unknown),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(unknown),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(unknown),
        }
    }
}

/// What lands on disk: the report plus the run's context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedReport {
    pub suite: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub system_info: SystemInfo,
    pub requests: u64,
    pub concurrency: usize,
    pub report: BenchmarkReport,
}

impl SavedReport {
    pub fn new(config: &BenchmarkConfig, report: BenchmarkReport) -> Self {
        Self {
            suite: "sonicbench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
            requests: config.requests(),
            concurrency: config.concurrency(),
            report,
        }
    }
}

/// Writes reports into one output directory.
#[derive(Debug, Clone)]
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create the reporter, creating `output_dir` if needed.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ReportError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save to `sonicbench_<timestamp>.json` and return the path.
    pub fn save(&self, saved: &SavedReport) -> Result<PathBuf, ReportError> {
        let filename = format!(
            "sonicbench_{}.json",
            saved.timestamp.format("%Y-%m-%dT%H-%M-%SZ")
        );
        let path = self.output_dir.join(filename);

        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, saved)?;
        Ok(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<SavedReport, ReportError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::AdapterResult;
    use tempfile::TempDir;

    fn saved() -> SavedReport {
        let config = BenchmarkConfig::new(100, 10).unwrap();
        let report = BenchmarkReport::build(
            "sonic",
            &[
                AdapterResult::completed("sonic", 120.0, 100),
                AdapterResult::completed("hyper", 200.0, 100),
            ],
        )
        .unwrap();
        SavedReport::new(&config, report)
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path().join("reports")).unwrap();

        let path = reporter.save(&saved()).unwrap();
        assert!(path.exists());
        assert_eq!(path.parent(), Some(reporter.output_dir()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("sonicbench_"));

        let loaded = JsonReporter::load(&path).unwrap();
        assert_eq!(loaded.suite, "sonicbench");
        assert_eq!(loaded.requests, 100);
        assert_eq!(loaded.report.baseline, "sonic");
        assert_eq!(loaded.report.speedups[0].percent, 66.67);
    }

    #[test]
    fn test_system_info_collected() {
        let info = SystemInfo::collect();
        assert!(info.cpu_cores > 0);
        assert!(!info.hostname.is_empty());
    }
}
