// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML harness configuration with strict validation.
//!
//! The raw file is parsed, command-line overrides are merged in, and only
//! then is everything validated. An invalid field stops the run before
//! the responder is spawned.

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{AdapterKind, Port};

/// Upper bound on in-flight requests. The thread-pool adapter spawns one
/// OS thread per slot.
pub const MAX_CONCURRENCY: usize = 4096;

/// Raw probe section as parsed from YAML.
#[derive(Debug, Deserialize)]
struct RawProbeConfig {
    #[serde(default = "default_deadline_ms")]
    deadline_ms: u64,
    #[serde(default = "default_backoff_ms")]
    backoff_ms: u64,
}

fn default_deadline_ms() -> u64 {
    5000
}

fn default_backoff_ms() -> u64 {
    1000
}

impl Default for RawProbeConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Raw server section as parsed from YAML.
#[derive(Debug, Deserialize)]
struct RawServerConfig {
    #[serde(default = "default_go_source")]
    go_source: String,
    #[serde(default = "default_grace_ms")]
    grace_ms: u64,
    #[serde(default = "default_port_range")]
    port_range: (u16, u16),
}

fn default_go_source() -> String {
    "responder/server.go".to_string()
}

fn default_grace_ms() -> u64 {
    500
}

fn default_port_range() -> (u16, u16) {
    (1024, 9000)
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            go_source: default_go_source(),
            grace_ms: default_grace_ms(),
            port_range: default_port_range(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawHarnessConfig {
    #[serde(default = "default_requests")]
    requests: u64,
    #[serde(default = "default_concurrency")]
    concurrency: usize,
    #[serde(default = "default_target")]
    target: String,
    #[serde(default)]
    skip: Vec<String>,
    #[serde(default)]
    probe: RawProbeConfig,
    #[serde(default)]
    server: RawServerConfig,
}

fn default_requests() -> u64 {
    1000
}

fn default_concurrency() -> usize {
    25
}

fn default_target() -> String {
    AdapterKind::Sonic.name().to_string()
}

impl Default for RawHarnessConfig {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            concurrency: default_concurrency(),
            target: default_target(),
            skip: Vec::new(),
            probe: RawProbeConfig::default(),
            server: RawServerConfig::default(),
        }
    }
}

/// Values given on the command line. They win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub requests: Option<u64>,
    pub concurrency: Option<usize>,
    pub target: Option<String>,
    pub skip: Vec<AdapterKind>,
    pub go_source: Option<PathBuf>,
}

/// Immutable parameters of one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    requests: u64,
    concurrency: usize,
    target: String,
    enabled: BTreeSet<AdapterKind>,
}

impl BenchmarkConfig {
    /// Create a config with every built-in adapter enabled and `sonic` as target.
    pub fn new(requests: u64, concurrency: usize) -> Result<Self, ConfigError> {
        if requests == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "requests",
                value: requests.to_string(),
                reason: "Request count must be greater than 0".to_string(),
            });
        }
        if concurrency == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "concurrency",
                value: concurrency.to_string(),
                reason: "Concurrency must be greater than 0".to_string(),
            });
        }
        if concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::InvalidFieldValue {
                field: "concurrency",
                value: concurrency.to_string(),
                reason: format!("Concurrency cannot exceed {}", MAX_CONCURRENCY),
            });
        }
        if concurrency as u64 > requests {
            return Err(ConfigError::InvalidFieldValue {
                field: "concurrency",
                value: concurrency.to_string(),
                reason: format!("Concurrency cannot exceed the request count ({})", requests),
            });
        }

        Ok(Self {
            requests,
            concurrency,
            target: default_target(),
            enabled: AdapterKind::ALL.into_iter().collect(),
        })
    }

    /// Replace the baseline adapter name.
    pub fn with_target(mut self, target: impl Into<String>) -> Result<Self, ConfigError> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "target",
                value: target,
                reason: "Target adapter name cannot be empty".to_string(),
            });
        }
        self.target = target;
        Ok(self)
    }

    /// Disable one built-in adapter.
    pub fn without(mut self, kind: AdapterKind) -> Self {
        self.enabled.remove(&kind);
        self
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Name of the adapter the regression gate requires to be fastest.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_enabled(&self, kind: AdapterKind) -> bool {
        self.enabled.contains(&kind)
    }
}

/// Readiness probe timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Hard upper bound on the total wait, measured from the first attempt.
    pub deadline: Duration,
    /// Pause between failed attempts.
    pub backoff: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(default_deadline_ms()),
            backoff: Duration::from_millis(default_backoff_ms()),
        }
    }
}

/// How the disposable responder is located and stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Go responder source built when a Go toolchain is present.
    pub go_source: PathBuf,
    /// Time allowed between SIGTERM and SIGKILL.
    pub grace: Duration,
    /// Ephemeral ports are drawn from this range.
    pub port_range: Range<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let (start, end) = default_port_range();
        Self {
            go_source: PathBuf::from(default_go_source()),
            grace: Duration::from_millis(default_grace_ms()),
            port_range: start..end,
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub benchmark: BenchmarkConfig,
    pub probe: ProbeConfig,
    pub server: ServerConfig,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a YAML file, merge overrides, validate.
    pub fn load_file(
        path: impl AsRef<Path>,
        overrides: &ConfigOverrides,
    ) -> Result<HarnessConfig, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::load_string(&content, overrides)
    }

    /// Load a YAML string, merge overrides, validate.
    pub fn load_string(
        content: &str,
        overrides: &ConfigOverrides,
    ) -> Result<HarnessConfig, ConfigError> {
        // An empty document deserializes to unit, not to a mapping.
        let raw: RawHarnessConfig = if content.trim().is_empty() {
            RawHarnessConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Self::validate(raw, overrides)
    }

    /// Built-in defaults with overrides applied.
    pub fn defaults(overrides: &ConfigOverrides) -> Result<HarnessConfig, ConfigError> {
        Self::validate(RawHarnessConfig::default(), overrides)
    }

    fn validate(
        mut raw: RawHarnessConfig,
        overrides: &ConfigOverrides,
    ) -> Result<HarnessConfig, ConfigError> {
        if let Some(requests) = overrides.requests {
            raw.requests = requests;
        }
        if let Some(concurrency) = overrides.concurrency {
            raw.concurrency = concurrency;
        }
        if let Some(target) = &overrides.target {
            raw.target = target.clone();
        }
        if let Some(go_source) = &overrides.go_source {
            raw.server.go_source = go_source.to_string_lossy().into_owned();
        }

        let mut benchmark =
            BenchmarkConfig::new(raw.requests, raw.concurrency)?.with_target(raw.target)?;

        for name in &raw.skip {
            benchmark = benchmark.without(AdapterKind::from_name(name)?);
        }
        for kind in &overrides.skip {
            benchmark = benchmark.without(*kind);
        }
        // Built-in targets take their canonical name so the report can find them.
        if let Ok(kind) = AdapterKind::from_name(benchmark.target()) {
            benchmark = benchmark.with_target(kind.name())?;
            if !benchmark.is_enabled(kind) {
                return Err(ConfigError::InvalidFieldValue {
                    field: "target",
                    value: benchmark.target().to_string(),
                    reason: "Target adapter is skipped".to_string(),
                });
            }
        }

        let probe = Self::validate_probe(raw.probe)?;
        let server = Self::validate_server(raw.server)?;

        Ok(HarnessConfig {
            benchmark,
            probe,
            server,
        })
    }

    fn validate_probe(raw: RawProbeConfig) -> Result<ProbeConfig, ConfigError> {
        if raw.deadline_ms == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "probe.deadline_ms",
                value: "0".to_string(),
                reason: "Deadline must be greater than 0".to_string(),
            });
        }
        if raw.backoff_ms == 0 || raw.backoff_ms > raw.deadline_ms {
            return Err(ConfigError::InvalidFieldValue {
                field: "probe.backoff_ms",
                value: raw.backoff_ms.to_string(),
                reason: format!("Must be between 1 and the deadline ({}ms)", raw.deadline_ms),
            });
        }

        Ok(ProbeConfig {
            deadline: Duration::from_millis(raw.deadline_ms),
            backoff: Duration::from_millis(raw.backoff_ms),
        })
    }

    fn validate_server(raw: RawServerConfig) -> Result<ServerConfig, ConfigError> {
        let (start, end) = raw.port_range;
        if start < 1024 {
            return Err(ConfigError::InvalidPort {
                port: start,
                reason: "Ephemeral ports must be non-privileged (>= 1024)".to_string(),
            });
        }
        if end <= start {
            return Err(ConfigError::InvalidFieldValue {
                field: "server.port_range",
                value: format!("[{}, {}]", start, end),
                reason: "Range end must be greater than its start".to_string(),
            });
        }
        if raw.go_source.is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "server.go_source",
                value: raw.go_source,
                reason: "Path cannot be empty".to_string(),
            });
        }

        Ok(ServerConfig {
            go_source: PathBuf::from(raw.go_source),
            grace: Duration::from_millis(raw.grace_ms),
            port_range: start..end,
        })
    }
}

impl ServerConfig {
    /// Pick a random port from the configured range.
    pub fn pick_port(&self) -> Result<Port, ConfigError> {
        use rand::Rng;
        if self.port_range.is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "server.port_range",
                value: format!("{:?}", self.port_range),
                reason: "Range is empty".to_string(),
            });
        }
        let port = rand::thread_rng().gen_range(self.port_range.clone());
        Port::new(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
requests: 500
concurrency: 10
target: sonic
skip: [hyper]
probe:
  deadline_ms: 2000
  backoff_ms: 250
server:
  go_source: tools/server.go
  grace_ms: 100
  port_range: [20000, 21000]
"#;

    #[test]
    fn test_full_config() {
        let config = ConfigLoader::load_string(FULL_CONFIG, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.benchmark.requests(), 500);
        assert_eq!(config.benchmark.concurrency(), 10);
        assert!(!config.benchmark.is_enabled(AdapterKind::Hyper));
        assert!(config.benchmark.is_enabled(AdapterKind::Blocking));
        assert_eq!(config.probe.deadline, Duration::from_secs(2));
        assert_eq!(config.probe.backoff, Duration::from_millis(250));
        assert_eq!(config.server.port_range, 20000..21000);
        assert_eq!(config.server.go_source, PathBuf::from("tools/server.go"));
    }

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::load_string("", &ConfigOverrides::default()).unwrap();
        assert_eq!(config.benchmark.requests(), 1000);
        assert_eq!(config.benchmark.concurrency(), 25);
        assert_eq!(config.benchmark.target(), "sonic");
        assert_eq!(config.probe, ProbeConfig::default());
        assert_eq!(config.server, ServerConfig::default());
        for kind in AdapterKind::ALL {
            assert!(config.benchmark.is_enabled(kind));
        }
    }

    #[test]
    fn test_overrides_win() {
        let overrides = ConfigOverrides {
            requests: Some(42),
            concurrency: Some(7),
            skip: vec![AdapterKind::Blocking],
            ..Default::default()
        };
        let config = ConfigLoader::load_string(FULL_CONFIG, &overrides).unwrap();
        assert_eq!(config.benchmark.requests(), 42);
        assert_eq!(config.benchmark.concurrency(), 7);
        assert!(!config.benchmark.is_enabled(AdapterKind::Blocking));
        assert!(!config.benchmark.is_enabled(AdapterKind::Hyper));
    }

    #[test]
    fn test_zero_requests_rejected() {
        let overrides = ConfigOverrides {
            requests: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::defaults(&overrides),
            Err(ConfigError::InvalidFieldValue { field: "requests", .. })
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(BenchmarkConfig::new(10, 0).is_err());
    }

    #[test]
    fn test_concurrency_bounded() {
        assert!(matches!(
            BenchmarkConfig::new(10, usize::MAX),
            Err(ConfigError::InvalidFieldValue { field: "concurrency", .. })
        ));
        assert!(matches!(
            BenchmarkConfig::new(u64::MAX, MAX_CONCURRENCY + 1),
            Err(ConfigError::InvalidFieldValue { field: "concurrency", .. })
        ));
        assert!(BenchmarkConfig::new(10, 11).is_err());
        assert!(BenchmarkConfig::new(10, 10).is_ok());
        assert!(BenchmarkConfig::new(u64::MAX, MAX_CONCURRENCY).is_ok());
    }

    #[test]
    fn test_skipped_target_rejected() {
        let yaml = "target: sonic\nskip: [sonic]\n";
        assert!(matches!(
            ConfigLoader::load_string(yaml, &ConfigOverrides::default()),
            Err(ConfigError::InvalidFieldValue { field: "target", .. })
        ));

        let overrides = ConfigOverrides {
            target: Some("blocking".to_string()),
            skip: vec![AdapterKind::Blocking],
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::defaults(&overrides),
            Err(ConfigError::InvalidFieldValue { field: "target", .. })
        ));
    }

    #[test]
    fn test_builtin_target_canonicalized() {
        let overrides = ConfigOverrides {
            target: Some("Sonic_Cyclic".to_string()),
            ..Default::default()
        };
        let config = ConfigLoader::defaults(&overrides).unwrap();
        assert_eq!(config.benchmark.target(), "sonic cyclic");
    }

    #[test]
    fn test_unknown_skip_rejected() {
        let yaml = "skip: [curl]\n";
        assert!(matches!(
            ConfigLoader::load_string(yaml, &ConfigOverrides::default()),
            Err(ConfigError::UnknownAdapter { .. })
        ));
    }

    #[test]
    fn test_privileged_port_range_rejected() {
        let yaml = "server:\n  port_range: [80, 9000]\n";
        assert!(matches!(
            ConfigLoader::load_string(yaml, &ConfigOverrides::default()),
            Err(ConfigError::InvalidPort { port: 80, .. })
        ));
    }

    #[test]
    fn test_backoff_longer_than_deadline_rejected() {
        let yaml = "probe:\n  deadline_ms: 100\n  backoff_ms: 1000\n";
        assert!(ConfigLoader::load_string(yaml, &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::load_file("/nonexistent/sonicbench.yaml", &ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sonicbench.yaml");
        std::fs::write(&path, FULL_CONFIG).unwrap();
        let config = ConfigLoader::load_file(&path, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.benchmark.requests(), 500);
    }

    #[test]
    fn test_pick_port_in_range() {
        let server = ServerConfig::default();
        for _ in 0..100 {
            let port = server.pick_port().unwrap().value();
            assert!((1024..9000).contains(&port));
        }
    }

    #[test]
    fn test_empty_target_rejected() {
        let config = BenchmarkConfig::new(10, 2).unwrap();
        assert!(config.with_target("  ").is_err());
    }
}
