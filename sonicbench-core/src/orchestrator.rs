// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Orchestrator: sequences one comparative run.
//!
//! Start responder -> probe -> measure each enabled adapter -> report -> gate.
//! The responder is owned by a [`ServerHandle`] for the whole run, so it is
//! terminated on success, on a fatal error and on a gate failure alike.

use std::io::Write;
use std::path::PathBuf;

use crate::adapter::{Adapter, BenchRuntime};
use crate::config::HarnessConfig;
use crate::error::{BenchError, BenchResult, ConfigError, ReportError, ServerError};
use crate::gate;
use crate::load::{LoadGenerator, Measurement};
use crate::probe::ReadinessProber;
use crate::report::BenchmarkReport;
use crate::reporter::{JsonReporter, SavedReport};
use crate::server::{ServerHandle, ServerLauncher};

/// Where the responder comes from.
#[derive(Debug, Clone)]
pub enum ServerSource {
    /// Always use this launcher.
    Fixed(ServerLauncher),
    /// Build the Go responder if a toolchain is present, else `fallback`.
    PreferGo { fallback: ServerLauncher },
}

/// An adapter that was left out of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAdapter {
    pub name: String,
    pub reason: String,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: BenchmarkReport,
    pub skipped: Vec<SkippedAdapter>,
    pub saved_to: Option<PathBuf>,
}

pub struct Orchestrator {
    config: HarnessConfig,
    adapters: Vec<Box<dyn Adapter>>,
    source: ServerSource,
    reporter: Option<JsonReporter>,
}

impl Orchestrator {
    /// Orchestrator over `adapters`, in execution order, using the embedded responder.
    pub fn new(config: HarnessConfig, adapters: Vec<Box<dyn Adapter>>) -> Self {
        Self {
            config,
            adapters,
            source: ServerSource::Fixed(ServerLauncher::Embedded),
            reporter: None,
        }
    }

    pub fn with_source(mut self, source: ServerSource) -> Self {
        self.source = source;
        self
    }

    /// Also save each report through `reporter`.
    pub fn with_reporter(mut self, reporter: JsonReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Start a responder on a random port and run the comparison.
    ///
    /// The report is written to `out`; logs go through `tracing`.
    pub fn run(&self, out: &mut dyn Write) -> BenchResult<RunOutcome> {
        self.check_target()?;
        let port = self.config.server.pick_port()?;

        // Holds the built Go binary for the lifetime of the run.
        let mut build_dir = None;
        let launcher = match &self.source {
            ServerSource::Fixed(launcher) => launcher.clone(),
            ServerSource::PreferGo { fallback } => {
                let go_source = &self.config.server.go_source;
                let dir = build_dir.insert(
                    tempfile::Builder::new()
                        .prefix("sonicbench-")
                        .tempdir()
                        .map_err(|e| ServerError::BuildFailed {
                            source_path: go_source.clone(),
                            reason: e.to_string(),
                        })?,
                );
                ServerLauncher::prefer_go(go_source, dir.path(), fallback.clone())
            }
        };

        let server = launcher.start(port, self.config.server.grace)?;
        self.run_on(server, out)
    }

    /// Run the comparison against an already started responder.
    ///
    /// Takes ownership of `server` and terminates it before returning.
    pub fn run_on(&self, mut server: ServerHandle, out: &mut dyn Write) -> BenchResult<RunOutcome> {
        self.check_target()?;
        let url = server.url();
        let benchmark = &self.config.benchmark;

        ReadinessProber::new(self.config.probe).wait_ready(&url)?;
        server.mark_ready();

        let runtime = BenchRuntime::new().map_err(BenchError::Runtime)?;
        let generator = LoadGenerator::new();

        let mut results = Vec::with_capacity(self.adapters.len());
        let mut skipped = Vec::new();
        for adapter in &self.adapters {
            let descriptor = adapter.descriptor();
            if !descriptor.enabled {
                tracing::debug!(adapter = %descriptor.name, "Adapter disabled, not measured");
                continue;
            }

            let measurement = generator.measure(adapter.as_ref(), &runtime, &url, benchmark)?;
            if let Measurement::Skipped { name, reason } = &measurement {
                tracing::warn!(adapter = %name, reason = %reason, "Adapter unavailable, skipped");
                skipped.push(SkippedAdapter {
                    name: name.clone(),
                    reason: reason.clone(),
                });
            }
            results.push(measurement.into_result());
        }

        // Closes the pooled client connections before the responder stops.
        drop(runtime);

        let report = BenchmarkReport::build(benchmark.target(), &results)?;
        out.write_all(report.render()?.as_bytes())
            .map_err(ReportError::from)?;
        out.flush().map_err(ReportError::from)?;

        let saved_to = match &self.reporter {
            Some(reporter) => {
                let path = reporter.save(&SavedReport::new(benchmark, report.clone()))?;
                tracing::info!(path = %path.display(), "Saved report");
                Some(path)
            }
            None => None,
        };

        gate::assert_fastest(benchmark.target(), &results)?;

        server.terminate();
        Ok(RunOutcome {
            report,
            skipped,
            saved_to,
        })
    }

    /// The target must be one of the enabled adapters.
    fn check_target(&self) -> Result<(), ConfigError> {
        let target = self.config.benchmark.target();
        let measured = self
            .adapters
            .iter()
            .map(|adapter| adapter.descriptor())
            .any(|descriptor| descriptor.enabled && descriptor.name == target);
        if measured {
            Ok(())
        } else {
            Err(ConfigError::UnknownAdapter {
                name: target.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterDescriptor, RunStats};
    use crate::config::{ConfigLoader, ConfigOverrides};
    use crate::error::{AdapterError, ProbeError};
    use crate::server::ServerState;
    use crate::types::{ExecutionCategory, Port};
    use std::time::Duration;

    struct Canned {
        descriptor: AdapterDescriptor,
        elapsed: Duration,
    }

    impl Adapter for Canned {
        fn descriptor(&self) -> &AdapterDescriptor {
            &self.descriptor
        }

        fn run(
            &self,
            _runtime: &BenchRuntime,
            _url: &str,
            requests: u64,
            _concurrency: usize,
        ) -> Result<RunStats, AdapterError> {
            Ok(RunStats {
                elapsed: self.elapsed,
                completed: requests,
            })
        }
    }

    fn canned(name: &str, ms: u64) -> Box<dyn Adapter> {
        Box::new(Canned {
            descriptor: AdapterDescriptor::new(name, ExecutionCategory::Cooperative),
            elapsed: Duration::from_millis(ms),
        })
    }

    fn config(target: &str) -> HarnessConfig {
        let overrides = ConfigOverrides {
            requests: Some(100),
            concurrency: Some(10),
            target: Some(target.to_string()),
            ..Default::default()
        };
        let yaml = "probe:\n  deadline_ms: 400\n  backoff_ms: 100\n";
        ConfigLoader::load_string(yaml, &overrides).unwrap()
    }

    fn free_port() -> Port {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        Port::new(listener.local_addr().unwrap().port()).unwrap()
    }

    #[test]
    fn test_disabled_adapters_not_measured() {
        let config = config("target");
        let orchestrator = Orchestrator::new(
            config,
            vec![
                canned("target", 120),
                Box::new(Canned {
                    descriptor: AdapterDescriptor::new("off", ExecutionCategory::Cooperative)
                        .disabled(),
                    elapsed: Duration::from_millis(1),
                }),
                canned("slow", 200),
            ],
        );

        let mut out = Vec::new();
        let outcome = orchestrator.run(&mut out).unwrap();
        let names: Vec<_> = outcome.report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["target", "slow"]);

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("target is 66.67% faster than slow"));
        assert!(!out.contains("off"));
    }

    #[test]
    fn test_unknown_target_rejected_before_start() {
        let port = free_port();
        let server = ServerLauncher::Command {
            program: PathBuf::from("sleep"),
            args: Vec::new(),
        }
        .start(port, Duration::from_millis(100))
        .unwrap();
        let watch = server.watch();

        let orchestrator = Orchestrator::new(config("sonci"), vec![canned("sonic", 10)]);
        let mut out = Vec::new();
        let err = orchestrator.run_on(server, &mut out).unwrap_err();
        assert!(matches!(
            err,
            BenchError::Config(ConfigError::UnknownAdapter { ref name }) if name == "sonci"
        ));
        assert_eq!(watch.get(), ServerState::Terminated);
        assert!(out.is_empty());

        let err = orchestrator.run(&mut out).unwrap_err();
        assert!(matches!(err, BenchError::Config(ConfigError::UnknownAdapter { .. })));
    }

    #[test]
    fn test_disabled_target_rejected() {
        let orchestrator = Orchestrator::new(
            config("target"),
            vec![
                Box::new(Canned {
                    descriptor: AdapterDescriptor::new("target", ExecutionCategory::Cooperative)
                        .disabled(),
                    elapsed: Duration::from_millis(1),
                }),
                canned("other", 10),
            ],
        );
        let mut out = Vec::new();
        assert!(matches!(
            orchestrator.run(&mut out),
            Err(BenchError::Config(ConfigError::UnknownAdapter { .. }))
        ));
    }

    #[test]
    fn test_probe_timeout_is_fatal_and_terminates() {
        let port = free_port();
        let server = ServerLauncher::Command {
            program: PathBuf::from("sleep"),
            args: Vec::new(),
        }
        .start(port, Duration::from_millis(100))
        .unwrap();
        let watch = server.watch();

        let orchestrator = Orchestrator::new(config("target"), vec![canned("target", 10)]);
        let mut out = Vec::new();
        let err = orchestrator.run_on(server, &mut out).unwrap_err();

        assert!(matches!(
            err,
            BenchError::Probe(ProbeError::StartupTimeout { .. })
        ));
        assert_eq!(watch.get(), ServerState::Terminated);
        assert!(out.is_empty());
    }
}
