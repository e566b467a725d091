// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Adapters: one uniform `run` capability per HTTP client implementation.
//!
//! Each adapter issues exactly `requests` GETs against a URL with at most
//! `concurrency` in flight and reports the wall-clock time from the first
//! dispatch to the last completion.
//!
//! Cooperative adapters run on the single-threaded [`BenchRuntime`] created
//! by the orchestrator; thread-pool adapters block the calling thread while a
//! pool of exactly `concurrency` workers drains the requests.

#[cfg(feature = "thread-pool")]
pub mod blocking;
pub mod hyper_client;
pub mod reqwest_client;
pub mod sonic;

use std::future::Future;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::config::BenchmarkConfig;
use crate::error::AdapterError;
use crate::types::{AdapterKind, ExecutionCategory};

/// Static description of an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDescriptor {
    pub name: String,
    pub category: ExecutionCategory,
    pub enabled: bool,
}

impl AdapterDescriptor {
    pub fn new(name: impl Into<String>, category: ExecutionCategory) -> Self {
        Self {
            name: name.into(),
            category,
            enabled: true,
        }
    }

    /// Descriptor for a built-in adapter under `config`.
    pub fn builtin(kind: AdapterKind, config: &BenchmarkConfig) -> Self {
        Self {
            name: kind.name().to_string(),
            category: kind.category(),
            enabled: config.is_enabled(kind),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Whether an adapter can run on this host and build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable { reason: String },
}

/// What one adapter run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub elapsed: Duration,
    pub completed: u64,
}

/// Explicit runtime for cooperative adapters.
///
/// Created once per run and handed to every adapter, instead of installing
/// a process-global event loop.
pub struct BenchRuntime {
    runtime: tokio::runtime::Runtime,
}

impl BenchRuntime {
    /// Single-threaded runtime with I/O and timers enabled.
    pub fn new() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// One HTTP client implementation under test.
pub trait Adapter: Send + Sync {
    fn descriptor(&self) -> &AdapterDescriptor;

    /// Resolved once at registration time.
    fn availability(&self) -> Availability {
        Availability::Available
    }

    /// Issue exactly `requests` GETs to `url`, at most `concurrency` at once.
    ///
    /// Must not be called from inside an async runtime.
    fn run(
        &self,
        runtime: &BenchRuntime,
        url: &str,
        requests: u64,
        concurrency: usize,
    ) -> Result<RunStats, AdapterError>;
}

/// Placeholder for a built-in adapter that this build or host cannot run.
pub struct UnavailableAdapter {
    descriptor: AdapterDescriptor,
    reason: String,
}

impl UnavailableAdapter {
    pub fn new(descriptor: AdapterDescriptor, reason: impl Into<String>) -> Self {
        Self {
            descriptor,
            reason: reason.into(),
        }
    }
}

impl Adapter for UnavailableAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    fn availability(&self) -> Availability {
        Availability::Unavailable {
            reason: self.reason.clone(),
        }
    }

    fn run(
        &self,
        _runtime: &BenchRuntime,
        _url: &str,
        _requests: u64,
        _concurrency: usize,
    ) -> Result<RunStats, AdapterError> {
        Err(AdapterError::Unavailable {
            adapter: self.descriptor.name.clone(),
            reason: self.reason.clone(),
        })
    }
}

/// Static registry of the built-in adapters, in execution order.
pub fn registry(config: &BenchmarkConfig) -> Vec<Box<dyn Adapter>> {
    AdapterKind::ALL
        .into_iter()
        .map(|kind| builtin(kind, config))
        .collect()
}

fn builtin(kind: AdapterKind, config: &BenchmarkConfig) -> Box<dyn Adapter> {
    let descriptor = AdapterDescriptor::builtin(kind, config);
    match kind {
        AdapterKind::Sonic => Box::new(sonic::SonicAdapter::new(
            descriptor,
            crate::sonic::PoolPolicy::Smart,
        )),
        AdapterKind::SonicCyclic => Box::new(sonic::SonicAdapter::new(
            descriptor,
            crate::sonic::PoolPolicy::Cyclic,
        )),
        AdapterKind::Reqwest => Box::new(reqwest_client::ReqwestAdapter::new(descriptor)),
        AdapterKind::Hyper => Box::new(hyper_client::HyperAdapter::new(descriptor)),
        AdapterKind::Blocking => blocking_adapter(descriptor),
    }
}

#[cfg(feature = "thread-pool")]
fn blocking_adapter(descriptor: AdapterDescriptor) -> Box<dyn Adapter> {
    Box::new(blocking::BlockingAdapter::new(descriptor))
}

#[cfg(not(feature = "thread-pool"))]
fn blocking_adapter(descriptor: AdapterDescriptor) -> Box<dyn Adapter> {
    Box::new(UnavailableAdapter::new(
        descriptor,
        "built without the `thread-pool` feature",
    ))
}

/// Semaphore admitting at most `concurrency` requests, never fewer than one.
pub(crate) fn in_flight_permits(concurrency: usize) -> Semaphore {
    Semaphore::new(concurrency.clamp(1, Semaphore::MAX_PERMITS))
}

/// Drive `requests` fetches to completion on the current task.
///
/// All futures are created up front; `fetch` is responsible for waiting on
/// whatever bounds concurrency (a pool slot or a semaphore permit). The first
/// error aborts the batch.
pub(crate) async fn drive<F, Fut>(requests: u64, fetch: F) -> Result<u64, AdapterError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), AdapterError>>,
{
    let mut pending: FuturesUnordered<Fut> = (0..requests).map(|_| fetch()).collect();
    let mut completed = 0u64;
    while let Some(result) = pending.next().await {
        result?;
        completed += 1;
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_registry_order_and_flags() {
        let config = BenchmarkConfig::new(10, 2)
            .unwrap()
            .without(AdapterKind::Hyper);
        let adapters = registry(&config);

        let names: Vec<_> = adapters
            .iter()
            .map(|a| a.descriptor().name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["reqwest", "sonic", "blocking", "sonic cyclic", "hyper"]
        );

        let hyper = &adapters[4];
        assert!(!hyper.descriptor().enabled);
        assert!(adapters[1].descriptor().enabled);
        assert_eq!(
            adapters[2].descriptor().category,
            ExecutionCategory::ThreadPool
        );
    }

    #[cfg(feature = "thread-pool")]
    #[test]
    fn test_blocking_available_with_feature() {
        let config = BenchmarkConfig::new(10, 2).unwrap();
        let adapters = registry(&config);
        assert_eq!(adapters[2].availability(), Availability::Available);
    }

    #[test]
    fn test_unavailable_adapter_reports_reason() {
        let adapter = UnavailableAdapter::new(
            AdapterDescriptor::new("ghost", ExecutionCategory::Cooperative),
            "not on this host",
        );
        let runtime = BenchRuntime::new().unwrap();
        assert!(matches!(
            adapter.availability(),
            Availability::Unavailable { .. }
        ));
        assert!(matches!(
            adapter.run(&runtime, "http://127.0.0.1:1/", 1, 1),
            Err(AdapterError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_in_flight_permits_clamped() {
        assert_eq!(in_flight_permits(0).available_permits(), 1);
        assert_eq!(in_flight_permits(7).available_permits(), 7);
        assert_eq!(
            in_flight_permits(usize::MAX).available_permits(),
            Semaphore::MAX_PERMITS
        );
    }

    #[test]
    fn test_drive_counts_every_fetch() {
        let runtime = BenchRuntime::new().unwrap();
        let calls = Rc::new(Cell::new(0u64));
        let completed = runtime
            .block_on(drive(57, || {
                let calls = calls.clone();
                async move {
                    tokio::task::yield_now().await;
                    calls.set(calls.get() + 1);
                    Ok(())
                }
            }))
            .unwrap();
        assert_eq!(completed, 57);
        assert_eq!(calls.get(), 57);
    }

    #[test]
    fn test_drive_stops_on_error() {
        let runtime = BenchRuntime::new().unwrap();
        let result = runtime.block_on(drive(5, || async {
            Err(AdapterError::Request {
                adapter: "test".to_string(),
                reason: "boom".to_string(),
            })
        }));
        assert!(matches!(result, Err(AdapterError::Request { .. })));
    }
}
