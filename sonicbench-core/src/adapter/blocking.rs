// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Competitor: reqwest's blocking client fanned out over a rayon pool.
//!
//! The pool has exactly `concurrency` workers, so at most that many requests
//! are in flight. Pool construction happens before the clock starts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::adapter::{Adapter, AdapterDescriptor, BenchRuntime, RunStats};
use crate::config::MAX_CONCURRENCY;
use crate::error::AdapterError;

pub struct BlockingAdapter {
    descriptor: AdapterDescriptor,
}

impl BlockingAdapter {
    pub fn new(descriptor: AdapterDescriptor) -> Self {
        Self { descriptor }
    }

    fn fetch(client: &reqwest::blocking::Client, url: &str) -> Result<(), reqwest::Error> {
        client.get(url).send()?.bytes()?;
        Ok(())
    }
}

impl Adapter for BlockingAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    fn run(
        &self,
        _runtime: &BenchRuntime,
        url: &str,
        requests: u64,
        concurrency: usize,
    ) -> Result<RunStats, AdapterError> {
        let name = &self.descriptor.name;
        let workers = concurrency.clamp(1, MAX_CONCURRENCY);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("sonicbench-blocking-{}", i))
            .build()
            .map_err(|e| AdapterError::WorkerPool {
                adapter: name.clone(),
                reason: e.to_string(),
            })?;
        let client = reqwest::blocking::Client::builder()
            .pool_max_idle_per_host(workers)
            .build()
            .map_err(|e| AdapterError::Unavailable {
                adapter: name.clone(),
                reason: e.to_string(),
            })?;

        let completed = AtomicU64::new(0);
        let first_error: Mutex<Option<String>> = Mutex::new(None);

        let start = Instant::now();
        pool.scope(|scope| {
            for _ in 0..requests {
                scope.spawn(|_| {
                    // Stop issuing work once something failed.
                    if first_error
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .is_some()
                    {
                        return;
                    }
                    match Self::fetch(&client, url) {
                        Ok(()) => {
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            let mut slot = first_error.lock().unwrap_or_else(|e| e.into_inner());
                            slot.get_or_insert_with(|| e.to_string());
                        }
                    }
                });
            }
        });
        let elapsed = start.elapsed();

        if let Some(reason) = first_error.into_inner().unwrap_or_else(|e| e.into_inner()) {
            return Err(AdapterError::Request {
                adapter: name.clone(),
                reason,
            });
        }

        Ok(RunStats {
            elapsed,
            completed: completed.into_inner(),
        })
    }
}
