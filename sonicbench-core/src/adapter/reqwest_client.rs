// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Competitor: reqwest's async client behind a semaphore.

use std::time::Instant;


use crate::adapter::{
    drive, in_flight_permits, Adapter, AdapterDescriptor, BenchRuntime, RunStats,
};
use crate::error::AdapterError;

pub struct ReqwestAdapter {
    descriptor: AdapterDescriptor,
}

impl ReqwestAdapter {
    pub fn new(descriptor: AdapterDescriptor) -> Self {
        Self { descriptor }
    }
}

impl Adapter for ReqwestAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    fn run(
        &self,
        runtime: &BenchRuntime,
        url: &str,
        requests: u64,
        concurrency: usize,
    ) -> Result<RunStats, AdapterError> {
        let name = self.descriptor.name.as_str();
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(concurrency)
            .build()
            .map_err(|e| AdapterError::Unavailable {
                adapter: name.to_string(),
                reason: e.to_string(),
            })?;
        let permits = in_flight_permits(concurrency);
        let request_error = |e: reqwest::Error| AdapterError::Request {
            adapter: name.to_string(),
            reason: e.to_string(),
        };

        let (client, permits, request_error) = (&client, &permits, &request_error);
        runtime.block_on(async move {
            let start = Instant::now();
            let completed = drive(requests, move || async move {
                let _permit = permits.acquire().await.map_err(|e| AdapterError::Request {
                    adapter: name.to_string(),
                    reason: e.to_string(),
                })?;
                let response = client.get(url).send().await.map_err(request_error)?;
                response.bytes().await.map_err(request_error)?;
                Ok::<_, AdapterError>(())
            })
            .await?;

            Ok::<_, AdapterError>(RunStats {
                elapsed: start.elapsed(),
                completed,
            })
        })
    }
}
