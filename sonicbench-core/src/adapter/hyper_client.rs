// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Competitor: hyper's pooled legacy client behind a semaphore.

use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::adapter::{
    drive, in_flight_permits, Adapter, AdapterDescriptor, BenchRuntime, RunStats,
};
use crate::error::AdapterError;

pub struct HyperAdapter {
    descriptor: AdapterDescriptor,
}

impl HyperAdapter {
    pub fn new(descriptor: AdapterDescriptor) -> Self {
        Self { descriptor }
    }
}

impl Adapter for HyperAdapter {
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
        let failed = |reason: String| AdapterError::Request {
            adapter: name.to_string(),
            reason,
        };

        let uri = url
            .parse::<hyper::Uri>()
            .map_err(|e| failed(e.to_string()))?;
        let permits = in_flight_permits(concurrency);

        let (uri, permits, failed) = (&uri, &permits, &failed);
        runtime.block_on(async move {
            // Connection tasks are spawned onto the bench runtime.
            let client = Client::builder(TokioExecutor::new())
                .pool_max_idle_per_host(concurrency)
                .build_http::<Empty<Bytes>>();
            let client = &client;

            let start = Instant::now();
            let completed = drive(requests, move || async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|e| failed(e.to_string()))?;
                let response = client
                    .get(uri.clone())
                    .await
                    .map_err(|e| failed(e.to_string()))?;
                response
                    .into_body()
                    .collect()
                    .await
                    .map_err(|e| failed(e.to_string()))?;
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
