// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Target adapter: the sonic client with a configurable pool policy.

use std::time::Instant;

use crate::adapter::{drive, Adapter, AdapterDescriptor, BenchRuntime, RunStats};
use crate::error::AdapterError;
use crate::sonic::{PoolPolicy, SonicClient, Target};

/// Cooperative adapter whose pool size is the concurrency bound.
pub struct SonicAdapter {
    descriptor: AdapterDescriptor,
    policy: PoolPolicy,
}

impl SonicAdapter {
    pub fn new(descriptor: AdapterDescriptor, policy: PoolPolicy) -> Self {
        Self { descriptor, policy }
    }
}

impl Adapter for SonicAdapter {
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
        let target = Target::parse(url).map_err(|e| AdapterError::Request {
            adapter: name.to_string(),
            reason: e.to_string(),
        })?;
        let client = SonicClient::new(concurrency, self.policy);
        tracing::debug!(
            adapter = %name,
            policy = ?client.pool().policy(),
            pool_size = client.pool().size(),
            "Connection pool ready"
        );

        let (client, target) = (&client, &target);
        runtime.block_on(async move {
            let start = Instant::now();
            let completed = drive(requests, move || async move {
                client
                    .get_target(target)
                    .await
                    .map(|_| ())
                    .map_err(|e| AdapterError::Request {
                        adapter: name.to_string(),
                        reason: e.to_string(),
                    })
            })
            .await?;

            Ok::<_, AdapterError>(RunStats {
                elapsed: start.elapsed(),
                completed,
            })
        })
    }
}
