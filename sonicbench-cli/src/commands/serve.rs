// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `sonicbench serve` - foreground responder used when no Go toolchain exists.

use sonicbench_core::server::responder;
use sonicbench_core::Port;
use tokio::signal::unix::{signal, SignalKind};

pub fn execute(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let port = Port::new(port)?;
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let mut terminate = signal(SignalKind::terminate())?;
        let shutdown = async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
            tracing::debug!("Shutdown signal received");
        };

        tracing::info!(port = %port, "Responder listening");
        responder::serve(port, shutdown).await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
