// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Default command - run the comparison and apply the regression gate.

use sonicbench_core::{
    registry, AdapterKind, ConfigLoader, ConfigOverrides, JsonReporter, Orchestrator,
    ServerLauncher, ServerSource,
};

use crate::RunArgs;

pub fn execute(args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let overrides = overrides(args);
    let config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            ConfigLoader::load_file(path, &overrides)?
        }
        None => ConfigLoader::defaults(&overrides)?,
    };

    tracing::info!(
        requests = config.benchmark.requests(),
        concurrency = config.benchmark.concurrency(),
        target = %config.benchmark.target(),
        "Starting comparison"
    );

    let adapters = registry(&config.benchmark);
    let fallback = ServerLauncher::current_exe(&["serve"])?;
    let mut orchestrator =
        Orchestrator::new(config, adapters).with_source(ServerSource::PreferGo { fallback });
    if let Some(dir) = &args.output {
        let reporter = JsonReporter::new(dir)?;
        tracing::info!(dir = %reporter.output_dir().display(), "Saving JSON reports");
        orchestrator = orchestrator.with_reporter(reporter);
    }

    let mut stdout = std::io::stdout().lock();
    let outcome = orchestrator.run(&mut stdout)?;

    if !outcome.skipped.is_empty() {
        let names: Vec<_> = outcome.skipped.iter().map(|s| s.name.as_str()).collect();
        tracing::info!(skipped = ?names, "Some adapters were not measured");
    }
    Ok(())
}

fn overrides(args: &RunArgs) -> ConfigOverrides {
    let mut skip = Vec::new();
    if args.skip_requests {
        skip.push(AdapterKind::Blocking);
    }
    if args.skip_httpx {
        skip.push(AdapterKind::Hyper);
    }

    ConfigOverrides {
        requests: args.requests,
        concurrency: args.concurrency,
        target: args.target.clone(),
        skip,
        go_source: args.go_server.clone(),
    }
}
