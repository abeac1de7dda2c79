// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dd_containerd::config::load_config;
use dd_containerd::{ContainerInfo, ContainerdEngine, InMemoryContainerCache, ProcessInfo};
use log::{LevelFilter, info, warn};
use serde_json::json;
use simple_logger::SimpleLogger;

#[derive(Parser, Debug)]
#[command(name = "containerd-resolve")]
#[command(about = "Resolves the containerd container of running processes", long_about = None)]
struct Args {
    /// Process IDs to resolve
    #[arg(short, long = "pid", required = true)]
    pids: Vec<i32>,

    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host root prefix (overrides the configuration)
    #[arg(long)]
    host_root: Option<PathBuf>,
}

#[tokio::main]
#[allow(clippy::print_stdout)]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The logger accepts every level and the global max level does the
    // filtering, so it can be installed before the configured level is known.
    SimpleLogger::new()
        .with_level(LevelFilter::Trace)
        .init()
        .context("failed to initialize logger")?;
    log::set_max_level(LevelFilter::Info);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(host_root) = args.host_root {
        config.host_root = host_root;
    }
    log::set_max_level(config.log_level().to_level_filter());

    let cache = Arc::new(InMemoryContainerCache::new().with_observer(Box::new(
        |container: &ContainerInfo, process: &ProcessInfo| {
            info!(
                "new container {} ({}) for pid {}",
                container.id, container.image, process.pid
            );
        },
    )));

    let engine = ContainerdEngine::connect(&config, cache.clone()).await;
    if !engine.is_active() {
        warn!("no containerd socket answered, nothing will be resolved");
    }

    let proc_root = config.proc_root();
    let mut processes = Vec::with_capacity(args.pids.len());
    for pid in args.pids {
        let mut process = match ProcessInfo::from_procfs(&proc_root, pid) {
            Ok(process) => process,
            Err(e) => {
                warn!("could not read cgroups of pid {pid}: {e}");
                continue;
            }
        };

        let resolved = engine.resolve(&mut process, true).await;
        processes.push(json!({
            "pid": pid,
            "resolved": resolved,
            "container_id": process.container_id,
        }));
    }

    let containers = cache.containers();
    let containers: Vec<&ContainerInfo> = containers.iter().map(|c| &**c).collect();
    let output = json!({
        "processes": processes,
        "containers": containers,
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("failed to serialize results")?
    );

    Ok(())
}
