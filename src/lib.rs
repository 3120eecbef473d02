// src/lib.rs

pub mod backend;
pub mod cli;
pub mod config;
pub mod contract;
pub mod engine;
pub mod errors;
pub mod gaps;
pub mod logging;
pub mod types;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::backend::http::http_backends;
use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::ConfigFile;
use crate::engine::{Backends, ContractWatcher, JobQueueItem, WatcherStats};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the HTTP backends
/// - the watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let (source, artifacts, dispatcher) = http_backends(&cfg);
    let backends = Backends::new(source, artifacts, dispatcher);

    if args.once {
        if !cfg.watcher.enabled {
            warn!("watcher disabled in config; --once does nothing");
            return Ok(());
        }
        let watcher = ContractWatcher::new(cfg.watcher.clone(), backends)?;
        return run_once(watcher).await;
    }

    let watcher = ContractWatcher::spawn(cfg.watcher.clone(), backends)?;
    if !watcher.is_running() {
        warn!(
            enabled = cfg.watcher.enabled,
            auto_start = cfg.watcher.auto_start,
            "watcher not started; waiting for Ctrl-C"
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received; shutting down");

    let stats = watcher.stats();
    watcher.dispose().await;
    info!(?stats, "final stats");
    Ok(())
}

#[derive(Serialize)]
struct StatusReport {
    stats: WatcherStats,
    queue: Vec<JobQueueItem>,
}

/// `--once`: one pass, let the dispatches (and their follow-ups) settle,
/// print the outcome as JSON.
async fn run_once(watcher: ContractWatcher) -> Result<()> {
    let report = watcher.reconcile_now().await?;
    info!(?report, "single pass finished; waiting for dispatches to settle");

    watcher.wait_idle().await;

    let status = StatusReport {
        stats: watcher.stats(),
        queue: watcher.queue_snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&status)?);

    watcher.dispose().await;
    Ok(())
}

/// Print the effective configuration.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    println!("contract-watch dry-run");
    println!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
