// src/engine/watcher.rs

//! Async IO shell around [`WatcherCore`].
//!
//! The shell owns:
//! - the ticker task (poll interval + retention interval, stopped through a
//!   oneshot signal)
//! - the three backends
//! - one Tokio task per dispatch, living only until the outcome is recorded
//!
//! All state lives in the core, behind a `std::sync::Mutex` that is never
//! held across an `.await`.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::backend::{ArtifactStore, BoxFuture, ContractSource, DispatchParams, JobDispatcher};
use crate::config::{validate_watcher_config, WatcherConfig};
use crate::contract::Contract;
use crate::engine::core::WatcherCore;
use crate::engine::queue::JobQueueItem;
use crate::engine::stats::WatcherStats;
use crate::engine::{CoreCommand, CoreStep, DispatchOutcome};
use crate::errors::{Result, WatchError};
use crate::gaps::KnownArtifacts;

/// The three collaborators the watcher talks to.
#[derive(Clone)]
pub struct Backends {
    pub source: Arc<dyn ContractSource>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub dispatcher: Arc<dyn JobDispatcher>,
}

impl Backends {
    pub fn new(
        source: impl ContractSource + 'static,
        artifacts: impl ArtifactStore + 'static,
        dispatcher: impl JobDispatcher + 'static,
    ) -> Self {
        Self {
            source: Arc::new(source),
            artifacts: Arc::new(artifacts),
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Summary of one detection + dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub contracts: usize,
    pub looked_up: usize,
    pub enqueued: usize,
    pub dispatched: usize,
    pub removed: usize,
}

struct Shared {
    config: WatcherConfig,
    backends: Backends,
    core: Mutex<WatcherCore>,
    /// Signalled whenever a dispatch settles or a follow-up finishes.
    settled: Notify,
}

impl Shared {
    fn core(&self) -> MutexGuard<'_, WatcherCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Ticker {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Contract workflow watcher.
///
/// Lifecycle: [`ContractWatcher::new`] → [`start`](Self::start) →
/// [`stop`](Self::stop) → [`dispose`](Self::dispose). `start` and `stop`
/// may be repeated; `start` must be called from within a Tokio runtime.
pub struct ContractWatcher {
    shared: Arc<Shared>,
    ticker: Mutex<Option<Ticker>>,
}

impl fmt::Debug for ContractWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractWatcher")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ContractWatcher {
    /// Build a stopped watcher. Never starts polling, whatever `auto_start`
    /// says.
    pub fn new(config: WatcherConfig, backends: Backends) -> Result<Self> {
        validate_watcher_config(&config)?;
        let core = WatcherCore::from_config(&config);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                backends,
                core: Mutex::new(core),
                settled: Notify::new(),
            }),
            ticker: Mutex::new(None),
        })
    }

    /// Build a watcher and start it when `auto_start` is set.
    pub fn spawn(config: WatcherConfig, backends: Backends) -> Result<Self> {
        let auto_start = config.auto_start;
        let watcher = Self::new(config, backends)?;
        if auto_start {
            watcher.start();
        }
        Ok(watcher)
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.shared.config
    }

    fn ticker(&self) -> MutexGuard<'_, Option<Ticker>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.ticker().is_some()
    }

    /// Start polling: one pass right away, then one per poll interval.
    ///
    /// No-op when already running or when the watcher is disabled.
    pub fn start(&self) {
        if !self.shared.config.enabled {
            info!("contract watcher disabled; start ignored");
            return;
        }

        let mut ticker = self.ticker();
        if ticker.is_some() {
            debug!("contract watcher already running");
            return;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(ticker_loop(Arc::clone(&self.shared), stop_rx));
        *ticker = Some(Ticker { stop_tx, handle });

        info!(
            poll_interval_ms = self.shared.config.poll_interval_ms,
            max_concurrent = self.shared.config.max_concurrent,
            "contract watcher started"
        );
    }

    /// Disarm the timers. Dispatches already in flight settle normally.
    ///
    /// No-op when not running.
    pub fn stop(&self) {
        let Some(ticker) = self.ticker().take() else {
            debug!("contract watcher not running; stop ignored");
            return;
        };
        // The loop may already be gone if it panicked; nothing to do then.
        let _ = ticker.stop_tx.send(());
        info!("contract watcher stopped");
    }

    /// Stop and wait for the ticker task to exit.
    ///
    /// In-flight dispatch tasks are not awaited; use
    /// [`wait_idle`](Self::wait_idle) first to let them settle.
    pub async fn dispose(self) {
        let ticker = self.ticker().take();
        if let Some(ticker) = ticker {
            let _ = ticker.stop_tx.send(());
            if let Err(err) = ticker.handle.await {
                warn!(error = %err, "ticker task ended abnormally");
            }
            info!("contract watcher disposed");
        }
    }

    /// Owned copy of every queue item.
    pub fn queue_snapshot(&self) -> Vec<JobQueueItem> {
        self.shared.core().snapshot()
    }

    pub fn stats(&self) -> WatcherStats {
        self.shared.core().stats()
    }

    /// Drop all items and reset the stats.
    pub fn clear_queue(&self) {
        self.shared.core().clear();
        info!("queue and stats cleared");
    }

    /// Run a full pass now: refresh the snapshot, sweep resolved contracts,
    /// enqueue and dispatch. Works whether or not the watcher is started.
    pub async fn reconcile_now(&self) -> Result<PassReport> {
        run_pass(&self.shared).await
    }

    /// Drop completed/failed items now instead of waiting for the retention
    /// interval.
    pub fn purge_terminal_now(&self) -> usize {
        self.shared.core().sweep_terminal()
    }

    /// Wait until nothing is queued, in flight, or waiting for a follow-up.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.core().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for ContractWatcher {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker().take() {
            let _ = ticker.stop_tx.send(());
        }
    }
}

async fn ticker_loop(shared: Arc<Shared>, mut stop_rx: oneshot::Receiver<()>) {
    let mut poll = time::interval(shared.config.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let retention = shared.config.retention();
    let mut sweep = time::interval_at(Instant::now() + retention, retention);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = &mut stop_rx => {
                debug!("ticker received stop signal");
                break;
            }
            _ = poll.tick() => {
                match run_pass(&shared).await {
                    Ok(report) => debug!(?report, "pass finished"),
                    Err(err) => warn!(error = %err, "pass aborted; will retry next tick"),
                }
            }
            _ = sweep.tick() => {
                let removed = shared.core().sweep_terminal();
                debug!(removed, "retention sweep");
            }
        }
    }

    debug!("ticker loop exited");
}

/// One detection + dispatch pass.
///
/// A failing contract or artifact lookup aborts the pass before the queue
/// is touched.
async fn run_pass(shared: &Arc<Shared>) -> Result<PassReport> {
    let contracts = match shared.backends.source.fetch_contracts().await {
        Ok(contracts) => contracts,
        Err(err) => {
            shared.core().record_lookup_failure();
            return Err(err);
        }
    };

    let to_check: Vec<Contract> = {
        let core = shared.core();
        contracts
            .iter()
            .filter(|c| core.needs_lookup(c))
            .cloned()
            .collect()
    };

    let known = match lookup_artifacts(shared, &to_check).await {
        Ok(known) => known,
        Err(err) => {
            shared.core().record_lookup_failure();
            return Err(err);
        }
    };

    let total = contracts.len();
    let checked: HashSet<String> = to_check.iter().map(|c| c.id.clone()).collect();
    let step = shared
        .core()
        .apply_checked_snapshot(contracts, &checked, &known, Instant::now());

    let report = PassReport {
        contracts: total,
        looked_up: to_check.len(),
        enqueued: step.enqueued,
        dispatched: step.dispatched().len(),
        removed: step.removed,
    };

    execute_step(shared, step);
    Ok(report)
}

async fn lookup_artifacts(shared: &Shared, contracts: &[Contract]) -> Result<KnownArtifacts> {
    let mut known = KnownArtifacts::new(&shared.config.artifact_extension);
    for contract in contracts {
        let names = shared.backends.artifacts.find_artifacts(contract).await?;
        known.extend(names);
    }
    Ok(known)
}

/// Carry out the commands of a core step. Never blocks: every command
/// becomes its own task.
fn execute_step(shared: &Arc<Shared>, step: CoreStep) {
    for command in step.commands {
        match command {
            CoreCommand::Dispatch(items) => {
                for item in items {
                    tokio::spawn(dispatch_task(Arc::clone(shared), item));
                }
            }
            CoreCommand::ScheduleFollowUp(contract) => {
                tokio::spawn(follow_up_task(Arc::clone(shared), contract));
            }
        }
    }
}

fn dispatch_task(shared: Arc<Shared>, item: JobQueueItem) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let key = item.key();
        let params = DispatchParams::from(&item);
        info!(job = %key, solicitation = %item.solicitation_number, "dispatching job");

        let call = shared.backends.dispatcher.dispatch(item.job_type, &params);
        let result = match shared.config.dispatch_timeout() {
            Some(limit) => match time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(WatchError::DispatchTimeout(limit.as_millis() as u64)),
            },
            None => call.await,
        };

        let outcome = match result {
            Ok(true) => DispatchOutcome::Accepted,
            Ok(false) => DispatchOutcome::Rejected,
            Err(err) => {
                error!(job = %key, error = %err, "dispatch call failed");
                DispatchOutcome::Failed(err.to_string())
            }
        };

        let step = shared.core().settle(&key, &outcome, Instant::now());
        execute_step(&shared, step);
        shared.settled.notify_waiters();
    })
}

fn follow_up_task(shared: Arc<Shared>, contract: Contract) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        time::sleep(shared.config.follow_up_delay()).await;
        debug!(contract_id = %contract.id, "running extract_code follow-up");

        let known = match lookup_artifacts(&shared, std::slice::from_ref(&contract)).await {
            Ok(known) => known,
            Err(err) => {
                warn!(contract_id = %contract.id, error = %err, "follow-up artifact lookup failed");
                shared.core().abandon_follow_up();
                shared.settled.notify_waiters();
                return;
            }
        };

        let step = shared.core().follow_up(&contract, &known, Instant::now());
        execute_step(&shared, step);
        shared.settled.notify_waiters();
    })
}
