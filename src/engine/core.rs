// src/engine/core.rs

//! Pure core state machine of the contract watcher.
//!
//! The core owns:
//! - the job queue
//! - the running-dispatch gate (`running <= max_concurrent`)
//! - the stats counters
//! - the latest contract snapshot
//!
//! It performs no IO and holds no Tokio handles. Every method takes the
//! current instant from the caller, so tests can drive it with any clock.
//! The async shell (`engine::watcher`) keeps it behind a mutex; each method
//! is one critical section, which is what makes drain decisions and the
//! running-count increment a single atomic step.

use std::collections::{HashMap, HashSet};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::WatcherConfig;
use crate::contract::Contract;
use crate::engine::queue::{JobQueue, JobQueueItem};
use crate::engine::reconcile::{gap_closure_sweep, retention_sweep};
use crate::engine::stats::WatcherStats;
use crate::engine::{CoreCommand, CoreStep, DispatchOutcome};
use crate::gaps::{detect_gaps, is_candidate, KnownArtifacts};
use crate::types::{JobKey, JobStatus, JobType};

#[derive(Debug)]
pub struct WatcherCore {
    queue: JobQueue,
    stats: WatcherStats,
    /// Dispatches issued and not yet settled. Tracked separately from item
    /// status because a running item may be reconciled away before its
    /// dispatch settles.
    running: usize,
    max_concurrent: usize,
    skip_closed: bool,
    follow_ups_pending: usize,
    contracts: HashMap<String, Contract>,
}

impl WatcherCore {
    pub fn new(max_concurrent: usize, skip_closed: bool) -> Self {
        Self {
            queue: JobQueue::new(),
            stats: WatcherStats::default(),
            running: 0,
            max_concurrent: max_concurrent.max(1),
            skip_closed,
            follow_ups_pending: 0,
            contracts: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &WatcherConfig) -> Self {
        Self::new(cfg.max_concurrent, cfg.skip_closed)
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn running_count(&self) -> usize {
        self.running
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Nothing queued, nothing in flight, no follow-up waiting.
    pub fn is_idle(&self) -> bool {
        self.running == 0
            && self.follow_ups_pending == 0
            && self.queue.count_with_status(JobStatus::Queued) == 0
    }

    /// Whether `contract` should get an artifact lookup and gap detection
    /// in this pass: it is a candidate and has no live item yet.
    pub fn needs_lookup(&self, contract: &Contract) -> bool {
        is_candidate(contract, self.skip_closed) && !self.has_live_item_for(&contract.id)
    }

    fn has_live_item_for(&self, contract_id: &str) -> bool {
        self.queue
            .all_non_terminal()
            .iter()
            .any(|item| item.contract_id == contract_id)
    }

    /// Feed a fresh contract snapshot.
    ///
    /// Runs the gap-closure sweep, enqueues what the detector reports for
    /// contracts without live items, then drains the queue. `known` must
    /// cover every such contract; when the artifact lookup ran before this
    /// call, use [`apply_checked_snapshot`](Self::apply_checked_snapshot).
    pub fn apply_snapshot(
        &mut self,
        contracts: Vec<Contract>,
        known: &KnownArtifacts,
        now: Instant,
    ) -> CoreStep {
        let checked: HashSet<String> = contracts
            .iter()
            .filter(|c| self.needs_lookup(c))
            .map(|c| c.id.clone())
            .collect();
        self.apply_checked_snapshot(contracts, &checked, known, now)
    }

    /// Like [`apply_snapshot`](Self::apply_snapshot), but gap detection only
    /// runs for the contracts in `checked`, the ones whose artifacts were
    /// looked up. A contract whose item settled while the lookup was in
    /// flight waits for the next pass instead of being judged without its
    /// artifacts. Stats and the gap-closure sweep still cover the whole
    /// snapshot.
    pub fn apply_checked_snapshot(
        &mut self,
        contracts: Vec<Contract>,
        checked: &HashSet<String>,
        known: &KnownArtifacts,
        now: Instant,
    ) -> CoreStep {
        self.stats.passes += 1;
        self.stats.total_contracts = contracts.len();
        self.stats.missing_derived_code =
            contracts.iter().filter(|c| !c.has_derived_code()).count();

        // Candidates keep snapshot order so same-pass items dispatch in the
        // order the store returned them.
        let candidates: Vec<Contract> = contracts
            .iter()
            .filter(|c| checked.contains(&c.id) && self.needs_lookup(c))
            .cloned()
            .collect();

        self.contracts = contracts
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let removed = gap_closure_sweep(&mut self.queue, &self.contracts);

        let mut enqueued = 0;
        for contract in &candidates {
            for job_type in detect_gaps(contract, known) {
                if self.enqueue_for(contract, job_type, now) {
                    enqueued += 1;
                }
            }
        }

        if enqueued > 0 {
            info!(enqueued, candidates = candidates.len(), "enqueued jobs for contract gaps");
        }

        let mut step = self.drain(now);
        step.enqueued = enqueued;
        step.removed = removed;
        step
    }

    fn enqueue_for(&mut self, contract: &Contract, job_type: JobType, now: Instant) -> bool {
        match JobQueueItem::for_contract(contract, job_type, now) {
            Some(item) => self.queue.enqueue(item),
            None => false,
        }
    }

    /// Move as many queued items to `running` as free slots allow.
    ///
    /// The free-slot computation, the status change and the running-count
    /// increment happen together, so the cap holds however calls interleave.
    pub fn drain(&mut self, now: Instant) -> CoreStep {
        let free = self.max_concurrent.saturating_sub(self.running);
        if free == 0 {
            debug!(running = self.running, "no free dispatch slots");
            return CoreStep::default();
        }

        let mut batch = Vec::new();
        for mut item in self.queue.pending_for_slot(free) {
            if self.queue.transition(&item.key(), JobStatus::Running, now) {
                self.running += 1;
                self.stats.dispatched += 1;
                item.status = JobStatus::Running;
                batch.push(item);
            }
        }

        let mut step = CoreStep::default();
        if !batch.is_empty() {
            debug!(count = batch.len(), running = self.running, "drained queued jobs");
            step.commands.push(CoreCommand::Dispatch(batch));
        }
        step
    }

    /// Record the result of a dispatch.
    ///
    /// Frees the slot, marks the item, sweeps resolved contracts and drains
    /// again. A successful `fetch_document` also asks the shell for a
    /// delayed `extract_code` re-check.
    pub fn settle(&mut self, key: &JobKey, outcome: &DispatchOutcome, now: Instant) -> CoreStep {
        self.running = self.running.saturating_sub(1);

        let status = if outcome.is_accepted() {
            self.stats.completed += 1;
            JobStatus::Completed
        } else {
            self.stats.failed += 1;
            JobStatus::Failed
        };

        if !self.queue.finish(key, status, now) {
            debug!(job = %key, "settled job no longer in queue");
        }

        match outcome {
            DispatchOutcome::Accepted => info!(job = %key, "dispatch accepted"),
            DispatchOutcome::Rejected => warn!(job = %key, "dispatch rejected"),
            DispatchOutcome::Failed(reason) => warn!(job = %key, %reason, "dispatch failed"),
        }

        let removed = gap_closure_sweep(&mut self.queue, &self.contracts);

        let mut step = self.drain(now);
        step.removed = removed;

        if key.job_type == JobType::FetchDocument && outcome.is_accepted() {
            let contract = self
                .contracts
                .get(&key.contract_id)
                .filter(|c| is_candidate(c, self.skip_closed))
                .cloned();
            match contract {
                Some(contract) => {
                    self.follow_ups_pending += 1;
                    self.stats.follow_ups_scheduled += 1;
                    step.commands.push(CoreCommand::ScheduleFollowUp(contract));
                }
                None => debug!(job = %key, "contract resolved or gone; no follow-up"),
            }
        }

        step
    }

    /// Delayed `extract_code` re-check for one contract.
    ///
    /// Uses the newest snapshot row when there is one, so a code that
    /// arrived in the meantime cancels the follow-up.
    pub fn follow_up(&mut self, contract: &Contract, known: &KnownArtifacts, now: Instant) -> CoreStep {
        self.follow_ups_pending = self.follow_ups_pending.saturating_sub(1);

        let current = self
            .contracts
            .get(&contract.id)
            .cloned()
            .unwrap_or_else(|| contract.clone());

        if !is_candidate(&current, self.skip_closed) {
            debug!(contract_id = %current.id, "follow-up: contract no longer a candidate");
            return self.drain(now);
        }

        let mut enqueued = 0;
        if detect_gaps(&current, known).contains(&JobType::ExtractCode)
            && self.enqueue_for(&current, JobType::ExtractCode, now)
        {
            info!(contract_id = %current.id, "follow-up enqueued extract_code");
            enqueued = 1;
        } else {
            debug!(contract_id = %current.id, "follow-up: document not visible yet or job live");
        }

        let mut step = self.drain(now);
        step.enqueued = enqueued;
        step
    }

    /// A follow-up could not run (artifact lookup failed).
    pub fn abandon_follow_up(&mut self) {
        self.follow_ups_pending = self.follow_ups_pending.saturating_sub(1);
        self.stats.lookup_failures += 1;
    }

    pub fn record_lookup_failure(&mut self) {
        self.stats.lookup_failures += 1;
    }

    /// Gap-closure sweep against the latest snapshot.
    pub fn sweep_resolved(&mut self) -> usize {
        gap_closure_sweep(&mut self.queue, &self.contracts)
    }

    /// Retention sweep: drop all completed/failed items.
    pub fn sweep_terminal(&mut self) -> usize {
        retention_sweep(&mut self.queue)
    }

    /// Drop all items and reset the counters.
    ///
    /// In-flight dispatches keep their slots until they settle; their
    /// settlement then finds no item and only frees the slot.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.stats.reset();
    }

    pub fn snapshot(&self) -> Vec<JobQueueItem> {
        self.queue.snapshot()
    }

    pub fn stats(&self) -> WatcherStats {
        let mut stats = self.stats.clone();
        stats.running = self.running;
        stats.queued = self.queue.count_with_status(JobStatus::Queued);
        stats
    }
}
