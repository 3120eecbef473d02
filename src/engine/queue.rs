// src/engine/queue.rs

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::contract::Contract;
use crate::types::{JobKey, JobStatus, JobType};

/// One unit of work: close `job_type` on one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobQueueItem {
    pub contract_id: String,
    pub solicitation_number: String,
    pub stock_number: String,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Wall-clock enqueue time in milliseconds since the Unix epoch.
    pub enqueued_at_ms: u64,
    /// Monotonic enqueue time; drives FIFO ordering.
    #[serde(skip)]
    pub enqueued_at: Instant,
    /// When the item reached `completed` or `failed`.
    #[serde(skip)]
    pub finished_at: Option<Instant>,
}

impl JobQueueItem {
    /// Build a `queued` item for `contract`.
    ///
    /// Returns `None` when the contract lacks the identifying fields a
    /// dispatch needs.
    pub fn for_contract(contract: &Contract, job_type: JobType, now: Instant) -> Option<Self> {
        let solicitation = contract.solicitation()?;
        let stock = contract.stock()?;
        Some(Self {
            contract_id: contract.id.clone(),
            solicitation_number: solicitation.to_string(),
            stock_number: stock.to_string(),
            job_type,
            status: JobStatus::Queued,
            enqueued_at_ms: unix_millis(),
            enqueued_at: now,
            finished_at: None,
        })
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.contract_id.clone(), self.job_type)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn matches_key(&self, key: &JobKey) -> bool {
        self.job_type == key.job_type && self.contract_id == key.contract_id
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// In-memory job queue.
///
/// Invariant: at most one non-terminal (`queued` / `running`) item per
/// [`JobKey`]. Terminal items for the same key may pile up until the
/// reconciler purges them.
///
/// Items are kept in insertion order, which is also enqueue order since
/// callers pass a monotonic clock.
#[derive(Debug, Default)]
pub struct JobQueue {
    items: Vec<JobQueueItem>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `item` as `queued`, unless a non-terminal item for the same key
    /// already exists. Returns whether the item was added.
    pub fn enqueue(&mut self, mut item: JobQueueItem) -> bool {
        let key = item.key();
        if self.has_non_terminal(&key) {
            debug!(job = %key, "non-terminal item already queued; skipping");
            return false;
        }

        item.status = JobStatus::Queued;
        item.finished_at = None;
        debug!(job = %key, "enqueued job");
        self.items.push(item);
        true
    }

    pub fn has_non_terminal(&self, key: &JobKey) -> bool {
        self.items
            .iter()
            .any(|i| !i.is_terminal() && i.matches_key(key))
    }

    /// Items that are `queued` or `running`.
    pub fn all_non_terminal(&self) -> Vec<&JobQueueItem> {
        self.items.iter().filter(|i| !i.is_terminal()).collect()
    }

    /// Up to `n` `queued` items, oldest first.
    pub fn pending_for_slot(&self, n: usize) -> Vec<JobQueueItem> {
        let mut queued: Vec<&JobQueueItem> = self
            .items
            .iter()
            .filter(|i| i.status == JobStatus::Queued)
            .collect();
        // Stable sort: equal timestamps keep insertion order.
        queued.sort_by_key(|i| i.enqueued_at);
        queued.into_iter().take(n).cloned().collect()
    }

    /// Move the live item for `key` to `status`.
    ///
    /// Returns `false` (and changes nothing) when there is no non-terminal
    /// item for the key, e.g. because the reconciler already dropped it.
    pub fn transition(&mut self, key: &JobKey, status: JobStatus, now: Instant) -> bool {
        let Some(item) = self
            .items
            .iter_mut()
            .find(|i| !i.is_terminal() && i.matches_key(key))
        else {
            debug!(job = %key, %status, "transition for absent item; ignoring");
            return false;
        };

        debug!(job = %key, from = %item.status, to = %status, "job transition");
        item.status = status;
        if status.is_terminal() {
            item.finished_at = Some(now);
        }
        true
    }

    /// Settle the `running` item for `key` as `status`.
    ///
    /// Unlike [`transition`](Self::transition) this never touches a `queued`
    /// item, so a late settlement for a swept item cannot finish the fresh
    /// item that replaced it before that one was dispatched.
    pub fn finish(&mut self, key: &JobKey, status: JobStatus, now: Instant) -> bool {
        match self
            .items
            .iter_mut()
            .find(|i| i.status == JobStatus::Running && i.matches_key(key))
        {
            Some(item) => {
                item.status = status;
                item.finished_at = Some(now);
                true
            }
            None => false,
        }
    }

    /// Remove terminal items matching `predicate`. Returns how many went.
    pub fn purge_terminal<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&JobQueueItem) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|i| !(i.is_terminal() && predicate(i)));
        before - self.items.len()
    }

    /// Remove non-terminal items matching `predicate`. Returns how many went.
    pub fn remove_non_terminal_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&JobQueueItem) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|i| i.is_terminal() || !predicate(i));
        before - self.items.len()
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// Owned copy of every item, in queue order.
    pub fn snapshot(&self) -> Vec<JobQueueItem> {
        self.items.clone()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
