// src/engine/mod.rs

//! Scheduling engine of the contract watcher.
//!
//! - [`queue`] holds job items and the de-duplication invariant.
//! - [`core`] is the pure state machine: snapshot in, commands out.
//! - [`reconcile`] contains the gap-closure and retention sweeps.
//! - [`stats`] holds the observability counters.
//! - [`watcher`] is the async shell: timer, backend calls, dispatch tasks.

use crate::contract::Contract;

/// How a single dispatch call ended.
///
/// `Accepted` only means the dispatcher took the job; the real work happens
/// out of band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Accepted,
    Rejected,
    /// Transport error, remote error or timeout.
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DispatchOutcome::Accepted)
    }
}

/// Command produced by the core, to be executed by the async shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Invoke the dispatcher for these items (already marked `running`).
    Dispatch(Vec<JobQueueItem>),
    /// Re-check this contract for `extract_code` after the follow-up delay.
    ScheduleFollowUp(Contract),
}

/// Result of one core operation.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Items added to the queue.
    pub enqueued: usize,
    /// Items removed by the gap-closure sweep.
    pub removed: usize,
}

impl CoreStep {
    /// Items handed to the dispatcher by this step.
    pub fn dispatched(&self) -> Vec<&JobQueueItem> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Dispatch(items) => Some(items),
                CoreCommand::ScheduleFollowUp(_) => None,
            })
            .flatten()
            .collect()
    }
}

pub mod core;
pub mod queue;
pub mod reconcile;
pub mod stats;
pub mod watcher;

pub use self::core::WatcherCore;
pub use queue::{JobQueue, JobQueueItem};
pub use stats::WatcherStats;
pub use watcher::{Backends, ContractWatcher, PassReport};
