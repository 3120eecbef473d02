// src/engine/stats.rs

use serde::Serialize;

/// Process-wide counters for observability.
///
/// `total_contracts` and `missing_derived_code` describe the latest
/// snapshot; everything else only ever grows until [`WatcherStats::reset`].
/// `running` and `queued` are gauges filled in when the stats are read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatcherStats {
    pub total_contracts: usize,
    pub missing_derived_code: usize,
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    pub lookup_failures: u64,
    pub follow_ups_scheduled: u64,
    pub passes: u64,
    pub running: usize,
    pub queued: usize,
}

impl WatcherStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
