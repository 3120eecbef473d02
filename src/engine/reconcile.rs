// src/engine/reconcile.rs

//! Queue reconciliation passes.
//!
//! Both passes are idempotent: running one twice against unchanged state
//! removes nothing the second time.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::contract::Contract;
use crate::engine::queue::JobQueue;

/// Drop queued/running items whose contract now reports a derived code.
///
/// Contracts absent from `contracts` are left alone: a missing row says
/// nothing about whether the gap closed.
pub fn gap_closure_sweep(queue: &mut JobQueue, contracts: &HashMap<String, Contract>) -> usize {
    let removed = queue.remove_non_terminal_where(|item| {
        contracts
            .get(&item.contract_id)
            .is_some_and(Contract::has_derived_code)
    });

    if removed > 0 {
        info!(removed, "gap-closure sweep removed items for resolved contracts");
    } else {
        debug!("gap-closure sweep: nothing to remove");
    }
    removed
}

/// Drop every completed/failed item.
pub fn retention_sweep(queue: &mut JobQueue) -> usize {
    let removed = queue.purge_terminal(|_| true);
    if removed > 0 {
        debug!(removed, "retention sweep purged terminal items");
    }
    removed
}
