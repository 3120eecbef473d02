#![allow(dead_code)]

use contract_watch::config::WatcherConfig;
use contract_watch::contract::Contract;
use contract_watch::engine::{ContractWatcher, JobQueueItem};
use contract_watch::types::{JobStatus, JobType};
use contract_watch_test_utils::builders::ContractBuilder;
use contract_watch_test_utils::fake_backends::FakeWorld;

pub use contract_watch_test_utils::{init_tracing, settle_tasks, with_timeout};

/// Eligible contract `id` with solicitation `SOL-<id>` and stock `NSN-<id>`.
pub fn needy(id: &str) -> Contract {
    ContractBuilder::eligible(id, &format!("SOL-{id}"), &format!("NSN-{id}")).build()
}

pub fn watcher(world: &FakeWorld, config: WatcherConfig) -> ContractWatcher {
    ContractWatcher::new(config, world.backends()).expect("valid watcher config")
}

pub fn items_with(snapshot: &[JobQueueItem], status: JobStatus) -> Vec<&JobQueueItem> {
    snapshot.iter().filter(|i| i.status == status).collect()
}

pub fn items_for<'a>(
    snapshot: &'a [JobQueueItem],
    contract_id: &str,
    job_type: JobType,
) -> Vec<&'a JobQueueItem> {
    snapshot
        .iter()
        .filter(|i| i.contract_id == contract_id && i.job_type == job_type)
        .collect()
}
