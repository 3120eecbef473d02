// tests/job_queue.rs

use std::time::Duration;

use tokio::time::Instant;

use contract_watch::engine::{JobQueue, JobQueueItem};
use contract_watch::types::{JobKey, JobStatus, JobType};
use contract_watch_test_utils::builders::ContractBuilder;

fn item(id: &str, job_type: JobType, at: Instant) -> JobQueueItem {
    let contract = ContractBuilder::eligible(id, &format!("SOL-{id}"), &format!("NSN-{id}")).build();
    JobQueueItem::for_contract(&contract, job_type, at).expect("eligible contract")
}

#[test]
fn enqueue_rejects_second_live_item_for_same_pair() {
    let now = Instant::now();
    let mut q = JobQueue::new();

    assert!(q.enqueue(item("C1", JobType::FetchDocument, now)));
    assert!(!q.enqueue(item("C1", JobType::FetchDocument, now)));
    // Different job type for the same contract is a different pair.
    assert!(q.enqueue(item("C1", JobType::ExtractCode, now)));

    assert_eq!(q.len(), 2);
    assert_eq!(q.count_with_status(JobStatus::Queued), 2);
}

#[test]
fn terminal_items_do_not_block_new_ones() {
    let now = Instant::now();
    let mut q = JobQueue::new();
    let key = JobKey::new("C1", JobType::FetchDocument);

    q.enqueue(item("C1", JobType::FetchDocument, now));
    assert!(q.transition(&key, JobStatus::Running, now));
    assert!(q.transition(&key, JobStatus::Failed, now));

    assert!(q.enqueue(item("C1", JobType::FetchDocument, now)));
    assert!(q.transition(&key, JobStatus::Running, now));
    assert!(q.transition(&key, JobStatus::Completed, now));

    assert_eq!(q.len(), 2);
    assert_eq!(q.count_with_status(JobStatus::Failed), 1);
    assert_eq!(q.count_with_status(JobStatus::Completed), 1);
    assert!(q.all_non_terminal().is_empty());
}

#[test]
fn pending_for_slot_is_fifo_and_bounded() {
    let t0 = Instant::now();
    let mut q = JobQueue::new();

    q.enqueue(item("C2", JobType::FetchDocument, t0 + Duration::from_secs(2)));
    q.enqueue(item("C1", JobType::FetchDocument, t0));
    q.enqueue(item("C3", JobType::FetchDocument, t0 + Duration::from_secs(2)));

    let ids: Vec<_> = q
        .pending_for_slot(2)
        .into_iter()
        .map(|i| i.contract_id)
        .collect();
    assert_eq!(ids, vec!["C1".to_string(), "C2".to_string()]);

    assert!(q.pending_for_slot(0).is_empty());
    assert_eq!(q.pending_for_slot(10).len(), 3);
}

#[test]
fn pending_for_slot_skips_running_items() {
    let now = Instant::now();
    let mut q = JobQueue::new();
    q.enqueue(item("C1", JobType::FetchDocument, now));
    q.enqueue(item("C2", JobType::FetchDocument, now));
    q.transition(&JobKey::new("C1", JobType::FetchDocument), JobStatus::Running, now);

    let pending = q.pending_for_slot(5);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].contract_id, "C2");
}

#[test]
fn transition_of_absent_item_is_a_no_op() {
    let now = Instant::now();
    let mut q = JobQueue::new();

    assert!(!q.transition(&JobKey::new("gone", JobType::ExtractCode), JobStatus::Completed, now));
    assert!(q.is_empty());
}

#[test]
fn transition_records_finish_time_for_terminal_states() {
    let now = Instant::now();
    let mut q = JobQueue::new();
    let key = JobKey::new("C1", JobType::FetchDocument);
    q.enqueue(item("C1", JobType::FetchDocument, now));

    q.transition(&key, JobStatus::Running, now);
    assert_eq!(q.snapshot()[0].finished_at, None);

    let later = now + Duration::from_secs(3);
    q.transition(&key, JobStatus::Completed, later);
    assert_eq!(q.snapshot()[0].finished_at, Some(later));
}

#[test]
fn purge_terminal_leaves_live_items() {
    let now = Instant::now();
    let mut q = JobQueue::new();
    q.enqueue(item("C1", JobType::FetchDocument, now));
    q.enqueue(item("C2", JobType::FetchDocument, now));
    q.enqueue(item("C3", JobType::FetchDocument, now));

    let c1 = JobKey::new("C1", JobType::FetchDocument);
    let c2 = JobKey::new("C2", JobType::FetchDocument);
    q.transition(&c1, JobStatus::Running, now);
    q.transition(&c1, JobStatus::Completed, now);
    q.transition(&c2, JobStatus::Running, now);
    q.transition(&c2, JobStatus::Failed, now);

    assert_eq!(q.purge_terminal(|i| i.status == JobStatus::Failed), 1);
    assert_eq!(q.purge_terminal(|_| true), 1);
    assert_eq!(q.purge_terminal(|_| true), 0);

    let left = q.snapshot();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].contract_id, "C3");
    assert_eq!(left[0].status, JobStatus::Queued);
}

#[test]
fn item_requires_identifying_fields() {
    let now = Instant::now();
    let no_stock = ContractBuilder::new("C1").solicitation("SOL-1").build();
    assert!(JobQueueItem::for_contract(&no_stock, JobType::FetchDocument, now).is_none());
}

#[test]
fn finish_only_settles_running_items() {
    let now = Instant::now();
    let mut q = JobQueue::new();
    let key = JobKey::new("C1", JobType::FetchDocument);
    q.enqueue(item("C1", JobType::FetchDocument, now));

    assert!(!q.finish(&key, JobStatus::Completed, now));
    assert_eq!(q.count_with_status(JobStatus::Queued), 1);

    q.transition(&key, JobStatus::Running, now);
    assert!(q.finish(&key, JobStatus::Completed, now));
    assert_eq!(q.snapshot()[0].finished_at, Some(now));
}
