// tests/queue_properties.rs
//
// Random interleavings of snapshots, settlements, follow-ups and sweeps
// against the pure core. After every operation the concurrency cap and the
// one-live-item-per-pair rule must hold.

use std::collections::HashSet;

use proptest::prelude::*;
use tokio::time::Instant;

use contract_watch::contract::Contract;
use contract_watch::engine::{CoreCommand, CoreStep, DispatchOutcome, WatcherCore};
use contract_watch::gaps::KnownArtifacts;
use contract_watch::types::{JobKey, JobStatus};
use contract_watch_test_utils::builders::ContractBuilder;

const CONTRACTS: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    /// Snapshot where contract `i` has a code when bit `i` is set and a
    /// stored document when bit `i` of the second mask is set.
    Snapshot { coded: u8, documented: u8 },
    /// Settle the `n`-th outstanding dispatch.
    Settle { n: usize, outcome: u8 },
    /// Run the `n`-th pending follow-up.
    FollowUp { n: usize, documented: bool },
    SweepTerminal,
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<u8>(), any::<u8>()).prop_map(|(coded, documented)| Op::Snapshot { coded, documented }),
        5 => (any::<usize>(), 0..3u8).prop_map(|(n, outcome)| Op::Settle { n, outcome }),
        2 => (any::<usize>(), any::<bool>()).prop_map(|(n, documented)| Op::FollowUp { n, documented }),
        1 => Just(Op::SweepTerminal),
        1 => Just(Op::Clear),
    ]
}

fn contract(i: usize, coded: bool) -> Contract {
    let id = format!("C{i}");
    let mut b = ContractBuilder::eligible(&id, &format!("SOL-{i}"), &format!("NSN-{i}"));
    if coded {
        b = b.derived_code("X");
    }
    b.build()
}

fn documents(mask: u8) -> KnownArtifacts {
    let names = (0..CONTRACTS)
        .filter(|i| mask & (1 << i) != 0)
        .map(|i| format!("SOL-{i}.pdf"));
    KnownArtifacts::with_names("pdf", names)
}

/// Outstanding work handed out by the core, as the async shell would track it.
#[derive(Default)]
struct Harness {
    in_flight: Vec<JobKey>,
    follow_ups: Vec<Contract>,
}

impl Harness {
    fn absorb(&mut self, step: CoreStep) {
        for command in step.commands {
            match command {
                CoreCommand::Dispatch(items) => {
                    self.in_flight.extend(items.iter().map(|i| i.key()))
                }
                CoreCommand::ScheduleFollowUp(c) => self.follow_ups.push(c),
            }
        }
    }
}

fn check_invariants(core: &WatcherCore, harness: &Harness, max: usize) -> Result<(), TestCaseError> {
    prop_assert!(core.running_count() <= max);
    prop_assert_eq!(core.running_count(), harness.in_flight.len());

    let mut live = HashSet::new();
    for item in core.snapshot() {
        if !item.is_terminal() {
            prop_assert!(live.insert(item.key()), "duplicate live item {}", item.key());
        }
    }

    let running_items = core.queue().count_with_status(JobStatus::Running);
    prop_assert!(running_items <= core.running_count());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn cap_and_dedup_hold_under_any_interleaving(
        max in 1..4usize,
        ops in proptest::collection::vec(op_strategy(), 1..60),
    ) {
        let mut core = WatcherCore::new(max, true);
        let mut harness = Harness::default();
        let now = Instant::now();

        for op in ops {
            match op {
                Op::Snapshot { coded, documented } => {
                    let contracts = (0..CONTRACTS)
                        .map(|i| contract(i, coded & (1 << i) != 0))
                        .collect();
                    let step = core.apply_snapshot(contracts, &documents(documented), now);
                    harness.absorb(step);
                }
                Op::Settle { n, outcome } => {
                    if harness.in_flight.is_empty() {
                        continue;
                    }
                    let key = harness.in_flight.remove(n % harness.in_flight.len());
                    let outcome = match outcome {
                        0 => DispatchOutcome::Accepted,
                        1 => DispatchOutcome::Rejected,
                        _ => DispatchOutcome::Failed("boom".into()),
                    };
                    let step = core.settle(&key, &outcome, now);
                    harness.absorb(step);
                }
                Op::FollowUp { n, documented } => {
                    if harness.follow_ups.is_empty() {
                        continue;
                    }
                    let c = harness.follow_ups.remove(n % harness.follow_ups.len());
                    let mask = if documented { u8::MAX } else { 0 };
                    let step = core.follow_up(&c, &documents(mask), now);
                    harness.absorb(step);
                }
                Op::SweepTerminal => {
                    core.sweep_terminal();
                }
                Op::Clear => core.clear(),
            }

            check_invariants(&core, &harness, max)?;
        }

        // Draining every outstanding dispatch and follow-up leaves the core idle
        // once nothing is left queued.
        while !harness.in_flight.is_empty() || !harness.follow_ups.is_empty() {
            if let Some(key) = harness.in_flight.pop() {
                let step = core.settle(&key, &DispatchOutcome::Rejected, now);
                harness.absorb(step);
            } else if let Some(c) = harness.follow_ups.pop() {
                let step = core.follow_up(&c, &documents(0), now);
                harness.absorb(step);
            }
            check_invariants(&core, &harness, max)?;
        }
        prop_assert_eq!(core.running_count(), 0);
        prop_assert!(core.is_idle());
    }

    #[test]
    fn sweep_leaves_no_live_item_for_coded_contracts(
        coded in any::<u8>(),
        documented in any::<u8>(),
    ) {
        let mut core = WatcherCore::new(2, true);
        let now = Instant::now();
        let needy = (0..CONTRACTS).map(|i| contract(i, false)).collect();
        core.apply_snapshot(needy, &documents(documented), now);

        let next = (0..CONTRACTS)
            .map(|i| contract(i, coded & (1 << i) != 0))
            .collect();
        core.apply_snapshot(next, &documents(documented), now);

        for item in core.snapshot() {
            let idx: usize = item.contract_id[1..].parse().unwrap();
            if coded & (1 << idx) != 0 {
                prop_assert!(item.is_terminal(), "live item left for coded {}", item.contract_id);
            }
        }
        prop_assert_eq!(core.sweep_resolved(), 0);
    }
}
