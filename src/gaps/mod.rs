// src/gaps/mod.rs

//! Gap detection: which workflows a contract still needs.
//!
//! - [`artifacts`] decides whether a stored document belongs to a contract.
//! - [`detect_gaps`] is the decision table itself; it is pure and has no
//!   knowledge of the queue.

pub mod artifacts;

use std::collections::BTreeSet;

use crate::contract::Contract;
use crate::types::JobType;

pub use artifacts::{artifact_matches, KnownArtifacts};

/// Compute the set of job types still needed for `contract`.
///
/// | derived code | document stored | result             |
/// |--------------|-----------------|--------------------|
/// | present      | any             | nothing            |
/// | absent       | yes             | `extract_code`     |
/// | absent       | no              | `fetch_document`   |
///
/// Contracts lacking a solicitation identifier or a stock number never need
/// anything: there is not enough to build a dispatch request.
pub fn detect_gaps(contract: &Contract, known: &KnownArtifacts) -> BTreeSet<JobType> {
    let mut needed = BTreeSet::new();

    if !contract.has_dispatch_params() {
        return needed;
    }

    // A known code means the subject is resolved; a missing document is not
    // worth re-fetching.
    if contract.has_derived_code() {
        return needed;
    }

    if known.has_document_for(contract) {
        needed.insert(JobType::ExtractCode);
    } else {
        needed.insert(JobType::FetchDocument);
    }

    needed
}

/// Whether the watcher should look at this contract at all.
///
/// Eligible contracts have both identifying fields, no derived code yet and,
/// when `skip_closed` is set, are not closed.
pub fn is_candidate(contract: &Contract, skip_closed: bool) -> bool {
    if !contract.has_dispatch_params() || contract.has_derived_code() {
        return false;
    }
    !(skip_closed && contract.is_closed())
}
