// src/backend/mod.rs

//! Pluggable collaborator abstractions.
//!
//! The watcher talks to three external systems through traits, so tests can
//! swap in scripted fakes while production uses the HTTP implementations in
//! [`http`]:
//!
//! - [`ContractSource`]: the contract store, polled once per pass.
//! - [`ArtifactStore`]: the blob store holding downloaded documents.
//! - [`JobDispatcher`]: the workflow runner; answers accept/reject only.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::contract::Contract;
use crate::engine::queue::JobQueueItem;
use crate::errors::Result;
use crate::types::JobType;

pub mod http;

pub use http::{reply_accepted, HttpJobDispatcher, RestContractSource, StorageArtifactStore};

/// Boxed, sendable future returned by the backend traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-only access to the contract collection.
pub trait ContractSource: Send + Sync {
    /// Fetch the current snapshot of all contracts.
    fn fetch_contracts(&self) -> BoxFuture<'_, Result<Vec<Contract>>>;
}

/// Lookup of stored artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Names of artifacts that may belong to `contract`.
    ///
    /// Implementations may over-approximate (e.g. a prefix listing); the
    /// watcher filters the names itself.
    fn find_artifacts<'a>(&'a self, contract: &'a Contract) -> BoxFuture<'a, Result<Vec<String>>>;
}

/// The external workflow runner.
pub trait JobDispatcher: Send + Sync {
    /// Ask the runner to perform `job_type`.
    ///
    /// `Ok(true)` means the runner accepted the job, not that it finished.
    fn dispatch<'a>(
        &'a self,
        job_type: JobType,
        params: &'a DispatchParams,
    ) -> BoxFuture<'a, Result<bool>>;
}

/// Inputs passed along with a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solicitation_number: Option<String>,
}

impl From<&JobQueueItem> for DispatchParams {
    fn from(item: &JobQueueItem) -> Self {
        Self {
            contract_id: Some(item.contract_id.clone()),
            stock_number: Some(item.stock_number.clone()),
            solicitation_number: Some(item.solicitation_number.clone()),
        }
    }
}
