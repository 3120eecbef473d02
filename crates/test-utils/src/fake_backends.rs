use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use contract_watch::backend::{
    ArtifactStore, BoxFuture, ContractSource, DispatchParams, JobDispatcher,
};
use contract_watch::contract::Contract;
use contract_watch::engine::Backends;
use contract_watch::errors::{Result, WatchError};
use contract_watch::types::JobType;

fn unavailable(what: &str) -> WatchError {
    WatchError::Remote {
        status: 503,
        body: format!("{what} unavailable"),
    }
}

/// Contract source serving whatever rows the test put in.
///
/// Clones share state, so a test can keep a handle after handing one to
/// the watcher.
#[derive(Clone, Default)]
pub struct FakeContractSource {
    contracts: Arc<Mutex<Vec<Contract>>>,
    failing: Arc<AtomicBool>,
    fetches: Arc<AtomicUsize>,
}

impl FakeContractSource {
    pub fn new(contracts: Vec<Contract>) -> Self {
        let source = Self::default();
        source.set_contracts(contracts);
        source
    }

    pub fn set_contracts(&self, contracts: Vec<Contract>) {
        *self.contracts.lock().unwrap() = contracts;
    }

    /// Replace the row with the same id (or append it).
    pub fn upsert(&self, contract: Contract) {
        let mut rows = self.contracts.lock().unwrap();
        match rows.iter_mut().find(|c| c.id == contract.id) {
            Some(row) => *row = contract,
            None => rows.push(contract),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ContractSource for FakeContractSource {
    fn fetch_contracts(&self) -> BoxFuture<'_, Result<Vec<Contract>>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(unavailable("contract store"));
            }
            Ok(self.contracts.lock().unwrap().clone())
        })
    }
}

/// Artifact store holding a flat list of names.
///
/// Like the storage search endpoint, a lookup returns the names containing
/// the contract's solicitation (ignoring case) and leaves the extension
/// check to the watcher.
#[derive(Clone, Default)]
pub struct FakeArtifactStore {
    names: Arc<Mutex<Vec<String>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    failing: Arc<AtomicBool>,
    lookups: Arc<AtomicUsize>,
}

impl FakeArtifactStore {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        store.names.lock().unwrap().extend(names.into_iter().map(Into::into));
        store
    }

    pub fn add(&self, name: &str) {
        self.names.lock().unwrap().push(name.to_string());
    }

    /// Make lookups for `contract_id` take `delay` before answering.
    pub fn delay_for(&self, contract_id: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(contract_id.to_string(), delay);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl ArtifactStore for FakeArtifactStore {
    fn find_artifacts<'a>(&'a self, contract: &'a Contract) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays.lock().unwrap().get(&contract.id).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(unavailable("artifact store"));
            }

            let Some(solicitation) = contract.solicitation() else {
                return Ok(Vec::new());
            };
            let needle = solicitation.to_lowercase();
            Ok(self
                .names
                .lock()
                .unwrap()
                .iter()
                .filter(|name| name.to_lowercase().contains(&needle))
                .cloned()
                .collect())
        })
    }
}

/// One recorded dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchCall {
    pub job_type: JobType,
    pub contract_id: String,
}

/// Dispatcher that records calls and answers from a script.
///
/// - Accepts by default.
/// - `reject(id)` makes calls for that contract return `Ok(false)`.
/// - `error(id)` makes calls for that contract return an error.
/// - `hold()` keeps every call pending until `release()`.
#[derive(Clone)]
pub struct FakeDispatcher {
    calls: Arc<Mutex<Vec<DispatchCall>>>,
    rejected: Arc<Mutex<HashSet<String>>>,
    erroring: Arc<Mutex<HashSet<String>>>,
    gate: Arc<watch::Sender<bool>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for FakeDispatcher {
    fn default() -> Self {
        let (gate, _rx) = watch::channel(true);
        Self {
            calls: Arc::default(),
            rejected: Arc::default(),
            erroring: Arc::default(),
            gate: Arc::new(gate),
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
        }
    }
}

impl FakeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, contract_id: &str) {
        self.rejected.lock().unwrap().insert(contract_id.to_string());
    }

    pub fn error(&self, contract_id: &str) {
        self.erroring.lock().unwrap().insert(contract_id.to_string());
    }

    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn calls(&self) -> Vec<DispatchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, job_type: JobType) -> usize {
        self.calls().iter().filter(|c| c.job_type == job_type).count()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously pending calls seen so far.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl JobDispatcher for FakeDispatcher {
    fn dispatch<'a>(
        &'a self,
        job_type: JobType,
        params: &'a DispatchParams,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let contract_id = params.contract_id.clone().unwrap_or_default();
            self.calls.lock().unwrap().push(DispatchCall {
                job_type,
                contract_id: contract_id.clone(),
            });

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let mut gate = self.gate.subscribe();
            let _ = gate.wait_for(|open| *open).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.erroring.lock().unwrap().contains(&contract_id) {
                return Err(unavailable("workflow runner"));
            }
            Ok(!self.rejected.lock().unwrap().contains(&contract_id))
        })
    }
}

/// Handles to the fakes plus the `Backends` wired to them.
pub struct FakeWorld {
    pub source: FakeContractSource,
    pub artifacts: FakeArtifactStore,
    pub dispatcher: FakeDispatcher,
}

impl FakeWorld {
    pub fn new(contracts: Vec<Contract>) -> Self {
        Self {
            source: FakeContractSource::new(contracts),
            artifacts: FakeArtifactStore::default(),
            dispatcher: FakeDispatcher::new(),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends::new(
            self.source.clone(),
            self.artifacts.clone(),
            self.dispatcher.clone(),
        )
    }
}
