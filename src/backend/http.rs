// src/backend/http.rs

//! HTTP implementations of the collaborator traits, using [`reqwest`].
//!
//! - [`RestContractSource`] reads rows from a REST-exposed table
//!   (`GET {base_url}/rest/v1/{table}?select=...`).
//! - [`StorageArtifactStore`] searches a storage bucket
//!   (`POST {base_url}/storage/v1/object/list/{bucket}`).
//! - [`HttpJobDispatcher`] posts a workflow request to the runner.

use serde::Deserialize;
use tracing::debug;

use super::{ArtifactStore, BoxFuture, ContractSource, DispatchParams, JobDispatcher};
use crate::config::{ArtifactsSection, ConfigFile, DispatcherSection, SourceSection};
use crate::contract::Contract;
use crate::errors::{Result, WatchError};
use crate::types::JobType;

/// Credentials shared by the table and storage endpoints.
#[derive(Clone)]
struct StoreAuth {
    api_key: Option<String>,
}

impl StoreAuth {
    fn from_env(var: &str) -> Self {
        let api_key = std::env::var(var).ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            debug!(env = var, "no store API key in environment; sending anonymous requests");
        }
        Self { api_key }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }
}

/// Turn a non-2xx response into [`WatchError::Remote`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WatchError::Remote {
        status: status.as_u16(),
        body,
    })
}

fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Contract store exposed as a REST table.
pub struct RestContractSource {
    client: reqwest::Client,
    base_url: String,
    table: String,
    select: String,
    auth: StoreAuth,
}

impl RestContractSource {
    pub fn new(client: reqwest::Client, section: &SourceSection) -> Self {
        Self {
            client,
            base_url: trim_base(&section.base_url).to_string(),
            table: section.table.clone(),
            select: section.select.clone(),
            auth: StoreAuth::from_env(&section.api_key_env),
        }
    }
}

impl ContractSource for RestContractSource {
    fn fetch_contracts(&self) -> BoxFuture<'_, Result<Vec<Contract>>> {
        Box::pin(async move {
            let url = format!("{}/rest/v1/{}", self.base_url, self.table);
            let request = self
                .client
                .get(url)
                .query(&[("select", self.select.as_str())]);
            let response = self.auth.apply(request).send().await?;
            let body = check_status(response).await?.text().await?;
            let contracts: Vec<Contract> = serde_json::from_str(&body)?;
            debug!(count = contracts.len(), "fetched contract snapshot");
            Ok(contracts)
        })
    }
}

#[derive(Debug, Deserialize)]
struct StorageObject {
    name: String,
}

/// Artifact store backed by a storage bucket search.
pub struct StorageArtifactStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    prefix: String,
    limit: u32,
    auth: StoreAuth,
}

impl StorageArtifactStore {
    pub fn new(client: reqwest::Client, source: &SourceSection, section: &ArtifactsSection) -> Self {
        Self {
            client,
            base_url: trim_base(&source.base_url).to_string(),
            bucket: section.bucket.clone(),
            prefix: section.prefix.clone(),
            limit: section.limit,
            auth: StoreAuth::from_env(&source.api_key_env),
        }
    }
}

impl ArtifactStore for StorageArtifactStore {
    fn find_artifacts<'a>(&'a self, contract: &'a Contract) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let Some(solicitation) = contract.solicitation() else {
                return Ok(Vec::new());
            };

            let url = format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket);
            let body = serde_json::json!({
                "prefix": self.prefix,
                "search": solicitation,
                "limit": self.limit,
            });
            let response = self.auth.apply(self.client.post(url).json(&body)).send().await?;
            let text = check_status(response).await?.text().await?;
            let objects: Vec<StorageObject> = serde_json::from_str(&text)?;

            Ok(objects.into_iter().map(|o| o.name).collect())
        })
    }
}

#[derive(Debug, Deserialize)]
struct DispatchReply {
    #[serde(default)]
    accepted: Option<bool>,
}

/// Read a 2xx dispatcher reply body.
///
/// Only an explicit `"accepted": false` rejects; an empty body, a body that
/// is not JSON, or JSON without the field all count as accepted.
pub fn reply_accepted(body: &str) -> bool {
    if body.trim().is_empty() {
        return true;
    }
    serde_json::from_str::<DispatchReply>(body)
        .ok()
        .and_then(|reply| reply.accepted)
        .unwrap_or(true)
}

/// Workflow runner reached over HTTP.
///
/// Any 2xx response counts as accepted unless its JSON body says
/// `"accepted": false`.
pub struct HttpJobDispatcher {
    client: reqwest::Client,
    url: String,
    fetch_document_workflow: String,
    extract_code_workflow: String,
    token: Option<String>,
}

impl HttpJobDispatcher {
    pub fn new(client: reqwest::Client, section: &DispatcherSection) -> Self {
        let token = section
            .token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|t| !t.trim().is_empty());
        Self {
            client,
            url: section.url.clone(),
            fetch_document_workflow: section.fetch_document_workflow.clone(),
            extract_code_workflow: section.extract_code_workflow.clone(),
            token,
        }
    }

    fn workflow_for(&self, job_type: JobType) -> &str {
        match job_type {
            JobType::FetchDocument => &self.fetch_document_workflow,
            JobType::ExtractCode => &self.extract_code_workflow,
        }
    }
}

impl JobDispatcher for HttpJobDispatcher {
    fn dispatch<'a>(
        &'a self,
        job_type: JobType,
        params: &'a DispatchParams,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let body = serde_json::json!({
                "workflow": self.workflow_for(job_type),
                "job_type": job_type,
                "inputs": params,
            });

            let mut request = self.client.post(self.url.as_str()).json(&body);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = check_status(request.send().await?).await?;
            let text = response.text().await?;
            Ok(reply_accepted(&text))
        })
    }
}

/// Build all three HTTP backends from a validated config, sharing one
/// connection pool.
pub fn http_backends(
    cfg: &ConfigFile,
) -> (RestContractSource, StorageArtifactStore, HttpJobDispatcher) {
    let client = reqwest::Client::new();
    (
        RestContractSource::new(client.clone(), &cfg.source),
        StorageArtifactStore::new(client.clone(), &cfg.source, &cfg.artifacts),
        HttpJobDispatcher::new(client, &cfg.dispatcher),
    )
}
