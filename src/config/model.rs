// src/config/model.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watcher]
/// poll_interval_ms = 30000
/// max_concurrent = 3
///
/// [source]
/// base_url = "https://store.example.com"
/// table = "contracts"
///
/// [artifacts]
/// bucket = "solicitations"
///
/// [dispatcher]
/// url = "https://workflows.example.com/dispatch"
/// ```
///
/// This is the raw, unvalidated shape. Use [`ConfigFile`] (via
/// `ConfigFile::try_from`) everywhere else.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub source: SourceSection,

    #[serde(default)]
    pub artifacts: ArtifactsSection,

    #[serde(default)]
    pub dispatcher: DispatcherSection,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`
/// or [`ConfigFile::new_unchecked`].
#[derive(Debug, Clone, Serialize)]
pub struct ConfigFile {
    pub watcher: WatcherConfig,
    pub source: SourceSection,
    pub artifacts: ArtifactsSection,
    pub dispatcher: DispatcherSection,
}

impl ConfigFile {
    pub fn new_unchecked(
        watcher: WatcherConfig,
        source: SourceSection,
        artifacts: ArtifactsSection,
        dispatcher: DispatcherSection,
    ) -> Self {
        Self {
            watcher,
            source,
            artifacts,
            dispatcher,
        }
    }
}

/// `[watcher]` section: scheduling behaviour of the contract watcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatcherConfig {
    /// Master switch; a disabled watcher ignores `start()`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between detection + dispatch passes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on dispatches in flight at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Start polling as soon as the watcher is spawned.
    #[serde(default = "default_true")]
    pub auto_start: bool,

    /// Period of the retention sweep that drops completed/failed items.
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,

    /// Delay between a successful `fetch_document` and the `extract_code`
    /// re-check for the same contract. The stored document usually shows up
    /// some time after the dispatch is accepted.
    #[serde(default = "default_follow_up_delay_ms")]
    pub follow_up_delay_ms: u64,

    /// Optional upper bound on a single dispatch call. Unset means the
    /// watcher waits for the dispatcher indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_timeout_ms: Option<u64>,

    /// Skip contracts flagged as closed.
    #[serde(default = "default_true")]
    pub skip_closed: bool,

    /// File extension (without dot) an artifact must carry to count as the
    /// contract's document.
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    30_000
}

fn default_max_concurrent() -> usize {
    3
}

fn default_retention_ms() -> u64 {
    300_000
}

fn default_follow_up_delay_ms() -> u64 {
    5_000
}

fn default_artifact_extension() -> String {
    "pdf".to_string()
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrent: default_max_concurrent(),
            auto_start: true,
            retention_ms: default_retention_ms(),
            follow_up_delay_ms: default_follow_up_delay_ms(),
            dispatch_timeout_ms: None,
            skip_closed: true,
            artifact_extension: default_artifact_extension(),
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    pub fn follow_up_delay(&self) -> Duration {
        Duration::from_millis(self.follow_up_delay_ms)
    }

    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.dispatch_timeout_ms.map(Duration::from_millis)
    }
}

/// `[source]` section: REST endpoint of the contract store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceSection {
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_table")]
    pub table: String,

    /// Column projection passed as `select=`.
    #[serde(default = "default_select")]
    pub select: String,

    /// Environment variable holding the store's API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_table() -> String {
    "contracts".to_string()
}

fn default_select() -> String {
    "id,solicitation_number,stock_number,derived_code,closed".to_string()
}

fn default_api_key_env() -> String {
    "CONTRACT_STORE_KEY".to_string()
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            table: default_table(),
            select: default_select(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// `[artifacts]` section: blob bucket holding downloaded documents.
///
/// The store shares `base_url` and credentials with `[source]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactsSection {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Folder prefix inside the bucket; empty means the bucket root.
    #[serde(default)]
    pub prefix: String,

    /// Maximum number of names returned per lookup.
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}

fn default_bucket() -> String {
    "solicitations".to_string()
}

fn default_list_limit() -> u32 {
    100
}

impl Default for ArtifactsSection {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            prefix: String::new(),
            limit: default_list_limit(),
        }
    }
}

/// `[dispatcher]` section: the external workflow runner.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherSection {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_fetch_workflow")]
    pub fetch_document_workflow: String,

    #[serde(default = "default_extract_workflow")]
    pub extract_code_workflow: String,

    /// Environment variable holding the bearer token, if the runner needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

fn default_fetch_workflow() -> String {
    "fetch_document".to_string()
}

fn default_extract_workflow() -> String {
    "extract_code".to_string()
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            fetch_document_workflow: default_fetch_workflow(),
            extract_code_workflow: default_extract_workflow(),
            token_env: None,
        }
    }
}
