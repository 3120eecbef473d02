use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of remote workflow needed to close a gap on a contract.
///
/// Ordering is meaningful: a contract that needs both would fetch the
/// document first, so `FetchDocument` sorts before `ExtractCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Download the solicitation document into the artifact store.
    FetchDocument,
    /// Extract the derived code from an already-stored document.
    ExtractCode,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::FetchDocument => "fetch_document",
            JobType::ExtractCode => "extract_code",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fetch_document" => Ok(JobType::FetchDocument),
            "extract_code" => Ok(JobType::ExtractCode),
            other => Err(format!(
                "invalid job type: {other} (expected \"fetch_document\" or \"extract_code\")"
            )),
        }
    }
}

/// Lifecycle state of a queued job.
///
/// `Queued -> Running -> Completed | Failed`. The two last ones are terminal:
/// the item is only kept around until the reconciler removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Identity of a job in the queue: one contract, one gap type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey {
    pub contract_id: String,
    pub job_type: JobType,
}

impl JobKey {
    pub fn new(contract_id: impl Into<String>, job_type: JobType) -> Self {
        Self {
            contract_id: contract_id.into(),
            job_type,
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.contract_id, self.job_type)
    }
}
