//! Deployment run reports

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageId {
    Packages,
    Repository,
    Environment,
    Database,
    Dependencies,
    Migrations,
    Proxy,
    Certificate,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Packages => "packages",
            StageId::Repository => "repository",
            StageId::Environment => "environment",
            StageId::Database => "database",
            StageId::Dependencies => "dependencies",
            StageId::Migrations => "migrations",
            StageId::Proxy => "proxy",
            StageId::Certificate => "certificate",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
    Skipped,
    Failed,
}

/// Per-stage record in the final report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage this record belongs to
    pub stage: StageId,

    /// How the stage ended
    pub status: StageStatus,

    /// Optional human-readable summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Error message for failed stages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock stage duration
    pub duration_ms: u64,
}

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Failure context carried by failed runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub stage: StageId,
    pub error: String,
}

/// Full record of one deployment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReport {
    /// Unique run ID
    pub run_id: String,

    /// Target host
    pub host: String,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    /// Per-stage records in execution order
    pub stages: Vec<StageReport>,

    /// Pipeline states entered, in order
    pub state_trail: Vec<String>,

    pub status: RunStatus,

    /// Set when the run failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,

    /// URLs the application answers on after the run
    pub site_urls: Vec<String>,
}

impl DeploymentReport {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Record for a given stage, if it was reached
    pub fn stage(&self, stage: StageId) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}
