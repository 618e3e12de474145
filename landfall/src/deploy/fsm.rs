//! Finite state machine for the deployment pipeline

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::models::report::StageId;

/// Pipeline state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Nothing has run yet
    Init,

    /// System packages and dependency manager present
    PackagesReady,

    /// Repository checked out
    RepoCloned,

    /// Env file in place with base values
    EnvConfigured,

    /// Database and grants provisioned
    DatabaseReady,

    /// Application dependencies installed, env finalized
    DependenciesInstalled,

    /// Schema migrations applied
    MigrationsApplied,

    /// Reverse proxy validated and serving
    ProxyConfigured,

    /// TLS certificate issued
    CertificateIssued,

    /// Pipeline finished
    Done,

    /// Pipeline halted on a fatal stage failure
    Failed { stage: StageId, cause: String },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Init => "init",
            PipelineState::PackagesReady => "packagesready",
            PipelineState::RepoCloned => "repocloned",
            PipelineState::EnvConfigured => "envconfigured",
            PipelineState::DatabaseReady => "databaseready",
            PipelineState::DependenciesInstalled => "dependenciesinstalled",
            PipelineState::MigrationsApplied => "migrationsapplied",
            PipelineState::ProxyConfigured => "proxyconfigured",
            PipelineState::CertificateIssued => "certificateissued",
            PipelineState::Done => "done",
            PipelineState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }
}

/// Pipeline event
#[derive(Debug, Clone)]
pub enum StageEvent {
    /// Stage finished successfully
    Completed(StageId),

    /// Optional stage not selected by the plan
    Skipped(StageId),

    /// Stage failed
    Failed(StageId, String),

    /// All stages done
    Finished,
}

/// Pipeline FSM
///
/// Tracks the current state and the trail of states entered. Skipped
/// stages leave the state unchanged and add nothing to the trail.
#[derive(Debug, Clone)]
pub struct PipelineFsm {
    state: PipelineState,
    trail: Vec<PipelineState>,
}

impl PipelineFsm {
    /// Create a new FSM in the init state
    pub fn new() -> Self {
        Self {
            state: PipelineState::Init,
            trail: vec![PipelineState::Init],
        }
    }

    /// Get current state
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// States entered so far, in order
    pub fn trail(&self) -> &[PipelineState] {
        &self.trail
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: StageEvent) -> Result<(), DeployError> {
        let new_state = match (&self.state, &event) {
            (PipelineState::Init, StageEvent::Completed(StageId::Packages)) => {
                PipelineState::PackagesReady
            }

            (PipelineState::PackagesReady, StageEvent::Completed(StageId::Repository)) => {
                PipelineState::RepoCloned
            }

            (PipelineState::RepoCloned, StageEvent::Completed(StageId::Environment)) => {
                PipelineState::EnvConfigured
            }

            (PipelineState::EnvConfigured, StageEvent::Completed(StageId::Database)) => {
                PipelineState::DatabaseReady
            }
            (PipelineState::EnvConfigured, StageEvent::Skipped(StageId::Database)) => {
                return Ok(());
            }

            (
                PipelineState::EnvConfigured | PipelineState::DatabaseReady,
                StageEvent::Completed(StageId::Dependencies),
            ) => PipelineState::DependenciesInstalled,

            (PipelineState::DependenciesInstalled, StageEvent::Completed(StageId::Migrations)) => {
                PipelineState::MigrationsApplied
            }
            (PipelineState::DependenciesInstalled, StageEvent::Skipped(StageId::Migrations)) => {
                return Ok(());
            }

            (
                PipelineState::DependenciesInstalled | PipelineState::MigrationsApplied,
                StageEvent::Completed(StageId::Proxy),
            ) => PipelineState::ProxyConfigured,

            (PipelineState::ProxyConfigured, StageEvent::Completed(StageId::Certificate)) => {
                PipelineState::CertificateIssued
            }
            (PipelineState::ProxyConfigured, StageEvent::Skipped(StageId::Certificate)) => {
                return Ok(());
            }
            // The one non-fatal failure: a certificate that cannot be
            // issued leaves the site serving plain HTTP.
            (PipelineState::ProxyConfigured, StageEvent::Failed(StageId::Certificate, _)) => {
                return Ok(());
            }

            (
                PipelineState::ProxyConfigured | PipelineState::CertificateIssued,
                StageEvent::Finished,
            ) => PipelineState::Done,

            // Fatal failures, one arm per stage that can be running in
            // the given state
            (PipelineState::Init, StageEvent::Failed(StageId::Packages, cause)) => {
                PipelineState::Failed {
                    stage: StageId::Packages,
                    cause: cause.clone(),
                }
            }
            (PipelineState::PackagesReady, StageEvent::Failed(StageId::Repository, cause)) => {
                PipelineState::Failed {
                    stage: StageId::Repository,
                    cause: cause.clone(),
                }
            }
            (PipelineState::RepoCloned, StageEvent::Failed(StageId::Environment, cause)) => {
                PipelineState::Failed {
                    stage: StageId::Environment,
                    cause: cause.clone(),
                }
            }
            (PipelineState::EnvConfigured, StageEvent::Failed(StageId::Database, cause)) => {
                PipelineState::Failed {
                    stage: StageId::Database,
                    cause: cause.clone(),
                }
            }
            (
                PipelineState::EnvConfigured | PipelineState::DatabaseReady,
                StageEvent::Failed(StageId::Dependencies, cause),
            ) => PipelineState::Failed {
                stage: StageId::Dependencies,
                cause: cause.clone(),
            },
            (
                PipelineState::DependenciesInstalled,
                StageEvent::Failed(StageId::Migrations, cause),
            ) => PipelineState::Failed {
                stage: StageId::Migrations,
                cause: cause.clone(),
            },
            (
                PipelineState::DependenciesInstalled | PipelineState::MigrationsApplied,
                StageEvent::Failed(StageId::Proxy, cause),
            ) => PipelineState::Failed {
                stage: StageId::Proxy,
                cause: cause.clone(),
            },

            // Invalid transitions
            (state, event) => {
                return Err(DeployError::PipelineError(format!(
                    "Invalid transition: {:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state.clone();
        self.trail.push(new_state);
        Ok(())
    }
}

impl Default for PipelineFsm {
    fn default() -> Self {
        Self::new()
    }
}
