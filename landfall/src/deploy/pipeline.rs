//! Pipeline orchestration
//!
//! Drives the stages strictly sequentially over one validated plan. A
//! fatal stage failure halts the run and is recorded in the report; the
//! certificate stage is the only one allowed to fail without aborting.

use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::deploy::certificate;
use crate::deploy::database::{self, DatabaseOutcome};
use crate::deploy::dependencies;
use crate::deploy::environment;
use crate::deploy::fsm::{PipelineFsm, StageEvent};
use crate::deploy::migrations;
use crate::deploy::packages;
use crate::deploy::proxy;
use crate::deploy::repository;
use crate::errors::DeployError;
use crate::models::plan::DeploymentPlan;
use crate::models::report::{
    DeploymentReport, RunFailure, RunStatus, StageId, StageReport, StageStatus,
};
use crate::remote::RemoteExecutor;
use crate::report::{DeployEvent, StageReporter};

pub struct Deployer<'a> {
    plan: &'a DeploymentPlan,
    exec: &'a dyn RemoteExecutor,
    reporter: &'a dyn StageReporter,
    fsm: PipelineFsm,
    stages: Vec<StageReport>,
}

impl<'a> Deployer<'a> {
    pub fn new(
        plan: &'a DeploymentPlan,
        exec: &'a dyn RemoteExecutor,
        reporter: &'a dyn StageReporter,
    ) -> Self {
        Self {
            plan,
            exec,
            reporter,
            fsm: PipelineFsm::new(),
            stages: Vec::new(),
        }
    }

    /// Runs the pipeline to completion or to the first fatal failure.
    ///
    /// Stage failures are captured in the returned report rather than
    /// bubbled up; `Err` is reserved for internal inconsistencies such
    /// as an invalid state transition.
    pub async fn run(mut self) -> Result<DeploymentReport, DeployError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(
            "Starting deployment of {} to {} (run {})",
            self.plan.repo_name(),
            self.plan.server_host(),
            run_id
        );
        self.reporter.emit(DeployEvent::PipelineStarted {
            host: self.plan.server_host().to_string(),
            repo_name: self.plan.repo_name().to_string(),
        });

        let mut site_urls = Vec::new();
        let failure = self.run_stages(&mut site_urls).await?;

        let status = if failure.is_none() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        self.reporter.emit(DeployEvent::PipelineFinished {
            success: failure.is_none(),
            site_urls: site_urls.clone(),
        });

        Ok(DeploymentReport {
            run_id,
            host: self.plan.server_host().to_string(),
            started_at,
            finished_at: Utc::now(),
            stages: self.stages,
            state_trail: self
                .fsm
                .trail()
                .iter()
                .map(|state| state.name().to_string())
                .collect(),
            status,
            failure,
            site_urls,
        })
    }

    async fn run_stages(
        &mut self,
        site_urls: &mut Vec<String>,
    ) -> Result<Option<RunFailure>, DeployError> {
        // Packages
        self.start(StageId::Packages);
        let started = Instant::now();
        let packages = match packages::provision(self.plan, self.exec).await {
            Ok(outcome) => {
                let detail = if outcome.installed.is_empty() {
                    "all packages already present".to_string()
                } else if outcome.refreshed_index {
                    format!(
                        "refreshed index, installed {} packages",
                        outcome.installed.len()
                    )
                } else {
                    format!("installed {} packages", outcome.installed.len())
                };
                self.complete(StageId::Packages, Some(detail), started)?;
                outcome
            }
            Err(err) => return self.fail(StageId::Packages, err, started).map(Some),
        };

        // Repository
        self.start(StageId::Repository);
        let started = Instant::now();
        match repository::checkout(self.plan, self.exec).await {
            Ok(outcome) => {
                let detail = format!("checked out to {}", outcome.checkout_path);
                self.complete(StageId::Repository, Some(detail), started)?;
            }
            Err(err) => return self.fail(StageId::Repository, err, started).map(Some),
        }

        // Environment
        self.start(StageId::Environment);
        let started = Instant::now();
        match environment::configure(self.plan, self.exec).await {
            Ok(outcome) => {
                let detail = format!("configured {}", outcome.env_path);
                self.complete(StageId::Environment, Some(detail), started)?;
            }
            Err(err) => return self.fail(StageId::Environment, err, started).map(Some),
        }

        // Database
        let db_outcome: Option<DatabaseOutcome> = if self.plan.database().is_some() {
            self.start(StageId::Database);
            let started = Instant::now();
            match database::provision(self.plan, self.exec).await {
                Ok(outcome) => {
                    let detail = format!("database {} ready", outcome.credentials.database);
                    self.complete(StageId::Database, Some(detail), started)?;
                    Some(outcome)
                }
                Err(err) => return self.fail(StageId::Database, err, started).map(Some),
            }
        } else {
            self.skip(StageId::Database, "createDatabase not set")?;
            None
        };

        // Dependencies
        self.start(StageId::Dependencies);
        let started = Instant::now();
        match dependencies::install(
            self.plan,
            &packages.dependency_manager,
            db_outcome.as_ref(),
            self.exec,
        )
        .await
        {
            Ok(outcome) => {
                let detail = if outcome.app_key_generated {
                    "composer install completed, application key generated".to_string()
                } else {
                    "composer install completed".to_string()
                };
                self.complete(StageId::Dependencies, Some(detail), started)?;
            }
            Err(err) => return self.fail(StageId::Dependencies, err, started).map(Some),
        }

        // Migrations
        if self.plan.install_migrations() {
            self.start(StageId::Migrations);
            let started = Instant::now();
            match migrations::run(self.plan, self.exec).await {
                Ok(outcome) => {
                    let detail = if outcome.seeded {
                        "schema migrated and seeded".to_string()
                    } else {
                        "schema migrated".to_string()
                    };
                    self.complete(StageId::Migrations, Some(detail), started)?;
                }
                Err(err) => return self.fail(StageId::Migrations, err, started).map(Some),
            }
        } else {
            self.skip(StageId::Migrations, "installMigrations not set")?;
        }

        // Proxy
        self.start(StageId::Proxy);
        let started = Instant::now();
        match proxy::configure(self.plan, self.exec).await {
            Ok(outcome) => {
                site_urls.push(outcome.site_url.clone());
                let detail = format!("serving {}", outcome.site_url);
                self.complete(StageId::Proxy, Some(detail), started)?;
            }
            Err(err) => return self.fail(StageId::Proxy, err, started).map(Some),
        }

        // Certificate. Failure here leaves a working HTTP site behind,
        // so it is reported as a warning instead of aborting the run.
        if self.plan.issue_certificate() {
            self.start(StageId::Certificate);
            let started = Instant::now();
            match certificate::issue(self.plan, self.exec).await {
                Ok(outcome) => {
                    site_urls.push(outcome.site_url.clone());
                    let detail = format!("issued for {}", self.plan.domain_name());
                    self.complete(StageId::Certificate, Some(detail), started)?;
                }
                Err(err) => {
                    let error = err.to_string();
                    warn!("Certificate issuance failed: {}", error);
                    self.fsm
                        .process(StageEvent::Failed(StageId::Certificate, error.clone()))?;
                    self.stages.push(StageReport {
                        stage: StageId::Certificate,
                        status: StageStatus::Failed,
                        detail: None,
                        error: Some(error.clone()),
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    self.reporter.emit(DeployEvent::StageWarning {
                        stage: StageId::Certificate,
                        message: error,
                    });
                }
            }
        } else {
            self.skip(StageId::Certificate, "issueCertificate not set")?;
        }

        self.fsm.process(StageEvent::Finished)?;
        Ok(None)
    }

    fn start(&self, stage: StageId) {
        info!("Stage {} started", stage);
        self.reporter.emit(DeployEvent::StageStarted { stage });
    }

    fn complete(
        &mut self,
        stage: StageId,
        detail: Option<String>,
        started: Instant,
    ) -> Result<(), DeployError> {
        info!("Stage {} completed", stage);
        self.fsm.process(StageEvent::Completed(stage))?;
        self.stages.push(StageReport {
            stage,
            status: StageStatus::Completed,
            detail: detail.clone(),
            error: None,
            duration_ms: started.elapsed().as_millis() as u64,
        });
        self.reporter
            .emit(DeployEvent::StageCompleted { stage, detail });
        Ok(())
    }

    fn skip(&mut self, stage: StageId, reason: &str) -> Result<(), DeployError> {
        info!("Stage {} skipped: {}", stage, reason);
        self.fsm.process(StageEvent::Skipped(stage))?;
        self.stages.push(StageReport {
            stage,
            status: StageStatus::Skipped,
            detail: Some(reason.to_string()),
            error: None,
            duration_ms: 0,
        });
        self.reporter.emit(DeployEvent::StageSkipped {
            stage,
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn fail(
        &mut self,
        stage: StageId,
        err: DeployError,
        started: Instant,
    ) -> Result<RunFailure, DeployError> {
        let error = err.to_string();
        error!("Stage {} failed: {}", stage, error);
        self.fsm
            .process(StageEvent::Failed(stage, error.clone()))?;
        self.stages.push(StageReport {
            stage,
            status: StageStatus::Failed,
            detail: None,
            error: Some(error.clone()),
            duration_ms: started.elapsed().as_millis() as u64,
        });
        self.reporter
            .emit(DeployEvent::StageFailed { stage, error: error.clone() });
        Ok(RunFailure { stage, error })
    }
}
