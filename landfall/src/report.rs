//! Stage progress reporting
//!
//! The pipeline emits one discriminated event per stage outcome and a
//! reporter renders them for the operator. Structured logging stays in
//! the stages; this is the human-facing channel.

use colored::Colorize;

use crate::models::report::StageId;

/// Presentation events emitted by the pipeline
#[derive(Debug, Clone)]
pub enum DeployEvent {
    PipelineStarted {
        host: String,
        repo_name: String,
    },
    StageStarted {
        stage: StageId,
    },
    StageCompleted {
        stage: StageId,
        detail: Option<String>,
    },
    StageSkipped {
        stage: StageId,
        reason: String,
    },
    StageWarning {
        stage: StageId,
        message: String,
    },
    StageFailed {
        stage: StageId,
        error: String,
    },
    PipelineFinished {
        success: bool,
        site_urls: Vec<String>,
    },
}

/// Renders pipeline events
pub trait StageReporter: Send + Sync {
    fn emit(&self, event: DeployEvent);
}

/// Colored console output
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl StageReporter for ConsoleReporter {
    fn emit(&self, event: DeployEvent) {
        match event {
            DeployEvent::PipelineStarted { host, repo_name } => {
                println!("Deploying {} to {}", repo_name.bold(), host.bold());
                println!();
            }
            DeployEvent::StageStarted { stage } => {
                println!("==> {}", stage);
            }
            DeployEvent::StageCompleted { stage, detail } => match detail {
                Some(detail) => println!("{} {}: {}", "[OK]".green(), stage, detail),
                None => println!("{} {}", "[OK]".green(), stage),
            },
            DeployEvent::StageSkipped { stage, reason } => {
                println!("{} {}: {}", "[SKIP]".yellow(), stage, reason);
            }
            DeployEvent::StageWarning { stage, message } => {
                println!("{} {}: {}", "[WARN]".yellow(), stage, message);
            }
            DeployEvent::StageFailed { stage, error } => {
                eprintln!("{} {}: {}", "[FAIL]".red(), stage, error);
            }
            DeployEvent::PipelineFinished { success, site_urls } => {
                println!();
                if success {
                    println!("{} Deployment complete", "[SUCCESS]".green().bold());
                    for url in site_urls {
                        println!("Site available at: {}", url.bold());
                    }
                } else {
                    eprintln!("{} Deployment failed", "[ERROR]".red().bold());
                }
            }
        }
    }
}

/// Swallows all events
#[derive(Debug, Default)]
pub struct NullReporter;

impl StageReporter for NullReporter {
    fn emit(&self, _event: DeployEvent) {}
}
