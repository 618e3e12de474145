//! Landfall - Entry Point
//!
//! One-shot deployment tool: provisions a remote host over SSH and
//! publishes a PHP web application behind nginx.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::error;

use landfall::deploy::pipeline::Deployer;
use landfall::deploy::proxy;
use landfall::errors::DeployError;
use landfall::filesys::file::File;
use landfall::logs::{init_logging, LogLevel, LogOptions};
use landfall::models::plan::{DeploymentPlan, PlanFile};
use landfall::remote::ssh::{SshExecutor, SshOptions, SshTarget};
use landfall::report::ConsoleReporter;
use landfall::utils::version_info;

#[derive(Parser)]
#[command(name = "landfall")]
#[command(about = "One-shot SSH deployment for PHP web applications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deployment pipeline against the target host
    Deploy {
        /// Path to the deployment plan (JSON)
        #[arg(long)]
        plan: PathBuf,

        /// SSH identity file
        #[arg(long)]
        identity: Option<PathBuf>,

        /// SSH port
        #[arg(long, default_value_t = 22)]
        port: u16,

        /// SSH connect timeout in seconds
        #[arg(long, default_value_t = 15)]
        connect_timeout: u64,

        /// Wall-clock budget per remote command in seconds
        #[arg(long, default_value_t = 600)]
        command_timeout: u64,

        /// Write the deployment report to this path (JSON)
        #[arg(long)]
        report_out: Option<PathBuf>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long, default_value = "info")]
        log_level: LogLevel,

        /// Emit logs as JSON
        #[arg(long)]
        json_logs: bool,
    },

    /// Validate a plan and print what a deployment would do, without
    /// connecting anywhere
    Check {
        /// Path to the deployment plan (JSON)
        #[arg(long)]
        plan: PathBuf,
    },

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy {
            plan,
            identity,
            port,
            connect_timeout,
            command_timeout,
            report_out,
            log_level,
            json_logs,
        } => {
            let log_options = LogOptions {
                log_level,
                json_format: json_logs,
            };
            if let Err(e) = init_logging(log_options) {
                eprintln!("Failed to initialize logging: {}", e);
            }

            match deploy(
                &plan,
                identity,
                port,
                connect_timeout,
                command_timeout,
                report_out,
            )
            .await
            {
                Ok(true) => ExitCode::SUCCESS,
                Ok(false) => ExitCode::FAILURE,
                Err(e) => {
                    error!("{}", e);
                    eprintln!("Error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Check { plan } => match check(&plan).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },

        Commands::Version => {
            let version = version_info();
            println!(
                "landfall {} (git {}, built {})",
                version.version, version.git_hash, version.build_time
            );
            ExitCode::SUCCESS
        }
    }
}

async fn load_plan(path: &Path) -> Result<DeploymentPlan, DeployError> {
    let file = File::new(path);
    if !file.exists().await {
        return Err(DeployError::ValidationError(format!(
            "Plan file not found: {}",
            path.display()
        )));
    }
    let plan_file: PlanFile = file.read_json().await?;
    DeploymentPlan::from_file(plan_file)
}

async fn deploy(
    plan_path: &Path,
    identity: Option<PathBuf>,
    port: u16,
    connect_timeout: u64,
    command_timeout: u64,
    report_out: Option<PathBuf>,
) -> Result<bool, DeployError> {
    let plan = load_plan(plan_path).await?;

    let target = SshTarget {
        host: plan.server_host().to_string(),
        user: plan.ssh_user().to_string(),
        port,
        identity_file: identity,
    };
    let options = SshOptions {
        connect_timeout: Duration::from_secs(connect_timeout),
        command_timeout: Duration::from_secs(command_timeout),
    };
    let executor = SshExecutor::new(target, options);
    let reporter = ConsoleReporter;

    let report = Deployer::new(&plan, &executor, &reporter).run().await?;

    if let Some(path) = report_out {
        File::new(path).write_json(&report).await?;
    }

    Ok(report.succeeded())
}

async fn check(plan_path: &Path) -> Result<(), DeployError> {
    let plan = load_plan(plan_path).await?;

    println!("Plan OK");
    println!("  target:        {}@{}", plan.ssh_user(), plan.server_host());
    println!("  repository:    {}", plan.repo_url());
    println!("  checkout path: {}", plan.checkout_path());
    println!("  document root: {}/public", plan.checkout_path());
    println!("  php-fpm:       {}", proxy::fpm_socket(&plan));
    println!("  domain:        {}", plan.domain_name());
    match plan.database() {
        Some(db) => println!("  database:      create {}", db.name),
        None => println!("  database:      skip"),
    }
    println!(
        "  migrations:    {}",
        if plan.install_migrations() { "run" } else { "skip" }
    );
    println!(
        "  certificate:   {}",
        if plan.issue_certificate() { "issue" } else { "skip" }
    );
    Ok(())
}
