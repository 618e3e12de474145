//! System package provisioning
//!
//! Brings the host to the required package set: web server, git, PHP
//! runtime with extensions, and a dependency manager. Every package is
//! queried before it is installed; nothing present is ever reinstalled.

use tracing::{debug, info};

use crate::errors::DeployError;
use crate::models::plan::{DeploymentPlan, RuntimeVersion};
use crate::remote::script::{Pipeline, RemoteScript, ShellCommand};
use crate::remote::{ensure_dir, RemoteExecutor};

const BASE_PACKAGES: [&str; 4] = ["nginx", "git", "curl", "unzip"];

const PHP_EXTENSIONS: [&str; 7] = ["fpm", "mbstring", "xml", "bcmath", "curl", "mysql", "zip"];

const COMPOSER_INSTALLER_URL: &str = "https://getcomposer.org/installer";

/// How the dependency install stage invokes composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyManager {
    /// composer is on the PATH
    Global,

    /// A project-local composer.phar, staged at this path
    Local { phar: String },
}

/// Result of the packages stage
#[derive(Debug, Clone)]
pub struct PackagesOutcome {
    /// Package indexes were refreshed before installing
    pub refreshed_index: bool,

    /// Packages actually installed by this run
    pub installed: Vec<String>,

    /// Dependency manager available to later stages
    pub dependency_manager: DependencyManager,
}

/// Full package set for a PHP series
pub fn required_packages(version: &RuntimeVersion) -> Vec<String> {
    let mut packages: Vec<String> = BASE_PACKAGES.iter().map(|p| p.to_string()).collect();
    packages.push(format!("php{}", version));
    for ext in PHP_EXTENSIONS {
        packages.push(format!("php{}-{}", version, ext));
    }
    packages
}

/// Provision the package set and a dependency manager
pub async fn provision(
    plan: &DeploymentPlan,
    exec: &dyn RemoteExecutor,
) -> Result<PackagesOutcome, DeployError> {
    info!("Checking system packages");

    // A host without nginx is treated as a fresh install: refresh and
    // upgrade before anything goes on.
    let nginx_present = is_installed(exec, "nginx").await?;
    let mut refreshed_index = false;
    if !nginx_present {
        info!("nginx not present, refreshing package index");
        exec.run_checked(&apt_get(&["update", "-y"]).into()).await?;
        exec.run_checked(&apt_get(&["upgrade", "-y"]).into()).await?;
        refreshed_index = true;
    }

    let mut missing: Vec<String> = Vec::new();
    for package in required_packages(plan.runtime_version()) {
        let present = if package == "nginx" {
            nginx_present
        } else {
            is_installed(exec, &package).await?
        };
        if present {
            debug!("Package {} already installed", package);
        } else {
            missing.push(package);
        }
    }

    if !missing.is_empty() {
        info!("Installing {} packages: {}", missing.len(), missing.join(", "));
        let install = apt_get(&["install", "-y"]).args(missing.clone());
        exec.run_checked(&install.into()).await?;
    } else {
        info!("All packages already installed");
    }

    let dependency_manager = if command_exists(exec, "composer").await? {
        debug!("composer available system-wide");
        DependencyManager::Global
    } else {
        info!("composer not found, staging a project-local copy");
        ensure_dir(exec, plan.project_path(), plan.ssh_user()).await?;

        let script = RemoteScript::new()
            .then(ShellCommand::new("cd").arg(plan.project_path()))
            .then(ShellCommand::new("curl").args([
                "-sS",
                COMPOSER_INSTALLER_URL,
                "-o",
                "composer-setup.php",
            ]))
            .then(ShellCommand::new("php").arg("composer-setup.php"))
            .then(ShellCommand::new("rm").arg("composer-setup.php"));
        exec.run_checked(&script).await?;

        DependencyManager::Local {
            phar: format!("{}/composer.phar", plan.project_path()),
        }
    };

    Ok(PackagesOutcome {
        refreshed_index,
        installed: missing,
        dependency_manager,
    })
}

fn apt_get(args: &[&str]) -> ShellCommand {
    ShellCommand::new("apt-get")
        .args(args.iter().copied())
        .env("DEBIAN_FRONTEND", "noninteractive")
        .sudo()
}

async fn is_installed(exec: &dyn RemoteExecutor, package: &str) -> Result<bool, DeployError> {
    let query = Pipeline::new(ShellCommand::new("dpkg").args(["-s", package])).to_null();
    Ok(exec.run(&query.into()).await?.success())
}

async fn command_exists(exec: &dyn RemoteExecutor, name: &str) -> Result<bool, DeployError> {
    let query = Pipeline::new(ShellCommand::new("command").args(["-v", name])).to_null();
    Ok(exec.run(&query.into()).await?.success())
}
