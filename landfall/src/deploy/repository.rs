//! Repository checkout
//!
//! Fresh-clone only: an existing non-empty target directory is an error,
//! never merged into or pulled over.

use tracing::{debug, info};

use crate::errors::DeployError;
use crate::models::plan::DeploymentPlan;
use crate::remote::script::ShellCommand;
use crate::remote::{ensure_dir, RemoteExecutor};

/// Result of the repository stage
#[derive(Debug, Clone)]
pub struct RepositoryOutcome {
    /// Directory the repository was checked out into
    pub checkout_path: String,
}

/// Clone the repository into the project directory
pub async fn checkout(
    plan: &DeploymentPlan,
    exec: &dyn RemoteExecutor,
) -> Result<RepositoryOutcome, DeployError> {
    let checkout_path = plan.checkout_path();
    info!("Cloning {} into {}", plan.repo_url(), checkout_path);

    ensure_dir(exec, plan.project_path(), plan.ssh_user()).await?;

    let exists = exec
        .run(&ShellCommand::new("test").args(["-e", &checkout_path]).into())
        .await?
        .success();
    if exists {
        let listing = exec
            .run_checked(&ShellCommand::new("ls").args(["-A", &checkout_path]).into())
            .await?;
        if !listing.stdout.trim().is_empty() {
            return Err(DeployError::CloneError(format!(
                "Target directory {} exists and is not empty",
                checkout_path
            )));
        }
        debug!("Target directory exists but is empty");
    }

    let clone = ShellCommand::new("git")
        .arg("clone")
        .arg(plan.repo_url())
        .arg(&checkout_path);
    match exec.run_checked(&clone.into()).await {
        Ok(_) => {}
        Err(DeployError::RemoteCommandError {
            exit_code, stderr, ..
        }) => {
            return Err(DeployError::CloneError(format!(
                "git clone exited with code {}: {}",
                exit_code, stderr
            )));
        }
        Err(e) => return Err(e),
    }

    info!("Repository ready at {}", checkout_path);
    Ok(RepositoryOutcome { checkout_path })
}
