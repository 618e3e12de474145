//! Application dependency installation
//!
//! Installs composer dependencies in production mode, hands the writable
//! directories to the web server account and finalizes the env file with
//! database credentials and the application key.

use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::deploy::database::DatabaseOutcome;
use crate::deploy::envfile;
use crate::deploy::packages::DependencyManager;
use crate::errors::DeployError;
use crate::models::plan::DeploymentPlan;
use crate::remote::script::{RemoteScript, ShellCommand};
use crate::remote::{read_file, write_file, RemoteExecutor, WriteAs};

const COMPOSER_INSTALL_ARGS: [&str; 5] = [
    "install",
    "--no-dev",
    "--prefer-dist",
    "--optimize-autoloader",
    "--no-interaction",
];

/// Result of the dependencies stage
#[derive(Debug, Clone)]
pub struct DependenciesOutcome {
    /// An application key was generated on the target
    pub app_key_generated: bool,
}

/// Install dependencies and finalize the env file.
///
/// Consumes the packages stage's dependency manager and, when the
/// database stage ran, its resolved credentials.
pub async fn install(
    plan: &DeploymentPlan,
    manager: &DependencyManager,
    database: Option<&DatabaseOutcome>,
    exec: &dyn RemoteExecutor,
) -> Result<DependenciesOutcome, DeployError> {
    let checkout = plan.checkout_path();

    let composer = match manager {
        DependencyManager::Global => ShellCommand::new("composer"),
        DependencyManager::Local { phar } => {
            relocate_phar(exec, phar, &checkout).await?;
            ShellCommand::new("php").arg("composer.phar")
        }
    };

    info!("Installing application dependencies in {}", checkout);
    let script = RemoteScript::new()
        .then(ShellCommand::new("cd").arg(&checkout))
        .then(composer.args(COMPOSER_INSTALL_ARGS));
    exec.run_checked(&script).await?;

    info!("Handing writable directories to the web server account");
    let chown = ShellCommand::new("chown")
        .args(["-R", "www-data:www-data"])
        .arg(format!("{}/storage", checkout))
        .arg(format!("{}/bootstrap/cache", checkout))
        .sudo();
    exec.run_checked(&chown.into()).await?;

    finalize_env(plan, database, exec, &checkout).await?;

    let app_key_generated = if plan.app_key().is_none() {
        info!("Generating application key");
        let script = RemoteScript::new()
            .then(ShellCommand::new("cd").arg(&checkout))
            .then(ShellCommand::new("php").args(["artisan", "key:generate", "--force"]));
        exec.run_checked(&script).await?;
        true
    } else {
        false
    };

    Ok(DependenciesOutcome { app_key_generated })
}

/// Write database credentials and a supplied app key into the env file
async fn finalize_env(
    plan: &DeploymentPlan,
    database: Option<&DatabaseOutcome>,
    exec: &dyn RemoteExecutor,
    checkout: &str,
) -> Result<(), DeployError> {
    let mut substitutions: Vec<(String, String)> = Vec::new();
    if let Some(db) = database {
        substitutions.push(("DB_DATABASE".to_string(), db.credentials.database.clone()));
        substitutions.push(("DB_USERNAME".to_string(), db.credentials.username.clone()));
        substitutions.push((
            "DB_PASSWORD".to_string(),
            db.credentials.password.expose_secret().to_string(),
        ));
    }
    if let Some(app_key) = plan.app_key() {
        substitutions.push(("APP_KEY".to_string(), app_key.expose_secret().to_string()));
    }
    if substitutions.is_empty() {
        return Ok(());
    }

    let env_path = format!("{}/.env", checkout);
    let contents = read_file(exec, &env_path).await?;
    let updated = envfile::apply(&contents, &substitutions);
    if updated != contents {
        write_file(exec, &env_path, &updated, WriteAs::User).await?;
    }
    Ok(())
}

/// Move a staged composer.phar into the checkout before first use.
/// Nothing to do when an earlier run already moved it.
async fn relocate_phar(
    exec: &dyn RemoteExecutor,
    phar: &str,
    checkout: &str,
) -> Result<(), DeployError> {
    let staged = exec
        .run(&ShellCommand::new("test").args(["-f", phar]).into())
        .await?
        .success();
    if staged {
        debug!("Moving {} into {}", phar, checkout);
        exec.run_checked(
            &ShellCommand::new("mv")
                .arg(phar)
                .arg(format!("{}/composer.phar", checkout))
                .into(),
        )
        .await?;
    }
    Ok(())
}
