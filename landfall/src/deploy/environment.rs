//! Environment file configuration

use tracing::{debug, info};

use crate::deploy::envfile;
use crate::errors::DeployError;
use crate::models::plan::DeploymentPlan;
use crate::remote::script::ShellCommand;
use crate::remote::{read_file, write_file, RemoteExecutor, WriteAs};

/// Result of the environment stage
#[derive(Debug, Clone)]
pub struct EnvironmentOutcome {
    /// Path of the active env file
    pub env_path: String,
}

/// Put a configured env file in place.
///
/// The template is only copied when no env file exists yet; a rerun never
/// clobbers a file that may have been configured since.
pub async fn configure(
    plan: &DeploymentPlan,
    exec: &dyn RemoteExecutor,
) -> Result<EnvironmentOutcome, DeployError> {
    let checkout = plan.checkout_path();
    let env_path = format!("{}/.env", checkout);
    let template_path = format!("{}/.env.example", checkout);

    let env_exists = exec
        .run(&ShellCommand::new("test").args(["-f", &env_path]).into())
        .await?
        .success();
    if env_exists {
        debug!("{} already present, keeping it", env_path);
    } else {
        info!("Copying {} to {}", template_path, env_path);
        exec.run_checked(
            &ShellCommand::new("cp")
                .arg(&template_path)
                .arg(&env_path)
                .into(),
        )
        .await?;
    }

    let substitutions = vec![
        ("APP_ENV".to_string(), plan.app_env().to_string()),
        (
            "APP_URL".to_string(),
            format!("http://{}", plan.domain_name()),
        ),
    ];

    let contents = read_file(exec, &env_path).await?;
    let updated = envfile::apply(&contents, &substitutions);
    if updated != contents {
        write_file(exec, &env_path, &updated, WriteAs::User).await?;
    }

    info!("Environment configured at {}", env_path);
    Ok(EnvironmentOutcome { env_path })
}
