//! Schema migrations

use tracing::info;

use crate::errors::DeployError;
use crate::models::plan::DeploymentPlan;
use crate::remote::script::{RemoteScript, ShellCommand};
use crate::remote::RemoteExecutor;

/// Result of the migrations stage
#[derive(Debug, Clone)]
pub struct MigrationsOutcome {
    /// Seed data was loaded along with the schema
    pub seeded: bool,
}

/// Run schema migrations and seed data
pub async fn run(
    plan: &DeploymentPlan,
    exec: &dyn RemoteExecutor,
) -> Result<MigrationsOutcome, DeployError> {
    let checkout = plan.checkout_path();
    info!("Running schema migrations in {}", checkout);

    let script = RemoteScript::new()
        .then(ShellCommand::new("cd").arg(&checkout))
        .then(ShellCommand::new("php").args(["artisan", "migrate", "--force", "--seed"]));
    exec.run_checked(&script).await?;

    Ok(MigrationsOutcome { seeded: true })
}
