//! TLS certificate issuance
//!
//! The only stage whose failure does not halt the run: a site without a
//! certificate still serves plain HTTP.

use tracing::info;

use crate::errors::DeployError;
use crate::models::plan::DeploymentPlan;
use crate::remote::script::ShellCommand;
use crate::remote::RemoteExecutor;

/// Result of the certificate stage
#[derive(Debug, Clone)]
pub struct CertificateOutcome {
    /// URL the site answers on with TLS
    pub site_url: String,
}

/// Request a certificate for the domain via certbot
pub async fn issue(
    plan: &DeploymentPlan,
    exec: &dyn RemoteExecutor,
) -> Result<CertificateOutcome, DeployError> {
    info!("Requesting certificate for {}", plan.domain_name());

    let cmd = ShellCommand::new("certbot")
        .args(["--nginx", "-d"])
        .arg(plan.domain_name())
        .args(["--non-interactive", "--agree-tos"])
        .sudo();
    let cmd = match plan.certificate_email() {
        Some(email) => cmd.arg("-m").arg(email),
        None => cmd.arg("--register-unsafely-without-email"),
    };
    exec.run_checked(&cmd.into()).await?;

    Ok(CertificateOutcome {
        site_url: format!("https://{}", plan.domain_name()),
    })
}
