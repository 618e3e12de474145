//! Reverse proxy configuration
//!
//! Renders the vhost, installs it under sites-available, enables it and
//! reloads nginx. The reload only ever happens after `nginx -t` accepted
//! the full configuration.

use tracing::{debug, info};

use crate::errors::DeployError;
use crate::models::plan::DeploymentPlan;
use crate::remote::script::ShellCommand;
use crate::remote::{write_file, RemoteExecutor, WriteAs};

const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";

/// Result of the proxy stage
#[derive(Debug, Clone)]
pub struct ProxyOutcome {
    /// Installed vhost config path
    pub config_path: String,

    /// URL the site answers on
    pub site_url: String,
}

/// PHP-FPM upstream socket for the plan's runtime
pub fn fpm_socket(plan: &DeploymentPlan) -> String {
    format!("/var/run/php/php{}-fpm.sock", plan.runtime_version())
}

/// Render the nginx server block for the plan
pub fn render_vhost(plan: &DeploymentPlan) -> String {
    let docroot = format!("{}/public", plan.checkout_path());
    format!(
        r#"server {{
    listen 80;
    listen [::]:80;

    server_name {domain};
    root {docroot};

    add_header X-Frame-Options "SAMEORIGIN";
    add_header X-Content-Type-Options "nosniff";

    index index.php index.html;

    charset utf-8;

    location / {{
        try_files $uri $uri/ /index.php?$query_string;
    }}

    location = /favicon.ico {{ access_log off; log_not_found off; }}
    location = /robots.txt  {{ access_log off; log_not_found off; }}

    error_page 404 /index.php;

    location ~ \.php$ {{
        include snippets/fastcgi-php.conf;
        fastcgi_pass unix:{socket};
    }}

    location ~ /\.(?!well-known).* {{
        deny all;
    }}
}}
"#,
        domain = plan.domain_name(),
        docroot = docroot,
        socket = fpm_socket(plan),
    )
}

/// Install, enable, validate and reload the vhost
pub async fn configure(
    plan: &DeploymentPlan,
    exec: &dyn RemoteExecutor,
) -> Result<ProxyOutcome, DeployError> {
    let config_path = format!("{}/{}", SITES_AVAILABLE, plan.repo_name());
    let enabled_path = format!("{}/{}", SITES_ENABLED, plan.repo_name());

    info!("Installing vhost for {} at {}", plan.domain_name(), config_path);
    let vhost = render_vhost(plan);
    write_file(exec, &config_path, &vhost, WriteAs::Root).await?;

    let enabled = exec
        .run(&ShellCommand::new("test").args(["-L", &enabled_path]).into())
        .await?
        .success();
    if enabled {
        debug!("Site {} already enabled", plan.repo_name());
    } else {
        exec.run_checked(
            &ShellCommand::new("ln")
                .args(["-s", &config_path, &enabled_path])
                .sudo()
                .into(),
        )
        .await?;
    }

    // Never reload a configuration that failed validation
    let check = exec
        .run(&ShellCommand::new("nginx").arg("-t").sudo().into())
        .await?;
    if !check.success() {
        return Err(DeployError::ConfigValidationError(
            check.stderr.trim().to_string(),
        ));
    }

    info!("Configuration valid, reloading nginx");
    exec.run_checked(
        &ShellCommand::new("systemctl")
            .args(["reload", "nginx"])
            .sudo()
            .into(),
    )
    .await?;

    Ok(ProxyOutcome {
        config_path,
        site_url: format!("http://{}", plan.domain_name()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::PlanFile;

    fn plan() -> DeploymentPlan {
        DeploymentPlan::from_file(PlanFile {
            server_host: "203.0.113.10".to_string(),
            ssh_user: "deploy".to_string(),
            project_path: "/var/www".to_string(),
            repo_url: "git@github.com:acme/shop.git".to_string(),
            app_env: "production".to_string(),
            app_key: None,
            runtime_version: "8.2".to_string(),
            domain_name: "shop.example.com".to_string(),
            create_database: false,
            database: None,
            install_migrations: false,
            issue_certificate: false,
            certificate_email: None,
        })
        .unwrap()
    }

    #[test]
    fn test_fpm_socket() {
        assert_eq!(fpm_socket(&plan()), "/var/run/php/php8.2-fpm.sock");
    }

    #[test]
    fn test_render_vhost() {
        let vhost = render_vhost(&plan());
        assert!(vhost.contains("server_name shop.example.com;"));
        assert!(vhost.contains("root /var/www/shop/public;"));
        assert!(vhost.contains("fastcgi_pass unix:/var/run/php/php8.2-fpm.sock;"));
        assert!(vhost.contains("try_files $uri $uri/ /index.php?$query_string;"));
    }
}
