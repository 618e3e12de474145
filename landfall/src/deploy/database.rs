//! Database provisioning
//!
//! Statements run through the mysql client as root, with the password
//! supplied via MYSQL_PWD rather than argv. Identifiers were validated at
//! plan construction; passwords are escaped as string literals here.

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::errors::DeployError;
use crate::models::plan::{DatabaseOptions, DeploymentPlan};
use crate::remote::script::ShellCommand;
use crate::remote::RemoteExecutor;

/// Credentials handed to the dependency stage for the env file
#[derive(Debug, Clone)]
pub struct DbCredentials {
    pub database: String,
    pub username: String,
    pub password: SecretString,
}

/// Result of the database stage
#[derive(Debug, Clone)]
pub struct DatabaseOutcome {
    pub credentials: DbCredentials,
}

/// Create the database, the optional dedicated user and its grants
pub async fn provision(
    plan: &DeploymentPlan,
    exec: &dyn RemoteExecutor,
) -> Result<DatabaseOutcome, DeployError> {
    let db = plan.database().ok_or_else(|| {
        DeployError::PipelineError("Database stage invoked without database options".to_string())
    })?;

    info!("Creating database {}", db.name);
    let create = format!("CREATE DATABASE IF NOT EXISTS `{}`;", db.name);
    run_sql(exec, db, &create, false).await?;

    let credentials = match &db.user {
        Some(user) => {
            info!("Creating database user {}", user.name);
            let statement = format!(
                "CREATE USER IF NOT EXISTS '{}'@'localhost' IDENTIFIED BY '{}'; \
                 GRANT ALL PRIVILEGES ON `{}`.* TO '{}'@'localhost';",
                user.name,
                sql_escape(user.password.expose_secret()),
                db.name,
                user.name
            );
            run_sql(exec, db, &statement, true).await?;

            DbCredentials {
                database: db.name.clone(),
                username: user.name.clone(),
                password: user.password.clone(),
            }
        }
        None => DbCredentials {
            database: db.name.clone(),
            username: "root".to_string(),
            password: db.root_password.clone(),
        },
    };

    run_sql(exec, db, "FLUSH PRIVILEGES;", false).await?;

    Ok(DatabaseOutcome { credentials })
}

async fn run_sql(
    exec: &dyn RemoteExecutor,
    db: &DatabaseOptions,
    statement: &str,
    secret: bool,
) -> Result<(), DeployError> {
    let cmd = ShellCommand::new("mysql")
        .secret_env("MYSQL_PWD", db.root_password.expose_secret())
        .args(["-u", "root", "-e"]);
    let cmd = if secret {
        cmd.secret_arg(statement)
    } else {
        cmd.arg(statement)
    };
    exec.run_checked(&cmd.into()).await?;
    Ok(())
}

/// Escape a value for a single-quoted MySQL string literal
fn sql_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\0' => escaped.push_str("\\0"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
