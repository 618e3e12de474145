//! Deployment plan models
//!
//! A plan arrives as a JSON file, is validated once, and becomes the
//! read-only input of the whole run. Validation happens here so that a
//! bad plan never costs a single SSH connection.

use std::fmt;

use secrecy::SecretString;
use serde::Deserialize;

use crate::errors::DeployError;

/// Raw plan file as written by the operator
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFile {
    /// SSH host to deploy to
    pub server_host: String,

    /// SSH login user
    pub ssh_user: String,

    /// Base directory on the target under which the app is checked out
    #[serde(default = "default_project_path")]
    pub project_path: String,

    /// Git clone URL (https or scp-like)
    pub repo_url: String,

    /// Value for the APP_ENV key
    #[serde(default = "default_app_env")]
    pub app_env: String,

    /// Application key; generated remotely when absent
    #[serde(default)]
    pub app_key: Option<SecretString>,

    /// PHP series, e.g. "8.2"
    pub runtime_version: String,

    /// Server name for the reverse proxy and certificate
    pub domain_name: String,

    /// Provision a MySQL database
    #[serde(default)]
    pub create_database: bool,

    /// Database settings, required when create_database is set
    #[serde(default)]
    pub database: Option<DatabaseFile>,

    /// Run schema migrations after install
    #[serde(default)]
    pub install_migrations: bool,

    /// Issue a TLS certificate for the domain
    #[serde(default)]
    pub issue_certificate: bool,

    /// Registration email for the certificate authority
    #[serde(default)]
    pub certificate_email: Option<String>,
}

fn default_project_path() -> String {
    "/var/www".to_string()
}

fn default_app_env() -> String {
    "production".to_string()
}

/// Database section of the plan file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseFile {
    pub name: String,
    pub root_password: SecretString,
    #[serde(default)]
    pub user: Option<DatabaseUserFile>,
}

/// Dedicated application user section
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseUserFile {
    pub name: String,
    pub password: SecretString,
}

/// PHP series version (major.minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeVersion {
    major: u16,
    minor: u16,
}

impl RuntimeVersion {
    /// Parse a version string; only `<major>.<minor>` with decimal digits
    /// on both sides is accepted.
    pub fn parse(input: &str) -> Result<Self, DeployError> {
        let invalid = || {
            DeployError::ValidationError(format!(
                "Invalid runtimeVersion '{}': expected <major>.<minor>, e.g. 8.2",
                input
            ))
        };

        let (major, minor) = input.split_once('.').ok_or_else(invalid)?;
        if major.is_empty()
            || minor.is_empty()
            || !major.bytes().all(|b| b.is_ascii_digit())
            || !minor.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }

    pub fn major(&self) -> u16 {
        self.major
    }

    pub fn minor(&self) -> u16 {
        self.minor
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Validated database options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub name: String,
    pub root_password: SecretString,
    pub user: Option<DatabaseUser>,
}

/// Validated dedicated database user
#[derive(Debug, Clone)]
pub struct DatabaseUser {
    pub name: String,
    pub password: SecretString,
}

/// Validated, immutable deployment plan
///
/// Fields are private: once constructed the plan can only be read.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    server_host: String,
    ssh_user: String,
    project_path: String,
    repo_url: String,
    repo_name: String,
    app_env: String,
    app_key: Option<SecretString>,
    runtime_version: RuntimeVersion,
    domain_name: String,
    database: Option<DatabaseOptions>,
    install_migrations: bool,
    issue_certificate: bool,
    certificate_email: Option<String>,
}

impl DeploymentPlan {
    /// Validate a raw plan file into a usable plan
    pub fn from_file(file: PlanFile) -> Result<Self, DeployError> {
        if file.server_host.trim().is_empty() {
            return Err(DeployError::ValidationError(
                "serverHost must not be empty".to_string(),
            ));
        }
        if file.ssh_user.trim().is_empty() {
            return Err(DeployError::ValidationError(
                "sshUser must not be empty".to_string(),
            ));
        }
        if !file.project_path.starts_with('/') {
            return Err(DeployError::ValidationError(format!(
                "projectPath '{}' must be an absolute path",
                file.project_path
            )));
        }

        let runtime_version = RuntimeVersion::parse(&file.runtime_version)?;
        let repo_name = derive_repo_name(&file.repo_url)?;

        if file.domain_name.is_empty()
            || !file
                .domain_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
            || file.domain_name.starts_with(['.', '-'])
        {
            return Err(DeployError::ValidationError(format!(
                "domainName '{}' is not a valid host name",
                file.domain_name
            )));
        }

        let database = match (file.create_database, file.database) {
            (false, _) => None,
            (true, None) => {
                return Err(DeployError::ValidationError(
                    "createDatabase is set but no database section was provided".to_string(),
                ));
            }
            (true, Some(db)) => {
                if !is_sql_identifier(&db.name) {
                    return Err(DeployError::ValidationError(format!(
                        "database.name '{}' must match [A-Za-z0-9_]{{1,64}}",
                        db.name
                    )));
                }
                let user = match db.user {
                    None => None,
                    Some(user) => {
                        if !is_sql_identifier(&user.name) {
                            return Err(DeployError::ValidationError(format!(
                                "database.user.name '{}' must match [A-Za-z0-9_]{{1,64}}",
                                user.name
                            )));
                        }
                        Some(DatabaseUser {
                            name: user.name,
                            password: user.password,
                        })
                    }
                };
                Some(DatabaseOptions {
                    name: db.name,
                    root_password: db.root_password,
                    user,
                })
            }
        };

        Ok(Self {
            server_host: file.server_host,
            ssh_user: file.ssh_user,
            project_path: normalize_path(&file.project_path),
            repo_url: file.repo_url,
            repo_name,
            app_env: file.app_env,
            app_key: file.app_key,
            runtime_version,
            domain_name: file.domain_name,
            database,
            install_migrations: file.install_migrations,
            issue_certificate: file.issue_certificate,
            certificate_email: file.certificate_email,
        })
    }

    pub fn server_host(&self) -> &str {
        &self.server_host
    }

    pub fn ssh_user(&self) -> &str {
        &self.ssh_user
    }

    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    /// Repository name derived from the clone URL
    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    /// Directory the repository is checked out into
    pub fn checkout_path(&self) -> String {
        format!("{}/{}", self.project_path, self.repo_name)
    }

    pub fn app_env(&self) -> &str {
        &self.app_env
    }

    pub fn app_key(&self) -> Option<&SecretString> {
        self.app_key.as_ref()
    }

    pub fn runtime_version(&self) -> &RuntimeVersion {
        &self.runtime_version
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    pub fn database(&self) -> Option<&DatabaseOptions> {
        self.database.as_ref()
    }

    pub fn install_migrations(&self) -> bool {
        self.install_migrations
    }

    pub fn issue_certificate(&self) -> bool {
        self.issue_certificate
    }

    pub fn certificate_email(&self) -> Option<&str> {
        self.certificate_email.as_deref()
    }
}

/// Derive the repository name from a clone URL: strip a trailing `.git`,
/// then take the last path segment. The authority never supplies the
/// name: scheme URLs must carry a path after the host, scp-like syntax
/// a segment after the `:`.
fn derive_repo_name(repo_url: &str) -> Result<String, DeployError> {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let without_suffix = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let name = match without_suffix.split_once("://") {
        Some((_, rest)) => match rest.split_once('/') {
            Some((_, path)) => path.rsplit('/').next().unwrap_or_default(),
            None => "",
        },
        None => without_suffix
            .rsplit_once([':', '/'])
            .map(|(_, name)| name)
            .unwrap_or_default(),
    };

    if name.is_empty() {
        return Err(DeployError::ValidationError(format!(
            "Cannot derive a repository name from repoUrl '{}'",
            repo_url
        )));
    }
    if name.starts_with(['.', '-'])
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
    {
        return Err(DeployError::ValidationError(format!(
            "Repository name '{}' derived from repoUrl is not filesystem-safe",
            name
        )));
    }

    Ok(name.to_string())
}

/// MySQL identifiers are restricted to word characters so they can be
/// embedded in statements without further escaping.
fn is_sql_identifier(s: &str) -> bool {
    !s.is_empty() && s.len() <= 64 && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn normalize_path(path: &str) -> String {
    let normalized = path.trim_end_matches('/');
    if normalized.is_empty() {
        "/".to_string()
    } else {
        normalized.to_string()
    }
}
