//! SSH transport
//!
//! Scripts run by spawning the system `ssh` binary, one process per call.
//! No connection reuse or multiplexing; a run is a session.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::DeployError;

use super::script::RemoteScript;
use super::{CommandOutput, RemoteExecutor};

/// ssh reserves exit code 255 for its own failures (unreachable host,
/// refused key, handshake errors), distinct from remote command exits.
const SSH_TRANSPORT_EXIT: i32 = 255;

/// Connection settings for the target host
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
}

/// Transport tuning
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// TCP connect timeout handed to ssh
    pub connect_timeout: Duration,

    /// Wall-clock budget per command; the ssh process is killed on expiry
    pub command_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(600),
        }
    }
}

/// Executor backed by the system ssh client
#[derive(Debug, Clone)]
pub struct SshExecutor {
    target: SshTarget,
    options: SshOptions,
}

impl SshExecutor {
    pub fn new(target: SshTarget, options: SshOptions) -> Self {
        Self { target, options }
    }

    fn command(&self, script: &RemoteScript) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.options.connect_timeout.as_secs()
            ))
            .arg("-p")
            .arg(self.target.port.to_string());
        if let Some(identity) = &self.target.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.arg(format!("{}@{}", self.target.user, self.target.host))
            .arg(script.render());
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, script: &RemoteScript) -> Result<CommandOutput, DeployError> {
        debug!("Running on {}: {}", self.target.host, script.summary());

        let mut cmd = self.command(script);
        let result = tokio::time::timeout(self.options.command_timeout, cmd.output()).await;

        let output = match result {
            Err(_) => {
                warn!(
                    "Command timed out after {}s: {}",
                    self.options.command_timeout.as_secs(),
                    script.summary()
                );
                return Err(DeployError::TimeoutError {
                    command: script.summary(),
                    seconds: self.options.command_timeout.as_secs(),
                });
            }
            Ok(Err(e)) => {
                return Err(DeployError::ConnectionError(format!(
                    "Failed to launch ssh: {}",
                    e
                )));
            }
            Ok(Ok(output)) => output,
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if exit_code == SSH_TRANSPORT_EXIT {
            return Err(DeployError::ConnectionError(format!(
                "ssh to {}@{} failed: {}",
                self.target.user,
                self.target.host,
                stderr.trim()
            )));
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}
