//! Remote execution

pub mod script;
pub mod ssh;

use async_trait::async_trait;
use base64::Engine;

use crate::errors::DeployError;

use script::{Pipeline, RemoteScript, ShellCommand};

/// Captured output of a remote script
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Transport seam between the pipeline and the target host.
///
/// `run` fails only on transport problems (unreachable host, auth,
/// timeout); a non-zero remote exit comes back as a normal output so
/// callers can use exit codes as queries.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, script: &RemoteScript) -> Result<CommandOutput, DeployError>;

    /// Like `run`, but a non-zero exit becomes an error carrying the
    /// masked command text, exit code and stderr.
    async fn run_checked(&self, script: &RemoteScript) -> Result<CommandOutput, DeployError> {
        let output = self.run(script).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(DeployError::RemoteCommandError {
                command: script.summary(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim_end().to_string(),
            })
        }
    }
}

/// Read a remote file's contents
pub async fn read_file(exec: &dyn RemoteExecutor, path: &str) -> Result<String, DeployError> {
    let output = exec
        .run_checked(&ShellCommand::new("cat").arg(path).into())
        .await?;
    Ok(output.stdout)
}

/// Ensure a remote directory exists and is owned by the given user.
/// `install -d` creates missing parents and is safe to repeat.
pub async fn ensure_dir(
    exec: &dyn RemoteExecutor,
    path: &str,
    owner: &str,
) -> Result<(), DeployError> {
    let cmd = ShellCommand::new("install")
        .args(["-d", "-o", owner, path])
        .sudo();
    exec.run_checked(&cmd.into()).await?;
    Ok(())
}

/// Ownership of a written remote file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAs {
    User,
    Root,
}

/// Write a remote file by piping a locally base64-encoded payload through
/// `base64 -d`, so the file body never needs shell quoting. Root-owned
/// paths go through `sudo tee`. The payload is treated as secret: file
/// bodies can carry credentials and must not surface in logs or errors.
pub async fn write_file(
    exec: &dyn RemoteExecutor,
    path: &str,
    contents: &str,
    write_as: WriteAs,
) -> Result<(), DeployError> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(contents.as_bytes());
    let decode = Pipeline::new(ShellCommand::new("printf").arg("%s").secret_arg(encoded))
        .pipe(ShellCommand::new("base64").arg("-d"));
    let line = match write_as {
        WriteAs::User => decode.to_file(path),
        WriteAs::Root => decode
            .pipe(ShellCommand::new("tee").arg(path).sudo())
            .to_null(),
    };
    exec.run_checked(&line.into()).await?;
    Ok(())
}
