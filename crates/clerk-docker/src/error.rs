use clerk_core::{ContainerId, RuntimeError};
use std::time::Duration;
use thiserror::Error;

/// Failures of a single `docker` invocation.
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Timed out running '{command}' (exceeded {} seconds)", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("'{command}' failed (exit code {exit_code:?}): {stderr}")]
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("Failed to execute '{command}': {source}")]
    ExecFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No such container: {0}")]
    ContainerNotFound(String),

    #[error("Unexpected output from '{command}': {reason}")]
    Decode { command: String, reason: String },
}

impl DockerError {
    pub fn timeout(cmd: impl Into<String>, dur: Duration) -> Self {
        DockerError::Timeout {
            command: cmd.into(),
            timeout: dur,
        }
    }

    pub fn failed(cmd: impl Into<String>, output: &std::process::Output) -> Self {
        DockerError::CommandFailed {
            command: cmd.into(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        }
    }

    pub fn exec_failed(cmd: impl Into<String>, err: std::io::Error) -> Self {
        DockerError::ExecFailed {
            command: cmd.into(),
            source: err,
        }
    }

    pub fn decode(cmd: impl Into<String>, reason: impl ToString) -> Self {
        DockerError::Decode {
            command: cmd.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<DockerError> for RuntimeError {
    fn from(err: DockerError) -> Self {
        match err {
            DockerError::ContainerNotFound(id) => RuntimeError::ContainerNotFound(ContainerId::new(id)),
            DockerError::Timeout { .. } => RuntimeError::Timeout(err.to_string()),
            DockerError::Decode { .. } => RuntimeError::Decode(err.to_string()),
            DockerError::CommandFailed { .. } | DockerError::ExecFailed { .. } => {
                RuntimeError::Transport(err.to_string())
            }
        }
    }
}
