//! Docker engine access through the `docker` CLI.
//!
//! Every invocation goes through [`DockerCli::run`], which applies the configured
//! timeout and maps failures to [`DockerError`]. The event subscription is the one
//! long-lived child process and is not subject to the timeout.

use async_trait::async_trait;
use clerk_core::{ContainerDetails, ContainerId, ContainerRuntime, EventStream, RuntimeError};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::DockerError;
use crate::events::pump;
use crate::inspect::parse_inspect;

pub const DEFAULT_BINARY: &str = "docker";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct DockerConfig {
    pub binary: String,
    pub timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DockerCli {
    config: DockerConfig,
}

impl DockerCli {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    fn command_line(&self, args: &[&str]) -> String {
        format!("{} {}", self.config.binary, args.join(" "))
    }

    async fn run(&self, args: &[&str]) -> Result<Output, DockerError> {
        let cmd_str = self.command_line(args);
        let result = tokio::time::timeout(
            self.config.timeout,
            Command::new(&self.config.binary)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(DockerError::exec_failed(cmd_str, e)),
            Err(_) => Err(DockerError::timeout(cmd_str, self.config.timeout)),
        }
    }

    async fn run_success(&self, args: &[&str]) -> Result<Output, DockerError> {
        let output = self.run(args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(DockerError::failed(self.command_line(args), &output))
        }
    }

    /// Verifies the daemon answers; used once at startup.
    pub async fn version(&self) -> Result<String, DockerError> {
        let output = self
            .run_success(&["version", "--format", "{{.Server.Version}}"])
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn running_ids(&self) -> Result<Vec<ContainerId>, DockerError> {
        let output = self.run_success(&["ps", "-q", "--no-trunc"]).await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ContainerId::from)
            .collect())
    }

    pub async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, DockerError> {
        let args = ["inspect", "--type", "container", id.as_str()];
        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No such container") || stderr.contains("No such object") {
                return Err(DockerError::ContainerNotFound(id.to_string()));
            }
            return Err(DockerError::failed(self.command_line(&args), &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_inspect(&stdout)
            .map_err(|e| DockerError::decode(self.command_line(&args), e))?
            .ok_or_else(|| DockerError::ContainerNotFound(id.to_string()))
    }

    /// Spawns `docker events` filtered to containers and streams its output.
    pub fn subscribe(&self) -> Result<EventStream, DockerError> {
        let args = ["events", "--filter", "type=container", "--format", "{{json .}}"];
        let cmd_str = self.command_line(&args);
        let mut child = Command::new(&self.config.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DockerError::exec_failed(&cmd_str, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DockerError::decode(&cmd_str, "stdout not captured"))?;

        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (errors_tx, errors) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(pump(child, stdout, events_tx, errors_tx));
        info!("subscribed to docker events");

        Ok(EventStream { events, errors })
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new(DockerConfig::default())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn events(&self) -> Result<EventStream, RuntimeError> {
        Ok(self.subscribe()?)
    }

    async fn list_containers(&self) -> Result<Vec<ContainerId>, RuntimeError> {
        Ok(self.running_ids().await?)
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerDetails, RuntimeError> {
        Ok(self.inspect_container(id).await?)
    }
}
