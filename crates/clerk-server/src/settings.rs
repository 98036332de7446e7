use clap::Args;
use clerk_consul::ConsulConfig;
use clerk_core::LabelSchema;
use clerk_core::labels::DEFAULT_PREFIX;
use clerk_docker::DockerConfig;
use std::net::SocketAddr;
use std::time::Duration;

use crate::server::ServerOptions;

/// Settings shared by `clerk` and `clerkctl`. Every flag can come from the environment.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Label prefix that marks clerk configuration
    #[arg(long, env = "CLERK_LABEL_PREFIX", default_value = DEFAULT_PREFIX)]
    pub label_prefix: String,

    /// Seconds between synchronisation passes
    #[arg(long, env = "CLERK_SYNC_INTERVAL_SECS", default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    pub sync_interval_secs: u64,

    /// Upper bound on concurrent registrations during a synchronisation pass
    #[arg(long, env = "CLERK_MAX_CONCURRENT_REGISTRATIONS", default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_concurrent_registrations: u32,

    /// Address for the /health, /metrics and /services endpoints
    #[arg(long, env = "CLERK_HTTP_ADDR")]
    pub http_addr: Option<SocketAddr>,

    #[arg(long, env = "CONSUL_HTTP_ADDR", default_value = clerk_consul::consul::DEFAULT_ADDRESS)]
    pub consul_addr: String,

    #[arg(long, env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    pub consul_token: Option<String>,

    #[arg(long, env = "DOCKER_BIN", default_value = clerk_docker::client::DEFAULT_BINARY)]
    pub docker_bin: String,

    /// Timeout for docker list and inspect commands, in seconds
    #[arg(long, env = "CLERK_DOCKER_TIMEOUT_SECS", default_value_t = 10)]
    pub docker_timeout_secs: u64,
}

impl Settings {
    pub fn schema(&self) -> LabelSchema {
        LabelSchema::new(self.label_prefix.clone())
    }

    pub fn consul(&self) -> ConsulConfig {
        ConsulConfig {
            address: self.consul_addr.clone(),
            token: self.consul_token.clone().filter(|t| !t.is_empty()),
        }
    }

    pub fn docker(&self) -> DockerConfig {
        DockerConfig {
            binary: self.docker_bin.clone(),
            timeout: Duration::from_secs(self.docker_timeout_secs),
        }
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            schema: self.schema(),
            sync_interval: Duration::from_secs(self.sync_interval_secs),
            max_concurrent_registrations: self.max_concurrent_registrations as usize,
        }
    }
}
