use clap::Parser;
use clerk_consul::ConsulRegistry;
use clerk_core::Registry;
use clerk_docker::DockerCli;
use clerk_server::{Server, Settings, status, telemetry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "clerk")]
#[command(about = "Registers running containers with Consul", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    telemetry::init_tracing();
    let metrics = telemetry::install_metrics();

    let registry = match ConsulRegistry::new(cli.settings.consul()) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("invalid consul configuration: {}", e);
            std::process::exit(1);
        }
    };
    match registry.ping().await {
        Ok(leader) => info!("connected to {}, leader {}", registry.id(), leader),
        Err(e) => warn!("{} not reachable yet: {}", registry.id(), e),
    }

    let docker = DockerCli::new(cli.settings.docker());
    match docker.version().await {
        Ok(version) => info!("docker server version {}", version),
        Err(e) => warn!("docker not reachable yet: {}", e),
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server = match Server::new(
        Arc::new(docker),
        registry,
        cli.settings.server_options(),
        shutdown.clone(),
    )
    .await
    {
        Ok(server) => server,
        Err(e) => {
            error!("error subscribing to docker events: {}", e);
            std::process::exit(1);
        }
    };

    let status = cli.settings.http_addr.map(|addr| {
        tokio::spawn(status::serve(addr, server.tracker(), metrics, shutdown.clone()))
    });

    server.start().await;

    if let Some(status) = status {
        if let Err(e) = status.await {
            error!("status task failed: {}", e);
        }
    }
    info!("clerk stopped");
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, starting graceful shutdown");
    shutdown.cancel();
}
