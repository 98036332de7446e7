use clap::{Parser, Subcommand};
use clerk_consul::{ConsulRegistry, service_check};
use clerk_core::{ContainerId, ContainerRuntime, Registry, Service};
use clerk_docker::DockerCli;
use clerk_server::{Registrar, Settings, SyncEngine, telemetry, tracker};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "clerkctl")]
#[command(about = "Clerk administrative CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that Consul and Docker are reachable
    Ping,
    /// List services registered with the local Consul agent
    Services,
    /// Show the service clerk derives from a container
    Inspect {
        /// Container ID or name
        container: String,
    },
    /// Run one synchronisation pass and exit
    Sync,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let registry = Arc::new(ConsulRegistry::new(cli.settings.consul())?);
    let docker = Arc::new(DockerCli::new(cli.settings.docker()));

    match cli.command {
        Commands::Ping => {
            let leader = registry.ping().await?;
            println!("{:<10} leader {}", registry.id(), leader);
            let version = docker.version().await?;
            println!("{:<10} server {}", "docker", version);
        }
        Commands::Services => {
            let mut services = registry.services().await?;
            services.sort_by(|a, b| a.id.cmp(&b.id));

            println!("Registered Services:");
            println!("{:<40} {:<20} {:<22} {:<30}", "ID", "Name", "Address", "Tags");
            println!("{}", "-".repeat(112));
            for svc in services {
                println!(
                    "{:<40} {:<20} {:<22} {:<30}",
                    svc.id,
                    svc.name,
                    format!("{}:{}", svc.address, svc.port),
                    svc.tags.join(",")
                );
            }
        }
        Commands::Inspect { container } => {
            let details = docker.inspect(&ContainerId::new(container)).await?;
            let service = Service::derive(&details, &cli.settings.schema());
            print_service(&service);
        }
        Commands::Sync => {
            telemetry::init_tracing();

            let stop = CancellationToken::new();
            let (tracker, tracker_task) = tracker::spawn(stop.clone());
            let options = cli.settings.server_options();
            let registrar = Registrar::new(docker.clone(), registry, tracker, options.schema);
            let engine = SyncEngine::new(registrar, options.max_concurrent_registrations);

            let containers = docker.list_containers().await?;
            let report = engine.synchronise(&containers).await;
            stop.cancel();
            tracker_task.await?;
            let report = report?;

            println!("Synchronisation Report");
            println!("{}", "=".repeat(25));
            println!("Live containers: {}", report.live);
            println!("Unknown:         {}", report.unknown);
            println!("Drifted:         {}", report.drifted);
            println!("Registered:      {}", report.registered);
            println!("Failed:          {}", report.failed);
        }
    }

    Ok(())
}

fn print_service(service: &Service) {
    println!("Container:  {}", service.container_id());
    println!("Name:       {}", service.name());
    println!(
        "Service ID: {}",
        service.id().map(|id| id.as_str()).unwrap_or("-")
    );
    println!("Tags:       {}", service.tags().join(","));
    println!("Eligible:   {}", service.should_register());

    if !service.attributes().is_empty() {
        println!("Attributes:");
        for (key, value) in service.attributes() {
            println!("  {} = {}", key, value);
        }
    }

    println!("Instances:");
    println!("  {:<45} {:<22} {:<6} {:<10}", "ID", "Address", "Proto", "Check");
    for instance in service.instances() {
        let check = match service_check(service.config(), instance) {
            Some(check) => check.kind().to_string(),
            None => "-".to_string(),
        };
        println!(
            "  {:<45} {:<22} {:<6} {:<10}",
            instance.id,
            instance.socket_addr(),
            instance.protocol,
            check
        );
    }

    for skipped in service.skipped() {
        println!("Skipped:    {}", skipped);
    }
}
