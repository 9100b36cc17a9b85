use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tonic::transport::Server;
use tracing::info;

use common::minio::{self, S3Store};
use mr_coordinator::{CoordinatorServer, MRCoordinator, Orchestrator};

mod args;
use args::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Retrieve server configuration from command line.
    // Note: There are default values for EACH argument.
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let config = args.coordinator_config();

    // Create minio client config from cli arguments and retrieve minio client.
    let client = minio::Client::from_conf(minio::ClientConfig {
        access_key_id: args.access_key_id,
        secret_access_key: args.secret_access_key,
        region: args.region,
        url: args.minio_url,
    });
    client.ensure_bucket(&args.bucket).await?;
    let store = Arc::new(S3Store::new(client, args.bucket));

    info!(
        "{} map workers, {} reduce workers, inputs `{}`",
        config.map_workers.len(),
        config.reduce_workers.len(),
        config.input_glob
    );
    info!(
        "Mappers: {}; reducers: {}",
        workload::mapper_names().collect::<Vec<_>>().join(", "),
        workload::reducer_names().collect::<Vec<_>>().join(", ")
    );
    let orchestrator = Orchestrator::new(config, store)?;
    tokio::spawn(orchestrator.clone().run());

    info!("CoordinatorServer listening on {}", addr);
    Server::builder()
        .add_service(CoordinatorServer::new(MRCoordinator::new(orchestrator)))
        .serve_with_shutdown(addr, async {
            let _ = signal::ctrl_c().await;
            info!("Coordinator server exited...");
        })
        .await?;

    Ok(())
}
