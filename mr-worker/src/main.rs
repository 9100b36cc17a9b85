use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tonic::transport::Server;
use tracing::info;

use common::minio::{self, S3Store};
use mr_worker::{MRWorker, WorkerServer};

mod args;
use args::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let identity = args.advertise.unwrap_or_else(|| addr.to_string());

    let client = minio::Client::from_conf(minio::ClientConfig {
        access_key_id: args.access_key_id,
        secret_access_key: args.secret_access_key,
        region: args.region,
        url: args.minio_url,
    });
    let store = Arc::new(S3Store::new(client, args.bucket));

    let worker = MRWorker::new(identity.clone(), store);
    info!("Worker {} listening on {}", identity, addr);

    Server::builder()
        .add_service(WorkerServer::new(worker))
        .serve_with_shutdown(addr, async {
            let _ = signal::ctrl_c().await;
            info!("Worker server exited...");
        })
        .await?;

    Ok(())
}
