mod args;
use args::{parse_args, Commands};

mod core;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();
    let addr = args.coordinator.as_str();

    match args.command {
        Commands::Jobs => core::jobs(addr).await?,
        Commands::Status { job } => core::status(addr, job).await?,
        Commands::Submit { mapper, reducer } => core::submit(addr, mapper, reducer).await?,
        Commands::Cancel { job } => core::cancel(addr, job).await?,
    }

    Ok(())
}
