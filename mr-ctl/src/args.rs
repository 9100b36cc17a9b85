use clap::{Parser, Subcommand};

//
// For parsing user specified command.
//
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Address of the coordinator.
    #[arg(short, long, default_value = "http://127.0.0.1:8030")]
    pub coordinator: String,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all jobs which have been submitted to the system and their statuses.
    Jobs,
    /// Show the status of a job and, once it completed, its output files.
    Status {
        /// Job id. Defaults to the latest job.
        job: Option<u64>,
    },
    /// Submit a job to the cluster.
    Submit {
        /// Name of the map function.
        #[arg(short, long)]
        mapper: String,

        /// Name of the reduce function.
        #[arg(short, long)]
        reducer: String,
    },
    /// Cancel a queued or running job.
    Cancel {
        job: u64,
    },
}

/// Parse the user command.
/// Can be 1 of 4:
/// - submit
/// - status
/// - jobs
/// - cancel
pub fn parse_args() -> Args {
    Args::parse()
}
