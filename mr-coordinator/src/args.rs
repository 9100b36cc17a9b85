use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use mr_coordinator::{CoordinatorConfig, ErrorPolicy, PollPolicy};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The port for the server to run on.
    #[arg(short, long, default_value = "8030")]
    pub port: u16,

    /// The interface to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Minio access key / user ID.
    #[arg(short, long, default_value = "robert")]
    pub access_key_id: String,

    /// Minio secret key / password.
    #[arg(short, long, default_value = "robertisawesome")]
    pub secret_access_key: String,

    /// Minio region.
    #[arg(short, long, default_value = "us-east-1")]
    pub region: String,

    #[arg(short, long, default_value = "http://127.0.0.1:9000")]
    pub minio_url: String,

    /// Bucket holding intermediate partitions.
    #[arg(short, long, default_value = "mr-intermediate")]
    pub bucket: String,

    /// Map worker addresses, bound to input shards by position.
    #[arg(long, value_delimiter = ',', default_value = "127.0.0.1:7001,127.0.0.1:7002,127.0.0.1:7003")]
    pub map_workers: Vec<String>,

    /// Reduce worker addresses. One partition per reducer.
    #[arg(long, value_delimiter = ',', default_value = "127.0.0.1:7004,127.0.0.1:7005")]
    pub reduce_workers: Vec<String>,

    /// Glob selecting the input shards.
    #[arg(short, long, default_value = "data/parts/*.txt")]
    pub inputs: String,

    /// Directory the reducers write their output into.
    #[arg(short, long, default_value = "public")]
    pub output_dir: PathBuf,

    /// Seconds between completion polls.
    #[arg(long, default_value = "5")]
    pub poll_interval: u64,

    /// Backoff factor applied after each unsuccessful poll.
    #[arg(long, default_value = "1.0")]
    pub poll_multiplier: f64,

    /// Upper bound on the poll interval, in seconds.
    #[arg(long, default_value = "60")]
    pub poll_max: u64,

    /// Fail a phase that is not complete after this many seconds.
    #[arg(long)]
    pub phase_timeout: Option<u64>,

    /// Attempts per task dispatch.
    #[arg(long, default_value = "3")]
    pub dispatch_attempts: u32,

    /// Seconds a cancelled or failed job waits for its workers to go quiet.
    #[arg(long, default_value = "300")]
    pub drain_timeout: u64,

    /// What a worker's ERROR status does to the job.
    #[arg(long, value_enum, default_value_t = ErrorPolicy::Fail)]
    pub error_policy: ErrorPolicy,

    /// Keep intermediate partitions after a job ends.
    #[arg(long)]
    pub keep_intermediate: bool,

    /// Address clients reach the coordinator on, reported with submitted
    /// jobs. Defaults to `http://host:port`.
    #[arg(long)]
    pub advertise: Option<String>,
}

impl Args {
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let mut config = CoordinatorConfig::new(self.map_workers.clone(), self.reduce_workers.clone());
        config.input_glob = self.inputs.clone();
        config.output_dir = self.output_dir.clone();
        config.advertise_url = self
            .advertise
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port));
        config.poll = PollPolicy {
            interval: Duration::from_secs(self.poll_interval),
            multiplier: self.poll_multiplier,
            max_interval: Duration::from_secs(self.poll_max),
            phase_timeout: self.phase_timeout.map(Duration::from_secs),
        };
        config.dispatch_attempts = self.dispatch_attempts;
        config.drain_timeout = Duration::from_secs(self.drain_timeout);
        config.error_policy = self.error_policy;
        config.keep_intermediate = self.keep_intermediate;
        config
    }
}
