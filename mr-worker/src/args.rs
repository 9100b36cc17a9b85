use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The port to run the worker on.
    #[arg(short, long)]
    pub port: u16,

    /// The interface to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Address the coordinator lists this worker under. Defaults to
    /// `host:port`.
    #[arg(long)]
    pub advertise: Option<String>,

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
}
