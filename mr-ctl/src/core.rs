//
// Import gRPC stubs/definitions.
//
use crate::core::coordinator::coordinator_client::CoordinatorClient;
use crate::core::coordinator::{CancelJobRequest, JobStatusRequest, JobsRequest, SubmitJobRequest};

pub mod coordinator {
    tonic::include_proto!("coordinator");
}

use tonic::transport::Channel;

async fn connect(addr: &str) -> Result<CoordinatorClient<Channel>, Box<dyn std::error::Error>> {
    Ok(CoordinatorClient::connect(addr.to_string()).await?)
}

pub async fn jobs(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = connect(addr).await?;
    let request = tonic::Request::new(JobsRequest {});
    let jobs = client.jobs(request).await?.into_inner().jobs;

    println!("[Jobs]");
    if jobs.is_empty() {
        println!("No jobs submitted");
    }
    for job in jobs {
        println!(
            "{:>4}  {:<18} mapper={} reducer={}",
            job.job_id, job.status, job.mapper, job.reducer
        );
    }

    Ok(())
}

pub async fn submit(addr: &str, mapper: String, reducer: String) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = connect(addr).await?;
    let request = tonic::Request::new(SubmitJobRequest { mapper, reducer });
    let response = client.submit_job(request).await?.into_inner();

    println!("{} (job {})", response.message, response.job_id);
    println!("Check progress with: {}", response.status_location);

    Ok(())
}

pub async fn status(addr: &str, job_id: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = connect(addr).await?;
    let request = tonic::Request::new(JobStatusRequest { job_id });
    let response = client.job_status(request).await?.into_inner();

    println!("[Status]");
    println!("Job {}: {}", response.job_id, response.status);
    if !response.error.is_empty() {
        println!("Error: {}", response.error);
    }
    for file in response.output_files {
        println!("{}", file);
    }

    Ok(())
}

pub async fn cancel(addr: &str, job_id: u64) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = connect(addr).await?;
    let request = tonic::Request::new(CancelJobRequest { job_id });
    let cancelled = client.cancel_job(request).await?.into_inner().cancelled;

    if cancelled {
        println!("Job {} cancelled", job_id);
    } else {
        println!("Job {} is unknown or already finished", job_id);
    }

    Ok(())
}
