//
// Import gRPC stubs/definitions.
//
pub use coordinator::coordinator_server::{Coordinator, CoordinatorServer};
use coordinator::{
    CancelJobRequest, CancelJobResponse, JobStatusRequest, JobStatusResponse, JobSummary,
    JobsRequest, JobsResponse, SubmitJobRequest, SubmitJobResponse,
};
pub mod coordinator {
    tonic::include_proto!("coordinator");
}

pub mod worker {
    tonic::include_proto!("worker");
}
pub use worker::worker_client::WorkerClient;

use tonic::{Request, Response, Status};
use tracing::info;

use crate::orchestrator::Orchestrator;

/// gRPC front of the [`Orchestrator`].
#[derive(Clone)]
pub struct MRCoordinator {
    orchestrator: Orchestrator,
}

impl MRCoordinator {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

#[tonic::async_trait]
impl Coordinator for MRCoordinator {
    async fn submit_job(
        &self,
        request: Request<SubmitJobRequest>,
    ) -> Result<Response<SubmitJobResponse>, Status> {
        let request = request.into_inner();
        let handle = self
            .orchestrator
            .submit(&request.mapper, &request.reducer)
            .await?;

        Ok(Response::new(SubmitJobResponse {
            message: "Job started".to_string(),
            job_id: handle.id(),
            status_location: self.orchestrator.status_location(handle.id()),
        }))
    }

    async fn job_status(
        &self,
        request: Request<JobStatusRequest>,
    ) -> Result<Response<JobStatusResponse>, Status> {
        let view = self.orchestrator.status(request.into_inner().job_id).await?;

        Ok(Response::new(JobStatusResponse {
            job_id: view.id,
            status: view.phase.to_string(),
            output_files: view.output_files,
            error: view.error.unwrap_or_default(),
        }))
    }

    async fn jobs(&self, _: Request<JobsRequest>) -> Result<Response<JobsResponse>, Status> {
        let jobs = self
            .orchestrator
            .jobs()
            .await
            .iter()
            .map(|job| JobSummary {
                job_id: job.id(),
                mapper: job.mapper().to_string(),
                reducer: job.reducer().to_string(),
                status: job.phase().to_string(),
            })
            .collect();

        Ok(Response::new(JobsResponse { jobs }))
    }

    async fn cancel_job(
        &self,
        request: Request<CancelJobRequest>,
    ) -> Result<Response<CancelJobResponse>, Status> {
        let job_id = request.into_inner().job_id;
        info!("Cancel requested for job {job_id}");
        let cancelled = self.orchestrator.cancel(job_id).await;
        Ok(Response::new(CancelJobResponse { cancelled }))
    }
}
