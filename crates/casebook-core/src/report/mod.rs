mod azure;
mod error;
mod pipeline;
mod result;

pub use azure::{AzureDevOpsClient, AzureDetection};
pub use error::ReportError;
pub use pipeline::ReportingPipeline;
pub use result::{ReportedOutcome, ReportedResult};

use std::sync::Arc;

use async_trait::async_trait;

/// The remote test-run API results are reported to.
///
/// A run is created once, receives any number of result batches, and is
/// completed once. Transport and authentication are the implementation's
/// concern.
///
/// # Example
///
/// ```ignore
/// use casebook_core::report::{AzureDevOpsClient, RunClient};
///
/// let client = AzureDevOpsClient::new("https://dev.azure.com/org", "project", token);
/// let run_id = client.create_run("my-tests", "1234").await?;
/// client.submit_results(&run_id, &results).await?;
/// client.complete_run(&run_id).await?;
/// ```
#[async_trait]
pub trait RunClient: Send + Sync {
    /// Name of the remote service, used in console notices.
    fn service_name(&self) -> &str {
        "test run"
    }

    /// Create a run and return its identifier.
    async fn create_run(&self, run_name: &str, build_id: &str) -> Result<String, ReportError>;

    /// Submit one ordered batch of results.
    async fn submit_results(
        &self,
        run_id: &str,
        results: &[ReportedResult],
    ) -> Result<(), ReportError>;

    /// Mark the run as completed.
    async fn complete_run(&self, run_id: &str) -> Result<(), ReportError>;
}

/// Blanket implementation for boxed trait objects.
#[async_trait]
impl RunClient for Box<dyn RunClient> {
    fn service_name(&self) -> &str {
        (**self).service_name()
    }

    async fn create_run(&self, run_name: &str, build_id: &str) -> Result<String, ReportError> {
        (**self).create_run(run_name, build_id).await
    }

    async fn submit_results(
        &self,
        run_id: &str,
        results: &[ReportedResult],
    ) -> Result<(), ReportError> {
        (**self).submit_results(run_id, results).await
    }

    async fn complete_run(&self, run_id: &str) -> Result<(), ReportError> {
        (**self).complete_run(run_id).await
    }
}

/// Shared clients, so a caller can keep a handle to the client it gave away.
#[async_trait]
impl<C: RunClient + ?Sized> RunClient for Arc<C> {
    fn service_name(&self) -> &str {
        (**self).service_name()
    }

    async fn create_run(&self, run_name: &str, build_id: &str) -> Result<String, ReportError> {
        (**self).create_run(run_name, build_id).await
    }

    async fn submit_results(
        &self,
        run_id: &str,
        results: &[ReportedResult],
    ) -> Result<(), ReportError> {
        (**self).submit_results(run_id, results).await
    }

    async fn complete_run(&self, run_id: &str) -> Result<(), ReportError> {
        (**self).complete_run(run_id).await
    }
}
