use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ReportError, ReportedResult, RunClient};
use crate::config::AZURE_DEVOPS_API_VERSION;
use crate::console::Console;

/// Azure DevOps test-run API client.
///
/// Runs are identified by the run URL returned from run creation; results
/// and completion are sent relative to that URL.
pub struct AzureDevOpsClient {
    collection_uri: String,
    project: String,
    access_token: String,
    client: Client,
}

/// A client built from the pipeline environment, plus the build to attach
/// the run to.
pub struct AzureDetection {
    pub client: AzureDevOpsClient,
    pub build_id: String,
}

impl AzureDevOpsClient {
    /// Creates a new client.
    ///
    /// # Arguments
    /// * `collection_uri` - The organization/collection URL (e.g., "https://dev.azure.com/org")
    /// * `project` - The team project name
    /// * `access_token` - Bearer token, usually `$(System.AccessToken)`
    pub fn new(
        collection_uri: impl Into<String>,
        project: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            collection_uri: collection_uri.into().trim_end_matches('/').to_string(),
            project: project.into(),
            access_token: access_token.into(),
            client: Client::new(),
        }
    }

    /// Detects an Azure Pipelines build from the process environment.
    pub fn from_env(console: &Console) -> Option<AzureDetection> {
        Self::detect(|name| std::env::var(name).ok(), console)
    }

    /// Detects an Azure Pipelines build using `lookup` for variables.
    ///
    /// Returns `None` outside Azure Pipelines. Inside, every missing variable
    /// is explained on the console before giving up.
    pub fn detect<F>(lookup: F, console: &Console) -> Option<AzureDetection>
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup("TF_BUILD").as_deref() != Some("True") {
            return None;
        }

        let token_available = lookup("SYSTEM_ACCESSTOKEN").is_some_and(|t| !t.is_empty());
        if !token_available {
            console.lines([
                "The Azure DevOps access token has not been made available to this process, so",
                "test results will not be collected. To resolve this issue, review your pipeline",
                "definition to ensure that the access token is made available as the environment",
                "variable SYSTEM_ACCESSTOKEN.",
                "",
                "From https://docs.microsoft.com/en-us/azure/devops/pipelines/build/variables#systemaccesstoken",
                "",
                "  env:",
                "    SYSTEM_ACCESSTOKEN: $(System.AccessToken)",
                "",
            ]);
            return None;
        }

        let require = |name: &str| {
            let value = lookup(name).filter(|v| !v.is_empty());
            if value.is_none() {
                console.lines([
                    format!("The Azure DevOps environment variable '{}' has not been made", name),
                    "available to this process, so test results will not be collected.".to_string(),
                    String::new(),
                ]);
            }
            value
        };

        let collection_uri = require("SYSTEM_TEAMFOUNDATIONCOLLECTIONURI")?;
        let project = require("SYSTEM_TEAMPROJECT")?;
        let access_token = require("SYSTEM_ACCESSTOKEN")?;
        let build_id = require("BUILD_BUILDID")?;

        Some(AzureDetection {
            client: Self::new(collection_uri, project, access_token),
            build_id,
        })
    }

    fn runs_url(&self) -> String {
        format!(
            "{}/{}/_apis/test/runs?api-version={}",
            self.collection_uri, self.project, AZURE_DEVOPS_API_VERSION
        )
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        content: &T,
    ) -> Result<String, ReportError> {
        debug!(%method, url, "sending Azure DevOps request");

        let response = self
            .client
            .request(method.clone(), url)
            .header("accept", "application/json")
            .header("authorization", format!("Bearer {}", self.access_token))
            .json(content)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ReportError::ApiError {
                status: status.as_u16(),
                message: format!(
                    "failed to {} {}: {} {}",
                    method,
                    url,
                    status.canonical_reason().unwrap_or_default(),
                    body
                ),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl RunClient for AzureDevOpsClient {
    fn service_name(&self) -> &str {
        "Azure DevOps"
    }

    async fn create_run(&self, run_name: &str, build_id: &str) -> Result<String, ReportError> {
        let request = CreateRun {
            name: run_name,
            build: BuildDetail { id: build_id },
            is_automated: true,
        };

        let body = self.send(Method::POST, &self.runs_url(), &request).await?;

        let run: TestRun =
            serde_json::from_str(&body).map_err(|e| ReportError::ParseError(e.to_string()))?;

        run.url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ReportError::ParseError("test run response has no url".to_string()))
    }

    async fn submit_results(
        &self,
        run_id: &str,
        results: &[ReportedResult],
    ) -> Result<(), ReportError> {
        let url = format!("{}/results?api-version={}", run_id, AZURE_DEVOPS_API_VERSION);
        self.send(Method::POST, &url, results).await?;
        Ok(())
    }

    async fn complete_run(&self, run_id: &str) -> Result<(), ReportError> {
        let url = format!("{}?api-version={}", run_id, AZURE_DEVOPS_API_VERSION);
        self.send(Method::PATCH, &url, &CompleteRun { state: "Completed" })
            .await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRun<'a> {
    name: &'a str,
    build: BuildDetail<'a>,
    is_automated: bool,
}

#[derive(Debug, Serialize)]
struct BuildDetail<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct CompleteRun {
    state: &'static str,
}

#[derive(Debug, Deserialize)]
struct TestRun {
    url: Option<String>,
}
