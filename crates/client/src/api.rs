//! REST client for the analysis backend.
//!
//! [`JobApi`] is the narrow interface the tracker polls through (status,
//! results, start analysis). [`HttpJobApi`] implements it with
//! [`reqwest`] and additionally wraps the two submission endpoints that
//! create new jobs.

use async_trait::async_trait;
use auditwatch_core::{AnalysisOptions, AnalysisResults, Job, JobId, JobStatus};
use serde::{Deserialize, Serialize};

/// Endpoints the tracker depends on.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// `GET /status/{job_id}`: the authoritative job status.
    async fn status(&self, job_id: &JobId) -> Result<JobStatus, ApiError>;

    /// `GET /results/{job_id}`: results of a completed job.
    async fn results(&self, job_id: &JobId) -> Result<AnalysisResults, ApiError>;

    /// `POST /analyze`: start the pipeline for a submitted job.
    async fn start_analysis(
        &self,
        job_id: &JobId,
        options: &AnalysisOptions,
    ) -> Result<(), ApiError>;
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Response of the submission endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: JobStatus,
}

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    results: AnalysisResults,
}

#[derive(Debug, Serialize)]
struct FetchContractRequest<'a> {
    network: &'a str,
    address: &'a str,
}

/// Body of `POST /analyze`: the job id with the options flattened in.
#[derive(Debug, Serialize)]
struct StartAnalysisRequest<'a> {
    job_id: &'a JobId,
    #[serde(flatten)]
    options: &'a AnalysisOptions,
    /// Older backends only understand this flag.
    export_markdown: bool,
}

impl<'a> StartAnalysisRequest<'a> {
    fn new(job_id: &'a JobId, options: &'a AnalysisOptions) -> Self {
        Self {
            job_id,
            options,
            export_markdown: options.export_format.is_some(),
        }
    }
}

/// HTTP client for the analysis backend.
pub struct HttpJobApi {
    client: reqwest::Client,
    api_url: String,
}

impl HttpJobApi {
    /// * `api_url` - Base URL, e.g. `http://host:3000/api`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling, custom
    /// timeouts).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Upload a contract source file as a new job.
    ///
    /// Sends a multipart `POST /upload-contract` with a single `file` part.
    pub async fn upload_contract(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<Job, ApiError> {
        let part = reqwest::multipart::Part::bytes(contents).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("upload-contract"))
            .multipart(form)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        tracing::info!(job_id = %submitted.job_id, file_name, "Contract uploaded");
        Ok(Job::new(submitted.job_id, file_name, submitted.status))
    }

    /// Ask the backend to retrieve a deployed contract by address.
    ///
    /// The returned job is usually `fetching`; a `contract_fetched` push
    /// event (or the poll loop) moves it on.
    pub async fn fetch_contract(&self, network: &str, address: &str) -> Result<Job, ApiError> {
        let response = self
            .client
            .post(self.url("fetch-contract"))
            .json(&FetchContractRequest { network, address })
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        tracing::info!(job_id = %submitted.job_id, network, address, "Contract fetch requested");
        Ok(Job::new(submitted.job_id, address, submitted.status))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`ApiError::Status`] with the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn status(&self, job_id: &JobId) -> Result<JobStatus, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("status/{job_id}")))
            .send()
            .await?;

        let body: StatusResponse = Self::parse_response(response).await?;
        Ok(body.status)
    }

    async fn results(&self, job_id: &JobId) -> Result<AnalysisResults, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("results/{job_id}")))
            .send()
            .await?;

        let body: ResultsResponse = Self::parse_response(response).await?;
        Ok(body.results)
    }

    async fn start_analysis(
        &self,
        job_id: &JobId,
        options: &AnalysisOptions,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("analyze"))
            .json(&StartAnalysisRequest::new(job_id, options))
            .send()
            .await?;

        Self::ensure_success(response).await?;
        tracing::info!(job_id = %job_id, "Analysis start acknowledged");
        Ok(())
    }
}
