//! Client facade: owns credentials and base URL, exposes job listing,
//! lookup, submission, and validation.

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{Result, ServiceError};
use crate::job::JobStatus;
use crate::transport::Transport;
use crate::xml;

/// Client for one account against one service endpoint.
///
/// Immutable after construction; every request reuses the same credentials.
/// Cheap to clone if several tasks need their own handle — clones share the
/// underlying connection pool.
#[derive(Clone, Debug)]
pub struct Client {
    transport: Transport,
    base_url: String,
    username: String,
    poll_interval: Duration,
}

/// A parameterized job submission under construction.
///
/// Collects tool parameters, input files, and metadata; the multipart field
/// naming the service expects (`tool`, `vparam.*`, `input.*`, `metadata.*`)
/// is applied at submission time, so keys may be given with or without
/// their prefix.
#[derive(Clone, Debug, Default)]
pub struct JobRequest {
    vparams: Vec<(String, String)>,
    input_files: Vec<(String, PathBuf)>,
    metadata: Vec<(String, String)>,
}

impl JobRequest {
    /// Start an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool parameter. The key `toolId` (or `tool`) selects the tool
    /// to run; any other key becomes a `vparam.`-prefixed form field.
    /// Repeated keys are allowed and posted in insertion order.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vparams.push((key.into(), value.into()));
        self
    }

    /// Attach an input file. The file is read when the request is submitted,
    /// and the handle never outlives the submission call.
    pub fn input_file(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.input_files.push((key.into(), path.into()));
        self
    }

    /// Add a metadata entry (e.g. `statusEmail`, `clientJobId`).
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Render the request as the service's multipart form, reading every
    /// input file fully into its part.
    async fn build_form(&self) -> Result<Form> {
        let mut form = Form::new();
        for (key, path) in &self.input_files {
            let field = prefixed(key, "input.");
            let bytes = tokio::fs::read(path).await?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("input")
                .to_string();
            form = form.part(field, Part::bytes(bytes).file_name(file_name));
        }
        for (key, value) in &self.vparams {
            let field = if key == "toolId" || key == "tool" {
                "tool".to_string()
            } else {
                prefixed(key, "vparam.")
            };
            form = form.text(field, value.clone());
        }
        for (key, value) in &self.metadata {
            form = form.text(prefixed(key, "metadata."), value.clone());
        }
        Ok(form)
    }
}

/// Outcome of a validate-only submission.
///
/// The service renders the command line it would have run and discards the
/// job; no handle or URL ever exists, so this is a distinct type rather
/// than a half-populated [`JobStatus`].
#[derive(Clone, Debug)]
pub struct ValidatedSubmission {
    /// The rendered command line, when the service reported one.
    pub commandline: Option<String>,
}

impl Client {
    /// Build a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) when the
    /// configuration fails validation.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = Transport::new(&config)?;
        Ok(Self {
            transport,
            base_url: config.normalized_base_url(),
            username: config.username,
            poll_interval: config.poll_interval,
        })
    }

    fn jobs_url(&self) -> String {
        format!("{}/job/{}", self.base_url, self.username)
    }

    /// List this account's jobs, in the server's response order.
    ///
    /// Entries without a `selfUri/url` have no resource to operate on and
    /// are logged and skipped rather than failing the whole listing.
    pub async fn list_jobs(&self) -> Result<Vec<JobStatus>> {
        let url = format!("{}/?expand=true", self.jobs_url());
        let body = self.transport.get(&url).await?;
        let docs = xml::parse_job_list(&body)?;
        let mut jobs = Vec::with_capacity(docs.len());
        for doc in docs {
            match JobStatus::from_doc(self.transport.clone(), doc, self.poll_interval) {
                Ok(job) => jobs.push(job),
                Err(e) => tracing::warn!(error = %e, "skipping unusable job list entry"),
            }
        }
        tracing::debug!(count = jobs.len(), "listed jobs");
        Ok(jobs)
    }

    /// Fetch the current status of the job with the given handle.
    pub async fn job_status(&self, job_handle: &str) -> Result<JobStatus> {
        let mut job = JobStatus::from_url(
            self.transport.clone(),
            format!("{}/{}", self.jobs_url(), job_handle),
            self.poll_interval,
        );
        job.update().await?;
        Ok(job)
    }

    /// Submit a job for execution.
    ///
    /// On success the returned [`JobStatus`] carries the handle and URLs
    /// from the submission response. A rejected submission — including a
    /// field-validation failure with per-parameter messages — surfaces as a
    /// [`ServiceError`].
    pub async fn submit_job(&self, request: &JobRequest) -> Result<JobStatus> {
        let body = self.post_submission(&self.jobs_url(), request).await?;
        let doc = xml::parse_job_status(&body)?;
        let job = JobStatus::from_doc(self.transport.clone(), doc, self.poll_interval)?;
        tracing::info!(job = ?job.job_handle(), "job submitted");
        Ok(job)
    }

    /// Validate a job without running it.
    ///
    /// The service checks the parameters and renders the command line it
    /// would have executed; nothing is scheduled.
    pub async fn validate_job(&self, request: &JobRequest) -> Result<ValidatedSubmission> {
        let url = format!("{}/validate", self.jobs_url());
        let body = self.post_submission(&url, request).await?;
        let doc = xml::parse_job_status(&body)?;
        tracing::debug!(commandline = ?doc.commandline, "submission validated");
        Ok(ValidatedSubmission {
            commandline: doc.commandline,
        })
    }

    async fn post_submission(&self, url: &str, request: &JobRequest) -> Result<String> {
        let form = request.build_form().await?;
        let (status, body) = self.transport.post_multipart(url, form).await?;
        if status != StatusCode::OK {
            return Err(ServiceError::from_response(status.as_u16(), &body).into());
        }
        Ok(body)
    }
}

/// Apply `prefix` to `key` unless it is already present.
fn prefixed(key: &str, prefix: &str) -> String {
    if key.starts_with(prefix) {
        key.to_string()
    } else {
        format!("{prefix}{key}")
    }
}
