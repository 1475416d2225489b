//! Job status entity: refresh-from-server, completion polling, deletion, and
//! result enumeration.
//!
//! A [`JobStatus`] is a mutable snapshot of one remote job. Every field
//! except the job URL is optional because the service populates documents
//! piecemeal: a field absent from the latest parsed XML keeps whatever value
//! it had before, so a partial response never invalidates the whole object.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::results::{ResultFile, ResultsLocation};
use crate::transport::Transport;
use crate::xml::{self, JobStatusDoc};

/// Mutable snapshot of one remote job's state.
///
/// Construct through the [`Client`](crate::Client) facade — from a
/// submission, a job listing, or a job handle. Only [`update`](Self::update)
/// mutates the snapshot, by re-fetching and merging the server's latest
/// document.
#[derive(Clone, Debug)]
pub struct JobStatus {
    transport: Transport,
    job_url: String,
    poll_interval: Duration,
    job_handle: Option<String>,
    job_stage: Option<String>,
    terminal_stage: Option<bool>,
    failed: Option<bool>,
    results_url: Option<String>,
    working_dir_url: Option<String>,
    date_submitted: Option<String>,
    messages: Vec<String>,
}

impl JobStatus {
    /// Empty shell for a known job URL. No field is trustworthy until
    /// [`update`](Self::update) has run.
    pub(crate) fn from_url(transport: Transport, job_url: String, poll_interval: Duration) -> Self {
        Self {
            transport,
            job_url,
            poll_interval,
            job_handle: None,
            job_stage: None,
            terminal_stage: None,
            failed: None,
            results_url: None,
            working_dir_url: None,
            date_submitted: None,
            messages: Vec::new(),
        }
    }

    /// Fully-populated entity from a parsed document. The document must
    /// carry `selfUri/url`; without it there is no job to talk to.
    pub(crate) fn from_doc(
        transport: Transport,
        doc: JobStatusDoc,
        poll_interval: Duration,
    ) -> Result<Self> {
        let job_url = doc
            .job_url()
            .map(str::to_string)
            .ok_or_else(|| Error::Xml {
                message: "job status document has no selfUri/url".to_string(),
            })?;
        let mut job = Self::from_url(transport, job_url, poll_interval);
        job.merge(doc);
        Ok(job)
    }

    /// Merge a freshly parsed document into the current snapshot.
    ///
    /// Presence of an element is the sole trigger for setting its field;
    /// absent elements leave prior values untouched. Messages append in
    /// document order rather than replacing.
    pub(crate) fn merge(&mut self, doc: JobStatusDoc) {
        if let Some(url) = doc.job_url() {
            self.job_url = url.to_string();
        }
        if let Some(handle) = doc.job_handle {
            self.job_handle = Some(handle);
        }
        if let Some(stage) = doc.job_stage {
            self.job_stage = Some(stage);
        }
        if let Some(terminal) = doc.terminal_stage {
            self.terminal_stage = Some(terminal == "true");
        }
        if let Some(failed) = doc.failed {
            self.failed = Some(failed == "true");
        }
        if let Some(url) = doc.results_uri.and_then(|u| u.url) {
            self.results_url = Some(url);
        }
        if let Some(url) = doc.working_dir_uri.and_then(|u| u.url) {
            self.working_dir_url = Some(url);
        }
        if let Some(date) = doc.date_submitted {
            self.date_submitted = Some(date);
        }
        if let Some(messages) = doc.messages {
            for entry in messages.message {
                self.messages.push(format!(
                    "{}: {}",
                    entry.timestamp.as_deref().unwrap_or(""),
                    entry.text.as_deref().unwrap_or("")
                ));
            }
        }
    }

    /// Server-assigned resource URL of this job.
    pub fn job_url(&self) -> &str {
        &self.job_url
    }

    /// Human-readable job identifier, once known.
    pub fn job_handle(&self) -> Option<&str> {
        self.job_handle.as_deref()
    }

    /// Server-defined lifecycle stage label (e.g. `QUEUE`, `LOAD_RESULTS`).
    pub fn job_stage(&self) -> Option<&str> {
        self.job_stage.as_deref()
    }

    /// Raw terminal flag: `None` until the server has reported it.
    pub fn terminal_stage(&self) -> Option<bool> {
        self.terminal_stage
    }

    /// Raw failure flag: `None` until reported, meaningful only once the job
    /// is terminal.
    pub fn failed(&self) -> Option<bool> {
        self.failed
    }

    /// Permanent results URL, once known.
    pub fn results_url(&self) -> Option<&str> {
        self.results_url.as_deref()
    }

    /// Transient working-directory URL, once known.
    pub fn working_dir_url(&self) -> Option<&str> {
        self.working_dir_url.as_deref()
    }

    /// Submission timestamp as reported by the server.
    pub fn date_submitted(&self) -> Option<&str> {
        self.date_submitted.as_deref()
    }

    /// Timestamped status messages accumulated across updates, in order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Whether the job has reached a terminal stage.
    ///
    /// Returns `false` while the snapshot has never been populated — a
    /// never-updated shell polls as "not done". Use
    /// [`terminal_stage`](Self::terminal_stage) when "unknown" must be
    /// distinguished from "not terminal".
    pub fn is_done(&self) -> bool {
        self.terminal_stage.unwrap_or(false)
    }

    /// Whether the job failed. Meaningful only once [`is_done`](Self::is_done)
    /// is true; `false` while unreported.
    pub fn is_error(&self) -> bool {
        self.failed.unwrap_or(false)
    }

    /// Re-fetch this job's status from the server and merge it in.
    pub async fn update(&mut self) -> Result<()> {
        let url = format!("{}/?expand=true", self.job_url);
        let body = self.transport.get(&url).await?;
        let doc = xml::parse_job_status(&body)?;
        self.merge(doc);
        tracing::debug!(
            job = ?self.job_handle,
            stage = ?self.job_stage,
            terminal = ?self.terminal_stage,
            "job status updated"
        );
        Ok(())
    }

    /// Block (asynchronously) until the job reaches a terminal stage,
    /// polling at the interval the client was configured with.
    ///
    /// Sleep-then-poll with no backoff, no timeout, and unbounded retries —
    /// batch jobs can legitimately run for days. A caller needing a deadline
    /// should use [`wait_for_completion_cancellable`](Self::wait_for_completion_cancellable)
    /// or wrap this future in an external timeout.
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        self.wait_for_completion_every(self.poll_interval).await
    }

    /// Like [`wait_for_completion`](Self::wait_for_completion), polling at
    /// `poll_interval` instead of the configured default.
    pub async fn wait_for_completion_every(&mut self, poll_interval: Duration) -> Result<()> {
        self.wait_for_completion_cancellable(poll_interval, CancellationToken::new())
            .await
    }

    /// Like [`wait_for_completion_every`](Self::wait_for_completion_every),
    /// but stops with [`Error::Cancelled`] as soon as `cancel` fires. No
    /// further requests are made after cancellation or after the terminal
    /// poll.
    pub async fn wait_for_completion_cancellable(
        &mut self,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<()> {
        while !self.is_done() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(job = ?self.job_handle, "completion wait cancelled");
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
            self.update().await?;
        }
        Ok(())
    }

    /// List the job's files at the given location, keyed by filename.
    ///
    /// [`ResultsLocation::WorkingDir`] is only meaningful while the job is
    /// staged on the execution host; outside that window the service answers
    /// with a 404-class error. Entries missing a filename, URL, or length
    /// are logged and skipped.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidJob`] when the requested URL has never been reported
    /// for this job (call [`update`](Self::update) first).
    pub async fn list_results(
        &self,
        location: ResultsLocation,
    ) -> Result<HashMap<String, ResultFile>> {
        let url = match location {
            ResultsLocation::Final => self.results_url.as_deref(),
            ResultsLocation::WorkingDir => self.working_dir_url.as_deref(),
        }
        .ok_or_else(|| {
            Error::InvalidJob(format!(
                "no {} URL known for this job; call update() first",
                location.label()
            ))
        })?;

        let body = self.transport.get(url).await?;
        let docs = xml::parse_job_files(&body)?;
        let mut files = HashMap::with_capacity(docs.len());
        for doc in docs {
            match ResultFile::from_doc(self.transport.clone(), doc) {
                Ok(file) => {
                    files.insert(file.name().to_string(), file);
                }
                Err(e) => tracing::warn!(error = %e, "skipping unusable result file entry"),
            }
        }
        Ok(files)
    }

    /// List then download every file at `location` into `directory`
    /// (current working directory when `None`). Returns the written paths.
    pub async fn download_results(
        &self,
        directory: Option<&Path>,
        location: ResultsLocation,
    ) -> Result<Vec<PathBuf>> {
        let files = self.list_results(location).await?;
        tracing::info!(
            job = ?self.job_handle,
            count = files.len(),
            "downloading result files"
        );
        let mut written = Vec::with_capacity(files.len());
        for file in files.values() {
            written.push(file.download(directory).await?);
        }
        Ok(written)
    }

    /// Delete the remote job.
    ///
    /// Consumes the entity: once the remote resource is gone, no further
    /// operation on it is defined, and the type system now says so.
    pub async fn delete(self) -> Result<()> {
        tracing::info!(job = ?self.job_handle, url = %self.job_url, "deleting job");
        self.transport.delete(&self.job_url).await
    }

    /// One-line human-readable rendering of the snapshot.
    pub fn summary(&self) -> String {
        let handle = self.job_handle.as_deref().unwrap_or("<unknown>");
        match (self.is_done(), self.is_error()) {
            (true, true) => format!(
                "Job={}, failed at stage {}",
                handle,
                self.job_stage.as_deref().unwrap_or("<unknown>")
            ),
            (true, false) => format!(
                "Job={}, finished, results are at {}",
                handle,
                self.results_url.as_deref().unwrap_or("<unknown>")
            ),
            (false, _) => format!(
                "Job={}, not finished, stage={}",
                handle,
                self.job_stage.as_deref().unwrap_or("<unknown>")
            ),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer) -> Transport {
        let config = ClientConfig::new("key-123", "tester", "secret", server.uri());
        Transport::new(&config).unwrap()
    }

    fn offline_transport() -> Transport {
        let config = ClientConfig::new("k", "u", "p", "http://localhost");
        Transport::new(&config).unwrap()
    }

    fn offline_job() -> JobStatus {
        JobStatus::from_url(
            offline_transport(),
            "http://localhost/j/1".into(),
            Duration::from_secs(60),
        )
    }

    fn job_at(server: &MockServer, handle: &str) -> JobStatus {
        JobStatus::from_url(
            transport_for(server),
            format!("{}/job/tester/{handle}", server.uri()),
            Duration::from_millis(5),
        )
    }

    fn status_xml(stage: &str, terminal: bool, failed: bool) -> String {
        format!(
            "<jobstatus>\
                <jobHandle>NGBW-JOB-1</jobHandle>\
                <jobStage>{stage}</jobStage>\
                <terminalStage>{terminal}</terminalStage>\
                <failed>{failed}</failed>\
            </jobstatus>"
        )
    }

    #[test]
    fn merge_leaves_absent_fields_untouched() {
        let mut job = offline_job();
        job.merge(xml::parse_job_status(&status_xml("QUEUE", false, false)).unwrap());

        // Second document only carries a stage change
        job.merge(xml::parse_job_status("<jobstatus><jobStage>RUNNING</jobStage></jobstatus>").unwrap());

        assert_eq!(job.job_handle(), Some("NGBW-JOB-1"), "handle survives partial update");
        assert_eq!(job.job_stage(), Some("RUNNING"));
        assert_eq!(job.terminal_stage(), Some(false), "terminal flag survives");
    }

    #[test]
    fn merge_appends_messages_across_updates() {
        let mut job = offline_job();
        job.merge(
            xml::parse_job_status(
                "<jobstatus><messages><message>\
                    <timestamp>t1</timestamp><text>queued</text>\
                </message></messages></jobstatus>",
            )
            .unwrap(),
        );
        job.merge(
            xml::parse_job_status(
                "<jobstatus><messages><message>\
                    <timestamp>t2</timestamp><text>running</text>\
                </message></messages></jobstatus>",
            )
            .unwrap(),
        );

        assert_eq!(job.messages(), &["t1: queued".to_string(), "t2: running".to_string()]);
    }

    #[test]
    fn merge_treats_only_literal_true_as_true() {
        let mut job = offline_job();
        job.merge(
            xml::parse_job_status(
                "<jobstatus><terminalStage>TRUE</terminalStage><failed>yes</failed></jobstatus>",
            )
            .unwrap(),
        );

        assert_eq!(job.terminal_stage(), Some(false));
        assert_eq!(job.failed(), Some(false));
    }

    #[test]
    fn shell_polls_as_not_done_and_not_failed() {
        let job = offline_job();
        assert!(!job.is_done());
        assert!(!job.is_error());
        assert!(job.terminal_stage().is_none(), "raw accessor still exposes unknown");
    }

    #[test]
    fn from_doc_requires_a_self_uri() {
        let doc = xml::parse_job_status("<jobstatus><jobHandle>X</jobHandle></jobstatus>").unwrap();
        let err =
            JobStatus::from_doc(offline_transport(), doc, Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, Error::Xml { .. }));
    }

    #[tokio::test]
    async fn update_fetches_expanded_status_and_merges() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/tester/NGBW-JOB-1/"))
            .and(query_param("expand", "true"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(status_xml("QUEUE", false, false)),
            )
            .mount(&server)
            .await;

        let mut job = job_at(&server, "NGBW-JOB-1");
        job.update().await.unwrap();

        assert_eq!(job.job_handle(), Some("NGBW-JOB-1"));
        assert_eq!(job.job_stage(), Some("QUEUE"));
        assert!(!job.is_done());
    }

    #[tokio::test]
    async fn wait_for_completion_polls_exactly_until_terminal() {
        let server = MockServer::start().await;
        // Two non-terminal polls, then terminal
        Mock::given(method("GET"))
            .and(path("/job/tester/NGBW-JOB-1/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(status_xml("RUNNING", false, false)),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/tester/NGBW-JOB-1/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(status_xml("COMPLETED", true, false)),
            )
            .mount(&server)
            .await;

        let mut job = job_at(&server, "NGBW-JOB-1");
        job.wait_for_completion_every(Duration::from_millis(5))
            .await
            .unwrap();

        assert!(job.is_done());
        assert!(!job.is_error());
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3, "no further polls once terminal");
    }

    #[tokio::test]
    async fn wait_for_completion_defaults_to_the_configured_interval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/tester/NGBW-JOB-1/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(status_xml("RUNNING", false, false)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/tester/NGBW-JOB-1/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(status_xml("COMPLETED", true, false)),
            )
            .mount(&server)
            .await;

        // job_at builds the entity with a 5ms interval; no interval is passed
        // at the call site.
        let mut job = job_at(&server, "NGBW-JOB-1");
        job.wait_for_completion().await.unwrap();

        assert!(job.is_done());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn wait_for_completion_skips_polling_when_already_terminal() {
        let server = MockServer::start().await;
        let mut job = job_at(&server, "NGBW-JOB-1");
        job.merge(xml::parse_job_status(&status_xml("COMPLETED", true, false)).unwrap());

        job.wait_for_completion().await.unwrap();

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_the_wait_before_the_next_poll() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/tester/NGBW-JOB-1/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(status_xml("RUNNING", false, false)),
            )
            .mount(&server)
            .await;

        let mut job = job_at(&server, "NGBW-JOB-1");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = job
            .wait_for_completion_cancellable(Duration::from_secs(3600), cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_results_maps_filenames_to_result_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job/tester/NGBW-JOB-1/output"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<results><jobfiles>\
                    <jobfile>\
                        <filename>STDOUT</filename>\
                        <downloadUri><url>{0}/output/11</url></downloadUri>\
                        <length>42</length>\
                    </jobfile>\
                    <jobfile>\
                        <filename>STDERR</filename>\
                        <downloadUri><url>{0}/output/12</url></downloadUri>\
                        <length>0</length>\
                    </jobfile>\
                </jobfiles></results>",
                server.uri()
            )))
            .mount(&server)
            .await;

        let mut job = job_at(&server, "NGBW-JOB-1");
        job.merge(
            xml::parse_job_status(&format!(
                "<jobstatus><resultsUri><url>{}/job/tester/NGBW-JOB-1/output</url></resultsUri></jobstatus>",
                server.uri()
            ))
            .unwrap(),
        );

        let files = job.list_results(ResultsLocation::Final).await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files["STDOUT"].length(), 42);
        assert_eq!(files["STDERR"].length(), 0);
    }

    #[tokio::test]
    async fn list_results_without_known_url_fails_loudly() {
        let job = offline_job();

        let err = job.list_results(ResultsLocation::Final).await.unwrap_err();
        assert!(matches!(err, Error::InvalidJob(_)));

        let err = job.list_results(ResultsLocation::WorkingDir).await.unwrap_err();
        assert!(matches!(err, Error::InvalidJob(_)));
    }

    #[tokio::test]
    async fn delete_succeeds_on_204_and_fails_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/job/tester/NGBW-JOB-1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/job/tester/NGBW-JOB-2"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                "<error><displayMessage>Job not found.</displayMessage><code>4</code></error>",
            ))
            .mount(&server)
            .await;

        let job = job_at(&server, "NGBW-JOB-1");
        job.delete().await.unwrap();

        let job = job_at(&server, "NGBW-JOB-2");
        let err = job.delete().await.unwrap_err();
        assert!(matches!(err, Error::Service(s) if s.http_status == 404));
    }

    #[test]
    fn summary_reflects_the_three_snapshot_shapes() {
        let mut job = offline_job();
        job.merge(xml::parse_job_status(&status_xml("QUEUE", false, false)).unwrap());
        assert_eq!(job.summary(), "Job=NGBW-JOB-1, not finished, stage=QUEUE");

        job.merge(
            xml::parse_job_status(
                "<jobstatus>\
                    <terminalStage>true</terminalStage>\
                    <resultsUri><url>http://localhost/j/1/output</url></resultsUri>\
                </jobstatus>",
            )
            .unwrap(),
        );
        assert_eq!(
            job.summary(),
            "Job=NGBW-JOB-1, finished, results are at http://localhost/j/1/output"
        );

        job.merge(xml::parse_job_status("<jobstatus><failed>true</failed></jobstatus>").unwrap());
        assert_eq!(job.summary(), "Job=NGBW-JOB-1, failed at stage QUEUE");
    }
}
