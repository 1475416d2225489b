//! Typed decoding of the service's XML payloads.
//!
//! The service speaks three document shapes — job status, job list, and
//! job-files listing — plus an `<error>`-rooted failure document. Every
//! status field is optional on the wire: an element that is absent is
//! simply skipped, never an error, so all document fields are `Option`
//! and the entity layer merges them into prior state.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;

use crate::error::{Error, Result, ServiceError};

/// A `<selfUri>` / `<resultsUri>` / `<downloadUri>`-style element; only the
/// nested `<url>` matters, the `rel`/`title` siblings are ignored.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct UriDoc {
    pub url: Option<String>,
}

/// One `<message>` entry: a timestamp plus free text.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MessageDoc {
    pub timestamp: Option<String>,
    pub text: Option<String>,
}

/// The `<messages>` container, an ordered sequence of [`MessageDoc`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MessagesDoc {
    pub message: Vec<MessageDoc>,
}

/// A job-status document (submission response, list item, or update()
/// response). Boolean-ish fields are kept as raw text here; the service
/// contract is `"true"` versus anything else, decided at merge time.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct JobStatusDoc {
    pub commandline: Option<String>,
    pub self_uri: Option<UriDoc>,
    pub job_handle: Option<String>,
    pub job_stage: Option<String>,
    pub terminal_stage: Option<String>,
    pub failed: Option<String>,
    pub results_uri: Option<UriDoc>,
    pub working_dir_uri: Option<UriDoc>,
    pub date_submitted: Option<String>,
    pub messages: Option<MessagesDoc>,
}

impl JobStatusDoc {
    /// The job's own URL, when the document carries a `<selfUri>`.
    pub(crate) fn job_url(&self) -> Option<&str> {
        self.self_uri.as_ref().and_then(|u| u.url.as_deref())
    }
}

/// Job-list document: `<joblist><jobs><jobstatus>...</jobstatus>...</jobs></joblist>`.
#[derive(Debug, Deserialize)]
pub(crate) struct JobListDoc {
    pub jobs: JobsElem,
}

/// The `<jobs>` container inside a job list.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct JobsElem {
    pub jobstatus: Vec<JobStatusDoc>,
}

/// Job-files document: `<results><jobfiles><jobfile>...</jobfile></jobfiles></results>`.
#[derive(Debug, Deserialize)]
pub(crate) struct JobFilesDoc {
    pub jobfiles: JobFilesElem,
}

/// The `<jobfiles>` container inside a job-files listing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct JobFilesElem {
    pub jobfile: Vec<JobFileDoc>,
}

/// One `<jobfile>` result-file entry. All fields optional at the document
/// level; the entity layer decides what a usable entry requires.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct JobFileDoc {
    pub filename: Option<String>,
    pub download_uri: Option<UriDoc>,
    pub length: Option<u64>,
}

/// An `<error>`-rooted failure document.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ErrorDoc {
    pub display_message: Option<String>,
    pub code: Option<i32>,
    #[serde(rename = "paramError")]
    pub param_errors: Vec<ParamErrorDoc>,
}

/// One `<paramError>` entry of a field-validation failure (code 5).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ParamErrorDoc {
    pub param: Option<String>,
    pub error: Option<String>,
}

/// Name of the root element, or `None` if the text is not well-formed XML.
///
/// Serde-based decoding ignores the root element's name, so this is how an
/// `<error>` payload delivered with HTTP 200 is told apart from a real job
/// document before deserialization.
pub(crate) fn root_tag(text: &str) -> Option<String> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Fail with the translated service error if the body is `<error>`-rooted.
///
/// The validation-failure path can deliver an error document on HTTP 200,
/// so every 200-body decode runs through this guard first.
fn ensure_not_error(text: &str) -> Result<()> {
    if root_tag(text).as_deref() == Some("error") {
        return Err(ServiceError::from_response(200, text).into());
    }
    Ok(())
}

fn decode_error(context: &str, err: quick_xml::DeError) -> Error {
    Error::Xml {
        message: format!("failed to decode {context}: {err}"),
    }
}

/// Decode a job-status document.
pub(crate) fn parse_job_status(text: &str) -> Result<JobStatusDoc> {
    ensure_not_error(text)?;
    quick_xml::de::from_str(text).map_err(|e| decode_error("job status document", e))
}

/// Decode a job-list document into its job-status children, in document order.
pub(crate) fn parse_job_list(text: &str) -> Result<Vec<JobStatusDoc>> {
    ensure_not_error(text)?;
    let doc: JobListDoc =
        quick_xml::de::from_str(text).map_err(|e| decode_error("job list document", e))?;
    Ok(doc.jobs.jobstatus)
}

/// Decode a job-files document into its file entries, in document order.
pub(crate) fn parse_job_files(text: &str) -> Result<Vec<JobFileDoc>> {
    ensure_not_error(text)?;
    let doc: JobFilesDoc =
        quick_xml::de::from_str(text).map_err(|e| decode_error("job files document", e))?;
    Ok(doc.jobfiles.jobfile)
}

/// Decode an `<error>` document. Used by the error translator, which has its
/// own degraded fallback when this fails.
pub(crate) fn parse_error_document(
    text: &str,
) -> std::result::Result<ErrorDoc, quick_xml::DeError> {
    quick_xml::de::from_str(text)
}
