//! Error types for cipres-client
//!
//! Two layers of failure:
//! - [`ServiceError`] — the structured record translated from a non-success
//!   HTTP response (or an `<error>`-rooted body on 200). This is the single
//!   failure channel for everything the remote service rejects.
//! - [`Error`] — the crate-wide enum wrapping service errors together with
//!   network, I/O, decode, and local-misuse failures.

use std::collections::HashMap;
use thiserror::Error;

use crate::xml;

/// Result type alias for cipres-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cipres-client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },

    /// The service rejected a request; see [`ServiceError`] for the details
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// A response body could not be decoded as the expected XML document
    #[error("XML decode error: {message}")]
    Xml {
        /// What was being decoded and why it failed
        message: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A job operation that needs server-assigned state was called before
    /// that state was known (e.g., listing results before any populate)
    #[error("invalid job state: {0}")]
    InvalidJob(String),

    /// A completion wait was cancelled through its cancellation token
    #[error("wait for completion was cancelled")]
    Cancelled,
}

/// Structured record translated from a failed service response.
///
/// The `message` is composed as `"HTTP Code: {status}, "` followed by the
/// service's `displayMessage` when one was present, else the raw body.
/// `field_errors` is populated only for field-validation failures
/// (`cipres_code == 5`), keyed by parameter name.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct ServiceError {
    /// HTTP status code of the failed response
    pub http_status: u16,
    /// Service error code from the `<code>` element; 0 when unparseable
    pub cipres_code: i32,
    /// Human-readable message for display
    pub message: String,
    /// Per-parameter validation messages, populated when `cipres_code == 5`
    pub field_errors: HashMap<String, String>,
    /// Original response body, kept for diagnostics
    pub rawtext: String,
}

impl ServiceError {
    /// Translate a failed response into the structured error record.
    ///
    /// Attempts to decode the body as an `<error>` document; a body that is
    /// not well-formed XML degrades to a generic value carrying the decode
    /// context, never a crash.
    pub(crate) fn from_response(http_status: u16, body: &str) -> Self {
        let rawtext = if body.is_empty() {
            "No content returned.".to_string()
        } else {
            body.to_string()
        };

        let mut display_message = None;
        let mut cipres_code = 0;
        let mut field_errors = HashMap::new();

        if !body.is_empty() {
            match xml::root_tag(body) {
                Some(tag) if tag == "error" => match xml::parse_error_document(body) {
                    Ok(doc) => {
                        display_message = doc.display_message;
                        cipres_code = doc.code.unwrap_or(0);
                        if cipres_code == 5 {
                            for entry in doc.param_errors {
                                if let (Some(param), Some(error)) = (entry.param, entry.error) {
                                    field_errors.insert(param, error);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "could not decode service error document");
                        return Self {
                            http_status,
                            cipres_code: 0,
                            message: format!(
                                "HTTP Code: {http_status}, couldn't parse the error response: {e}"
                            ),
                            field_errors: HashMap::new(),
                            rawtext,
                        };
                    }
                },
                Some(_) => {
                    // Well-formed XML with some other root: no structured
                    // fields to extract, the raw body stands in for them.
                }
                None => {
                    return Self {
                        http_status,
                        cipres_code: 0,
                        message: format!(
                            "HTTP Code: {http_status}, couldn't parse the error response as XML; raw text: {rawtext}"
                        ),
                        field_errors: HashMap::new(),
                        rawtext,
                    };
                }
            }
        }

        let message = format!(
            "HTTP Code: {}, {}",
            http_status,
            display_message.as_deref().unwrap_or(&rawtext)
        );

        Self {
            http_status,
            cipres_code,
            message,
            field_errors,
            rawtext,
        }
    }
}
