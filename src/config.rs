//! Configuration types for cipres-client

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Client configuration: credentials, endpoint, and request behavior.
///
/// Immutable once handed to [`Client::new`](crate::Client::new); every
/// request the client makes reuses the same credentials and base URL.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Registered application key, sent as the `cipres-appkey` header on
    /// every request
    pub app_key: String,

    /// Account username, used both for HTTP basic auth and in job URLs
    pub username: String,

    /// Account password for HTTP basic auth
    pub password: String,

    /// Base URL of the REST endpoint,
    /// e.g. `https://cipresrest.sdsc.edu/cipresrest/v1`
    pub base_url: String,

    /// Skip TLS certificate verification (default: true).
    ///
    /// The gateway deployments this client grew up against routinely present
    /// certificates that fail local verification, so verification is off by
    /// default. This is a deliberate, documented trade-off — set this to
    /// `false` for anything production-facing.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,

    /// Per-request timeout (None = no timeout).
    ///
    /// Applies to every request including streaming downloads, so leave it
    /// unset when large result files are expected.
    #[serde(default)]
    pub request_timeout: Option<Duration>,

    /// Default poll interval for completion waits (default: 60 seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
}

impl ClientConfig {
    /// Build a config from credentials and endpoint, with default behavior
    /// settings.
    pub fn new(
        app_key: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            username: username.into(),
            password: password.into(),
            base_url: base_url.into(),
            accept_invalid_certs: true,
            request_timeout: None,
            poll_interval: default_poll_interval(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key when a credential
    /// is empty or the base URL does not parse.
    pub fn validate(&self) -> Result<()> {
        if self.app_key.is_empty() {
            return Err(config_error("app_key must not be empty", "app_key"));
        }
        if self.username.is_empty() {
            return Err(config_error("username must not be empty", "username"));
        }
        if self.password.is_empty() {
            return Err(config_error("password must not be empty", "password"));
        }
        if let Err(e) = Url::parse(&self.base_url) {
            return Err(config_error(
                &format!("base_url '{}' is not a valid URL: {}", self.base_url, e),
                "base_url",
            ));
        }
        Ok(())
    }

    /// Base URL without a trailing slash, so paths can be appended uniformly.
    pub(crate) fn normalized_base_url(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(60)
}
