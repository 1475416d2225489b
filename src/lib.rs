//! # cipres-client
//!
//! Client library for CIPRES-style REST job-submission services: submit a
//! parameterized job with input files and metadata, poll or wait until it
//! completes, enumerate the result files it produced, and download them.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//! - **Explicit results** - every remote operation returns `Result`; a
//!   rejected request is a structured [`ServiceError`], never a panic
//! - **Partial-update safe** - the service populates job documents
//!   piecemeal; fields absent from a response keep their previous value
//! - **No hidden retries** - the only repetition is the explicit poll loop
//!   in [`JobStatus::wait_for_completion`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use cipres_client::{Client, ClientConfig, JobRequest, ResultsLocation};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(
//!         "my-appkey",
//!         "username",
//!         "password",
//!         "https://cipresrest.sdsc.edu/cipresrest/v1",
//!     );
//!     let client = Client::new(config)?;
//!
//!     let request = JobRequest::new()
//!         .param("toolId", "CLUSTALW")
//!         .param("runtime_", "0.5")
//!         .input_file("infile_", "samples/ex1.fasta")
//!         .metadata("statusEmail", "true");
//!
//!     let mut job = client.submit_job(&request).await?;
//!     job.wait_for_completion().await?;
//!
//!     if job.is_error() {
//!         eprintln!("{}", job.summary());
//!     } else {
//!         job.download_results(None, ResultsLocation::Final).await?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Client facade and job submission
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Job status entity and completion polling
pub mod job;
/// Result-file descriptors and downloads
pub mod results;

mod transport;
mod xml;

// Re-export commonly used types
pub use client::{Client, JobRequest, ValidatedSubmission};
pub use config::ClientConfig;
pub use error::{Error, Result, ServiceError};
pub use job::JobStatus;
pub use results::{ResultFile, ResultsLocation};
