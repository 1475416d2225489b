//! Result-file descriptors and streaming download.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::xml::JobFileDoc;

/// Which server-side listing to read result files from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultsLocation {
    /// The permanent results location, available once the job has finished.
    Final,
    /// The transient working directory on the execution host. It only exists
    /// while the job is staged there and before cleanup; listing it outside
    /// that window surfaces as the service's 404-class error.
    WorkingDir,
}

impl ResultsLocation {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Final => "results",
            Self::WorkingDir => "working directory",
        }
    }
}

/// Immutable descriptor of one output file produced by a job.
///
/// A value object: constructed from a listing, never updated. Obtain these
/// from [`JobStatus::list_results`](crate::JobStatus::list_results).
#[derive(Clone, Debug)]
pub struct ResultFile {
    transport: Transport,
    name: String,
    url: String,
    length: u64,
}

impl ResultFile {
    /// Build from one `<jobfile>` entry. Entries missing the filename,
    /// download URL, or length are unusable.
    pub(crate) fn from_doc(transport: Transport, doc: JobFileDoc) -> Result<Self> {
        let name = doc.filename.ok_or_else(|| Error::Xml {
            message: "result file entry has no filename".to_string(),
        })?;
        let url = doc
            .download_uri
            .and_then(|u| u.url)
            .ok_or_else(|| Error::Xml {
                message: format!("result file '{name}' has no downloadUri/url"),
            })?;
        let length = doc.length.ok_or_else(|| Error::Xml {
            message: format!("result file '{name}' has no length"),
        })?;
        Ok(Self {
            transport,
            name,
            url,
            length,
        })
    }

    /// Filename of this result on the server.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Download URI for the raw bytes.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Declared byte size.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Download this file to `{directory}/{name}`, creating or overwriting
    /// the target. `None` means the current working directory.
    ///
    /// The body is streamed chunk by chunk, never buffered whole, so files
    /// of any size are fine. Returns the path written.
    pub async fn download(&self, directory: Option<&Path>) -> Result<PathBuf> {
        let directory = match directory {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir()?,
        };
        let path = directory.join(&self.name);
        tracing::debug!(url = %self.url, path = %path.display(), "downloading result file");

        let response = self.transport.get_stream(&self.url).await?;
        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(path)
    }
}
