//! Delivery of payloads to a remote endpoint and of reports to a preview
//! surface.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use sha2::{Digest, Sha256};
use subtle_encoding::hex;

use crate::fs::ensure_path_exists;
use crate::{Error, Payload};

/// The number of hex digits of a report's SHA-256 digest used to name its
/// preview file.
const PREVIEW_ID_LEN: usize = 12;

/// Sends payloads somewhere. Failures are reported, never retried.
pub trait Transport {
    fn send(&self, payload: &Payload) -> Result<(), Error>;
}

/// Posts payloads as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new<S: AsRef<str>>(endpoint: S, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(connection_error)?;
        Ok(Self {
            endpoint: endpoint.as_ref().to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn send(&self, payload: &Payload) -> Result<(), Error> {
        debug!("Posting payload for {} to {}", payload.source_file, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .map_err(connection_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Transport {
                status: status.as_u16(),
                body,
            });
        }
        info!(
            "Sent payload for {} to {} ({})",
            payload.source_file, self.endpoint, status
        );
        Ok(())
    }
}

// Anything that prevented us from getting a response at all.
fn connection_error(e: reqwest::Error) -> Error {
    Error::Transport {
        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
        body: e.to_string(),
    }
}

/// Somewhere a rendered report can be shown to the operator.
pub trait PreviewSurface {
    /// Shows the given report, returning where it ended up.
    fn show(&self, report: &str) -> Result<PathBuf, Error>;
}

/// Writes reports into a directory, naming each file after the hash of its
/// content, and optionally opens them with the system's default handler.
#[derive(Debug, Clone)]
pub struct FilePreview {
    dir: PathBuf,
    open: bool,
}

impl FilePreview {
    pub fn new<P: AsRef<Path>>(dir: P, open: bool) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            open,
        }
    }

    /// The file the given report would be written to.
    pub fn path_for(&self, report: &str) -> PathBuf {
        self.dir.join(format!("report-{}.html", preview_id(report)))
    }
}

fn preview_id(report: &str) -> String {
    let digest = hex::encode(Sha256::digest(report.as_bytes()));
    digest[..PREVIEW_ID_LEN].iter().copied().map(char::from).collect()
}

impl PreviewSurface for FilePreview {
    fn show(&self, report: &str) -> Result<PathBuf, Error> {
        ensure_path_exists(&self.dir)?;
        let path = self.path_for(report);
        fs::write(&path, report)
            .map_err(|e| Error::Io(format!("while writing report {}", path.display()), e))?;
        info!("Wrote report preview to {}", path.display());
        if self.open {
            open::that(&path).map_err(|e| Error::Transport {
                status: 0,
                body: format!("failed to open {}: {}", path.display(), e),
            })?;
        }
        Ok(path)
    }
}
