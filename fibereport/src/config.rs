//! Configuration-related functionality for fibereport.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::files::DEFAULT_MAX_UPLOAD_FILES;
use crate::fs::maybe_canonicalize;
use crate::value::load_from_file;

/// The largest request body the server reads, in bytes.
pub const DEFAULT_MAX_REQUEST_BYTES: u64 = 64 * 1024 * 1024;

/// The configuration file picked up from the working directory if no other
/// is specified.
pub const DEFAULT_CONFIG_FILE: &str = "fibereport.yml";

/// fibereport configuration. Every field has a default, so an empty file (or
/// no file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where payloads are sent.
    pub endpoint: String,
    pub timeout_secs: u64,
    /// The JSON file in which templates are persisted.
    pub template_store: PathBuf,
    /// Where report previews are written.
    pub preview_dir: PathBuf,
    /// Whether to open report previews with the system's default handler.
    pub open_preview: bool,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5678/webhook/sor".to_string(),
            timeout_secs: 30,
            template_store: PathBuf::from(".fibereport/templates.json"),
            preview_dir: PathBuf::from(".fibereport/previews"),
            open_preview: false,
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the given file, or the defaults if the file
    /// does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match maybe_canonicalize(path)? {
            Some(path) => {
                let config: Self = load_from_file(&path).wrap_err_with(|| {
                    format!("failed to load configuration from {}", path.display())
                })?;
                debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => {
                debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration for the file-browsing server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// The directory served to clients. Nothing outside of it is reachable.
    pub root: PathBuf,
    pub max_upload_files: usize,
    /// Requests with larger bodies are refused.
    pub max_request_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            root: PathBuf::from("public"),
            max_upload_files: DEFAULT_MAX_UPLOAD_FILES,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("fibereport.yml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.server.address(), "127.0.0.1:3000");
        assert_eq!(config.server.max_request_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fibereport.yml");
        fs::write(
            &path,
            "endpoint: https://example.com/hook\nserver:\n  port: 8080\n",
        )
        .unwrap();
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.endpoint, "https://example.com/hook");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn unsupported_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fibereport.toml");
        fs::write(&path, "").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }
}
