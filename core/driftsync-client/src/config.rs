//! Client configuration.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required option is absent.
    #[error("missing required option: {0}")]
    Missing(&'static str),

    /// `sync_dir` must be absolute so watcher paths and metadata keys
    /// agree regardless of the working directory.
    #[error("sync_dir must be an absolute path")]
    RelativeSyncDir,

    /// The `conn` option names a connector this build does not know.
    #[error("unrecognized connector type: {0}")]
    UnknownConnector(String),
}

/// Options consumed by [`Client::new`](crate::Client::new).
///
/// Loaded from a TOML file by the agent binary; tests construct it
/// directly.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Root of the mirrored subtree. Required, absolute.
    pub sync_dir: PathBuf,
    /// Connector type. `"sock"` is the only recognized value; absent
    /// means `"sock"`.
    #[serde(default)]
    pub conn: Option<String>,
    pub conn_host: Option<String>,
    pub conn_port: Option<u16>,
    pub conn_user: Option<String>,
    pub conn_pass: Option<String>,
    /// Shared secret. When present the connector encrypts and signs
    /// file payloads; when absent they travel in the clear.
    pub key: Option<String>,
}

/// The socket connector's parameters, extracted and checked.
#[derive(Debug, Clone, Copy)]
pub struct SockParams<'a> {
    pub host: &'a str,
    pub port: u16,
    pub user: &'a str,
    pub pass: &'a str,
}

impl ClientConfig {
    /// Checks the configuration without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("sync_dir"));
        }
        if !self.sync_dir.is_absolute() {
            return Err(ConfigError::RelativeSyncDir);
        }
        self.sock_params().map(|_| ())
    }

    /// Extracts the socket connector parameters, enforcing that they are
    /// all present when the sock connector is selected.
    pub fn sock_params(&self) -> Result<SockParams<'_>, ConfigError> {
        match self.conn.as_deref() {
            None | Some("sock") => Ok(SockParams {
                host: self
                    .conn_host
                    .as_deref()
                    .ok_or(ConfigError::Missing("conn_host"))?,
                port: self.conn_port.ok_or(ConfigError::Missing("conn_port"))?,
                user: self
                    .conn_user
                    .as_deref()
                    .ok_or(ConfigError::Missing("conn_user"))?,
                pass: self
                    .conn_pass
                    .as_deref()
                    .ok_or(ConfigError::Missing("conn_pass"))?,
            }),
            Some(other) => Err(ConfigError::UnknownConnector(other.to_string())),
        }
    }
}
