use std::{io::Error as IoError, path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("failed to write config {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available: neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,
}

/// Failure to obtain an observation from a collaborator.
///
/// The `Display` text ends up verbatim in the status store, so keep it readable.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("error: could not retrieve {what}: {source:#}")]
    Observation {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("error: retrieving {what} timed out after {}", humantime::format_duration(*.after))]
    Timeout { what: &'static str, after: Duration },
}
