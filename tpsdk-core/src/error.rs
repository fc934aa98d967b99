use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
    #[error("No development token defined in TP_DEV_TOKEN environment variable")]
    MissingToken,
    #[error("invalid agent url {url}: {source}")]
    InvalidAgentUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
