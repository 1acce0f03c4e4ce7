use std::path::PathBuf;

use thiserror::Error;

/// Failures of the local key-value cache. Never fatal: callers log and move on.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache read failed for {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("cache write failed for {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("cached messages under {key} are corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("subscription failed: {0}")]
    Subscription(String),

    #[error("append rejected: {0}")]
    Append(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum ImageReadError {
    #[error("unsupported asset uri: {0}")]
    UnsupportedUri(String),

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("asset {0} is empty")]
    Empty(PathBuf),

    #[error("asset is {size} bytes, max {max}")]
    TooLarge { size: u64, max: u64 },
}

/// Errors surfaced by the composer to whoever pressed "send".
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("image could not be read: {0}")]
    ImageRead(#[from] ImageReadError),

    #[error("message was not sent: {0}")]
    Append(#[source] StreamError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config directory available")]
    NoConfigDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
