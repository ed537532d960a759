use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{service} status: {status}")]
    Status { service: &'static str, status: u16 },

    #[error("Failed to decode block (Content-type = {0})")]
    UnsupportedContentType(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Malformed link: {0}")]
    MalformedLink(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Raised before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The {0} is required.")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Unknown setting: {0}")]
    UnknownKey(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Edge {edge} references missing node {missing}")]
    DanglingEdge { edge: String, missing: String },
}

pub type Result<T> = std::result::Result<T, ScanError>;
