use std::path::PathBuf;
use thiserror::Error;

/// Why a tick produced no document to parse
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("search page returned status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// A card that had to be skipped entirely
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CardError {
    #[error("card {index} has no link")]
    MissingLink { index: usize },

    #[error("card {index} has unusable link {href:?}: {reason}")]
    BadLink {
        index: usize,
        href: String,
        reason: String,
    },
}

/// A single field that could not be read from an otherwise usable card
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FieldError {
    #[error("{field} node not found")]
    Missing { field: &'static str },

    #[error("{field} text {text:?} could not be parsed")]
    Unparseable { field: &'static str, text: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read seen-set {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write seen-set {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Transport(reqwest::Error),

    #[error("notification endpoint rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("missing credential {0}")]
    MissingCredential(&'static str),
}

// The Bot API URL embeds the bot token, so it never reaches the message
impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Transport(e.without_url())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
#[error("invalid selector {pattern:?}: {reason}")]
pub struct SelectorError {
    pub pattern: String,
    pub reason: String,
}
