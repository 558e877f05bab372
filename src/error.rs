use thiserror::Error;

use crate::store::SessionStatus;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Image(#[from] ImageError),

    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("Invalid date \"{input}\" (expected YYYYMMDD or YYYY-MM-DD)")]
    InvalidDate { input: String },

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("Failed to create store directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to open store at {path}: {source}")]
    Open {
        path: String,
        source: rusqlite::Error,
    },

    #[error("Storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored value for \"{key}\" is corrupt: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },

    #[error("Failed to serialize sessions: {0}")]
    Serialize(serde_json::Error),

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    #[error("Session {id} is already {from}; cannot mark it {to}")]
    InvalidTransition {
        id: String,
        from: SessionStatus,
        to: SessionStatus,
    },
}

#[derive(Debug, Error)]
pub(crate) enum ImageError {
    #[error("Failed to read image {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Image {path} is empty")]
    Empty { path: String },
}

#[derive(Debug, Error)]
pub(crate) enum ClientError {
    #[error("No base URLs configured")]
    NoBaseUrls,

    #[error("{url} responded with HTTP {code}")]
    Status { url: String, code: u16 },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("All servers failed ({})", attempts.join("; "))]
    AllCandidatesFailed { attempts: Vec<String> },
}

impl ClientError {
    /// Network-level failures that justify moving on to the next base URL.
    pub(crate) fn is_network(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout { .. } | ClientError::Transport { .. }
        )
    }
}
