//! Bifrost error types

/// Bifrost error types
#[derive(Debug, thiserror::Error)]
pub enum BifrostError {
    /// Network-level failure while talking to the remote host.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered, but with a status outside the 2xx range.
    ///
    /// Produced by the dispatcher after retry handling; the raw body is
    /// carried along so callers can inspect structured error payloads.
    #[error("unsuccessful response ({status})")]
    UnsuccessfulResponse { status: u16, body: String },

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A suspended wait was aborted before admission.
    #[error("operation canceled")]
    Canceled,
}

impl BifrostError {
    /// Whether the error is worth retrying.
    ///
    /// Transport faults (connection reset, DNS failure, timeout) are
    /// transient; everything else is permanent. This drives the default
    /// error predicate of the retry decorator — endpoints can override it.
    pub fn is_transient(&self) -> bool {
        matches!(self, BifrostError::Transport(_))
    }
}

impl From<reqwest::Error> for BifrostError {
    fn from(err: reqwest::Error) -> Self {
        BifrostError::Transport(err.to_string())
    }
}

/// Result type alias for Bifrost operations
pub type Result<T> = std::result::Result<T, BifrostError>;
