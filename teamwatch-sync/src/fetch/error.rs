//! Retrieval error taxonomy.

/// Classified failure of a retrieval operation.
///
/// Stored in [`FetchState::error`](super::FetchState) for the view to render;
/// never thrown past the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// No response at all (connect, DNS, reset, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// A response arrived but its body could not be decoded.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// The retrieval was aborted. Not an error from the view's perspective;
    /// the orchestrator never stores it.
    #[error("Request cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// HTTP status code, `0` when the failure has none.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Status { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether offering a retry makes sense.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || matches!(*status, 408 | 429),
            Self::Decode(_) | Self::Cancelled => false,
        }
    }
}
