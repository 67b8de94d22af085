//! Error types for the client binary.

use crate::api_client::ApiClientError;
use crate::config::ConfigError;
use teamwatch_sync::{FetchError, PushError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Push(#[from] PushError),
    #[error("Failed to initialize logging: {0}")]
    Telemetry(String),
}
