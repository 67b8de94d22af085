//! Fetch orchestration.
//!
//! A [`FetchOrchestrator`] wraps one retrieval operation for one view: it
//! serves fresh cache entries on mount, cancels superseded calls, applies
//! outcomes in call order and records classified errors without ever
//! throwing them at the caller.

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::FetchError;
pub use orchestrator::{FetchOptions, FetchOrchestrator, Retrieve, DEFAULT_CACHE_TTL};
pub use state::{Emptiness, FetchState};
