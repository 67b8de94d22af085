//! Teamwatch Client
//!
//! Configuration, REST access, view-level screens and telemetry for the
//! `teamwatch` binary. Synchronization itself lives in `teamwatch-sync`.

pub mod api_client;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod screens;
pub mod telemetry;

pub use api_client::{ApiClientError, DashboardApi, RestClient};
pub use app::App;
pub use cli::{CliOptions, View};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use screens::{Screen, ScreenContext};
