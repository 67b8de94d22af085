//! Push channel client.
//!
//! Holds one persistent connection to the server's event stream behind the
//! [`PushTransport`] seam, reconnects under [`BackoffPolicy`], and hands
//! every parsed [`PushEvent`] to a single registered handler.

pub mod backoff;
pub mod client;
pub mod event;
pub mod mock;
pub mod state;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use client::{PushChannel, PushConfig, AUTH_REJECTED_CLOSE_CODE};
pub use event::PushEvent;
pub use mock::{ScriptedServer, ScriptedTransport};
pub use state::{ConnectionState, ConnectionStatus, ErrorReason};
pub use transport::{Frame, PushConnection, PushError, PushTransport, WsTransport};
