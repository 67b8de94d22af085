//! The push channel client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use super::backoff::BackoffPolicy;
use super::event::PushEvent;
use super::state::{ConnectionState, ConnectionStatus, ErrorReason};
use super::transport::{Frame, PushConnection, PushError, PushTransport};
use crate::lock;

/// Close code the server uses to reject the credential.
pub const AUTH_REJECTED_CLOSE_CODE: u16 = 4001;

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub endpoint: Url,
    /// Sent as the `token` query parameter of the handshake URL.
    pub token: Option<String>,
    pub backoff: BackoffPolicy,
    pub auth_close_code: u16,
}

impl PushConfig {
    pub fn new(endpoint: &str) -> Result<Self, PushError> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            token: None,
            backoff: BackoffPolicy::default(),
            auth_close_code: AUTH_REJECTED_CLOSE_CODE,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn handshake_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        url
    }
}

type Handler = Arc<dyn Fn(PushEvent) + Send + Sync>;

enum StreamEnd {
    Dropped,
    AuthRejected,
    Stopped,
}

struct Shared {
    transport: Arc<dyn PushTransport>,
    config: PushConfig,
    state: watch::Sender<ConnectionState>,
    handler: Mutex<Option<Handler>>,
    /// Bumped by `reconnect` and `shutdown`; a run loop only acts while the
    /// epoch it was started with is current.
    epoch: watch::Sender<u64>,
    shut_down: AtomicBool,
}

impl Shared {
    fn is_current(&self, epoch: u64) -> bool {
        !self.shut_down.load(Ordering::Acquire) && *self.epoch.borrow() == epoch
    }

    async fn superseded(&self, epoch: u64) {
        let mut rx = self.epoch.subscribe();
        let _ = rx.wait_for(|current| *current != epoch).await;
    }

    fn transition(&self, epoch: u64, status: ConnectionStatus, attempt: u32) {
        self.state.send_if_modified(|state| {
            if !self.is_current(epoch) {
                return false;
            }
            let next = ConnectionState { status, attempt };
            if *state == next {
                return false;
            }
            match status {
                ConnectionStatus::Connected => {
                    tracing::info!(endpoint = %self.config.endpoint, "push channel connected")
                }
                ConnectionStatus::Error(reason) => {
                    tracing::warn!(endpoint = %self.config.endpoint, %reason, attempt, "push channel stopped")
                }
                _ => tracing::debug!(%status, attempt, "push channel state"),
            }
            *state = next;
            true
        });
    }

    fn dispatch(&self, text: &str) {
        let Some(event) = PushEvent::parse(text) else {
            tracing::trace!(len = text.len(), "dropping malformed push frame");
            return;
        };
        let handler = lock(&self.handler).clone();
        match handler {
            Some(handler) => handler(event),
            None => tracing::trace!(kind = %event.kind, "no push handler registered"),
        }
    }

    async fn pump(&self, epoch: u64, connection: &mut dyn PushConnection) -> StreamEnd {
        loop {
            let frame = tokio::select! {
                frame = connection.next_frame() => frame,
                () = self.superseded(epoch) => return StreamEnd::Stopped,
            };
            match frame {
                Some(Ok(Frame::Text(text))) => {
                    if self.is_current(epoch) {
                        self.dispatch(&text);
                    }
                }
                Some(Ok(Frame::Binary(_))) => tracing::trace!("ignoring binary push frame"),
                Some(Ok(Frame::Close(code))) => {
                    tracing::debug!(?code, "push channel closed by server");
                    return if code == Some(self.config.auth_close_code) {
                        StreamEnd::AuthRejected
                    } else {
                        StreamEnd::Dropped
                    };
                }
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "push stream failed");
                    return StreamEnd::Dropped;
                }
                None => return StreamEnd::Dropped,
            }
        }
    }
}

async fn run(shared: Arc<Shared>, epoch: u64) {
    let url = shared.config.handshake_url();
    let backoff = shared.config.backoff;
    let mut attempt = 0u32;

    loop {
        shared.transition(epoch, ConnectionStatus::Connecting, attempt);
        let connected = tokio::select! {
            result = shared.transport.connect(&url) => result,
            () = shared.superseded(epoch) => return,
        };

        match connected {
            Ok(mut connection) => {
                attempt = 0;
                shared.transition(epoch, ConnectionStatus::Connected, attempt);
                match shared.pump(epoch, connection.as_mut()).await {
                    StreamEnd::Stopped => {
                        connection.close().await;
                        return;
                    }
                    StreamEnd::AuthRejected => {
                        shared.transition(
                            epoch,
                            ConnectionStatus::Error(ErrorReason::AuthRejected),
                            attempt,
                        );
                        return;
                    }
                    StreamEnd::Dropped => {}
                }
            }
            Err(PushError::Unauthorized(status)) => {
                tracing::debug!(status, "push handshake rejected");
                shared.transition(
                    epoch,
                    ConnectionStatus::Error(ErrorReason::AuthRejected),
                    attempt,
                );
                return;
            }
            Err(err) => tracing::debug!(error = %err, attempt, "push connect failed"),
        }

        shared.transition(epoch, ConnectionStatus::Disconnected, attempt);
        if backoff.exhausted_after(attempt) {
            shared.transition(
                epoch,
                ConnectionStatus::Error(ErrorReason::RetriesExhausted),
                attempt,
            );
            return;
        }

        tokio::select! {
            () = tokio::time::sleep(backoff.delay(attempt)) => {}
            () = shared.superseded(epoch) => return,
        }
        attempt += 1;
    }
}

/// Client for the server's push event stream.
///
/// Connects on construction and reconnects under [`BackoffPolicy`] until the
/// credential is rejected or the attempts run out. Dropping the channel
/// shuts it down.
pub struct PushChannel {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PushChannel {
    /// Start connecting. Must be called inside a tokio runtime.
    pub fn connect(transport: Arc<dyn PushTransport>, config: PushConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::initial());
        let (epoch, _) = watch::channel(0u64);
        let shared = Arc::new(Shared {
            transport,
            config,
            state,
            handler: Mutex::new(None),
            epoch,
            shut_down: AtomicBool::new(false),
        });
        let task = tokio::spawn(run(shared.clone(), 0));
        Self {
            shared,
            task: Mutex::new(Some(task)),
        }
    }

    /// Register the event handler, replacing any previous one.
    pub fn set_handler(&self, handler: impl Fn(PushEvent) + Send + Sync + 'static) {
        *lock(&self.shared.handler) = Some(Arc::new(handler));
    }

    pub fn clear_handler(&self) {
        *lock(&self.shared.handler) = None;
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn config(&self) -> &PushConfig {
        &self.shared.config
    }

    /// Drop the current connection or pending timer and start over with
    /// `attempt = 0`. The only way out of `Error`.
    pub fn reconnect(&self) {
        if self.is_shut_down() {
            return;
        }
        let mut epoch = 0;
        self.shared.epoch.send_modify(|current| {
            *current += 1;
            epoch = *current;
        });
        tracing::info!(endpoint = %self.shared.config.endpoint, "push channel reconnect requested");
        let task = tokio::spawn(run(self.shared.clone(), epoch));
        *lock(&self.task) = Some(task);
    }

    /// Cancel any pending timer and close the live connection. No state
    /// transitions happen afterwards.
    pub fn shutdown(&self) {
        if self.shared.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.epoch.send_modify(|current| *current += 1);
        tracing::debug!("push channel shut down");
    }

    /// `shutdown` and wait until the connection has been closed.
    pub async fn close(&self) {
        self.shutdown();
        let task = lock(&self.task).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}
