//! Scripted in-process transport for tests.
//!
//! Each `connect` consumes the next scripted step. With nothing scripted the
//! connection is refused.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use super::transport::{Frame, PushConnection, PushError, PushTransport};
use crate::lock;

enum Step {
    Accept(ScriptedConnection),
    Refuse(String),
    Reject(u16),
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    connects: Vec<(Url, Instant)>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the next connect; the returned handle plays the server.
    pub fn accept_next(&self) -> ScriptedServer {
        let (frames, inbox) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        lock(&self.script).steps.push_back(Step::Accept(ScriptedConnection {
            inbox,
            closed: closed.clone(),
        }));
        ScriptedServer { frames, closed }
    }

    pub fn refuse_next(&self) {
        lock(&self.script)
            .steps
            .push_back(Step::Refuse("connection refused".to_string()));
    }

    /// Fail the next handshake with an HTTP status.
    pub fn reject_next(&self, status: u16) {
        lock(&self.script).steps.push_back(Step::Reject(status));
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.script).connects.len()
    }

    pub fn urls(&self) -> Vec<Url> {
        lock(&self.script)
            .connects
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// When each connect was made, on the tokio clock.
    pub fn connect_times(&self) -> Vec<Instant> {
        lock(&self.script).connects.iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn connect(&self, url: &Url) -> Result<Box<dyn PushConnection>, PushError> {
        let step = {
            let mut script = lock(&self.script);
            script.connects.push((url.clone(), Instant::now()));
            script.steps.pop_front()
        };
        match step {
            Some(Step::Accept(connection)) => Ok(Box::new(connection)),
            Some(Step::Reject(status)) if matches!(status, 401 | 403) => {
                Err(PushError::Unauthorized(status))
            }
            Some(Step::Reject(status)) => Err(PushError::Connect(format!("HTTP {}", status))),
            Some(Step::Refuse(reason)) => Err(PushError::Connect(reason)),
            None => Err(PushError::Connect("nothing scripted".to_string())),
        }
    }
}

struct ScriptedConnection {
    inbox: mpsc::UnboundedReceiver<Frame>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl PushConnection for ScriptedConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame, PushError>> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        self.inbox.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Server side of an accepted scripted connection. Dropping it ends the
/// stream.
pub struct ScriptedServer {
    frames: mpsc::UnboundedSender<Frame>,
    closed: Arc<AtomicBool>,
}

impl ScriptedServer {
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.frames.send(Frame::Text(text.into()));
    }

    pub fn send_json(&self, value: &serde_json::Value) {
        self.send_text(value.to_string());
    }

    pub fn send_binary(&self, data: Vec<u8>) {
        let _ = self.frames.send(Frame::Binary(data));
    }

    pub fn close(&self, code: u16) {
        let _ = self.frames.send(Frame::Close(Some(code)));
    }

    /// Whether the client closed the connection gracefully.
    pub fn client_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
