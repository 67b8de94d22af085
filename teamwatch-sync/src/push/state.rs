use std::fmt;

/// Why the push channel stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    /// The server refused the credential (close code 4001 or handshake 401/403).
    AuthRejected,
    RetriesExhausted,
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthRejected => write!(f, "authentication rejected"),
            Self::RetriesExhausted => write!(f, "reconnect attempts exhausted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error(ErrorReason),
}

impl ConnectionStatus {
    /// `Error` is left only through a manual reconnect.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Observable push channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// Reconnects attempted since the last successful open.
    pub attempt: u32,
}

impl ConnectionState {
    pub fn initial() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            attempt: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::initial()
    }
}
