//! Session storage backends for the result cache.
//!
//! A session store outlives a single client process but not the session that
//! started it. [`FileSessionStore`] keeps one file per key in a directory
//! named after the session; ending the session removes the directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::lock;

/// Environment variable naming the current session.
pub const SESSION_ENV: &str = "TEAMWATCH_SESSION";

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid session key: {0}")]
    InvalidKey(String),
}

/// String key/value storage scoped to one session.
pub trait SessionStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, SessionStoreError>;

    fn write(&self, key: &str, value: &str) -> Result<(), SessionStoreError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), SessionStoreError>;

    /// Drop everything stored for this session.
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// Process-local store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn read(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        lock(&self.entries).clear();
        Ok(())
    }
}

/// One JSON file per key under `<root>/<session id>/`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl AsRef<Path>, session_id: &str) -> Result<Self, SessionStoreError> {
        if session_id.is_empty()
            || session_id.starts_with('.')
            || !session_id.chars().all(|c| c == '%' || is_safe_char(c))
        {
            return Err(SessionStoreError::InvalidKey(session_id.to_string()));
        }
        Ok(Self {
            dir: root.as_ref().join(session_id),
        })
    }

    /// Store for the session of the current process.
    ///
    /// The session is named by `TEAMWATCH_SESSION` when set; otherwise the
    /// parent process (usually the shell) identifies it, so restarting the
    /// client from the same terminal finds the same files.
    pub fn for_current_session(root: impl AsRef<Path>) -> Result<Self, SessionStoreError> {
        Self::new(root, &session_id(std::env::var(SESSION_ENV).ok()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SessionStoreError> {
        if key.is_empty() {
            return Err(SessionStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", encode_key(key))))
    }
}

impl SessionStore for FileSessionStore {
    fn read(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Percent-encode anything that is not safe in a file name.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if is_safe_char(c) && !(out.is_empty() && c == '.') {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    out
}

/// File-safe session id from the configured name, or the default one.
fn session_id(configured: Option<String>) -> String {
    configured
        .filter(|s| !s.trim().is_empty())
        .map(|s| encode_key(s.trim()))
        .unwrap_or_else(default_session_id)
}

#[cfg(unix)]
fn default_session_id() -> String {
    format!("ppid-{}", std::os::unix::process::parent_id())
}

#[cfg(not(unix))]
fn default_session_id() -> String {
    "default".to_string()
}
