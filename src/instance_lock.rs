//! Single instance lock using Unix socket.
//!
//! Two ingest processes on the same controller stream would both accrue
//! usage minutes and race on attendance inserts, so only one may run.
//! A Unix socket is cleaned up by the OS when the process dies, avoiding
//! stale lock files.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SOCKET_NAME: &str = "smartclass-ingest.sock";

/// Error types for instance lock operations.
#[derive(Debug, Error)]
pub enum InstanceLockError {
    /// Another instance is already running.
    #[error("another instance is already running")]
    AlreadyRunning,

    /// I/O error during lock acquisition.
    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Single instance lock using a Unix socket.
///
/// The lock is held as long as this struct exists. When dropped, the socket
/// file is removed.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock at the default socket path.
    pub fn acquire() -> Result<Self, InstanceLockError> {
        Self::acquire_at(Self::socket_path())
    }

    /// Acquire the lock at `path`.
    pub fn acquire_at(path: impl Into<PathBuf>) -> Result<Self, InstanceLockError> {
        let path = path.into();

        // A socket file nobody answers on was left by a killed process
        if path.exists() {
            match UnixStream::connect(&path) {
                Ok(_) => return Err(InstanceLockError::AlreadyRunning),
                Err(_) => {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            // Another instance bound between our check and bind
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Err(InstanceLockError::AlreadyRunning),
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Socket path under `XDG_RUNTIME_DIR`, falling back to `/tmp`.
    pub fn socket_path() -> PathBuf {
        Self::socket_path_in(std::env::var("XDG_RUNTIME_DIR").ok().map(PathBuf::from))
    }

    fn socket_path_in(runtime_dir: Option<PathBuf>) -> PathBuf {
        runtime_dir
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(SOCKET_NAME)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
