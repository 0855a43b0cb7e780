//! Single instance lock per device, using a Unix socket.
//!
//! Two bridges polling and writing the same device would fight over its
//! state, so each device address gets its own lock. A Unix socket is removed
//! by the OS when the process dies, so no stale lock files are left behind.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstanceLockError {
    /// Another bridge already serves this device.
    #[error("another instance is already bridging {0}")]
    AlreadyRunning(String),

    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Held for as long as the bridge runs. Dropping it removes the socket.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock for `address` in the user runtime directory (or `/tmp`).
    pub fn acquire(address: &str) -> Result<Self, InstanceLockError> {
        let dir = dirs::runtime_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self::acquire_in(&dir, address)
    }

    pub fn acquire_in(dir: &Path, address: &str) -> Result<Self, InstanceLockError> {
        let path = socket_path(dir, address);

        // A socket nobody answers on was left by a killed process
        if path.exists() {
            if UnixStream::connect(&path).is_ok() {
                return Err(InstanceLockError::AlreadyRunning(address.to_string()));
            }
            let _ = std::fs::remove_file(&path);
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                Err(InstanceLockError::AlreadyRunning(address.to_string()))
            }
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Socket path for a device address; anything outside `[A-Za-z0-9.-]` becomes `_`.
pub fn socket_path(dir: &Path, address: &str) -> PathBuf {
    let address = address
        .trim()
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .trim_end_matches('/');
    let sanitized: String = address
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("dingz-bridge-{sanitized}.sock"))
}
