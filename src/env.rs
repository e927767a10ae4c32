use std::env as stdenv;
use std::path::{Path, PathBuf};

/// Session state carried across loop iterations.
///
/// - `current_dir`: absolute working directory every relative path is resolved against.
///   Only a successful `cd` changes it, and it then mirrors the process working directory.
/// - `should_exit`: set by the `exit` builtin so the loop knows when to stop.
#[derive(Debug, Clone)]
pub struct Environment {
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// When set to true, the interactive loop stops after the current line.
    pub should_exit: bool,
}

impl Environment {
    /// Capture the process working directory into a fresh session.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_current_dir(current_dir)
    }

    /// Start a session rooted at `dir` without touching the process working directory.
    pub fn with_current_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: dir.into(),
            should_exit: false,
        }
    }

    /// Resolve a user supplied path against the session working directory.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.current_dir.join(path)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes tests that change the process working directory.
#[cfg(test)]
pub(crate) fn lock_current_dir() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
