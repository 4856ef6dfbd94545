//! Remote share abstraction.

use std::path::Path;

use thiserror::Error;

/// Share errors. `NotFound` is kept apart from transport problems so a
/// missing folder can be skipped quietly.
#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Remote path not found: {0}")]
    NotFound(String),

    #[error("Transfer of {path} failed: {message}")]
    Transport { path: String, message: String },
}

impl ShareError {
    pub fn transport(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type ShareResult<T> = Result<T, ShareError>;

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Read-only view of a remote file share.
///
/// Remote paths are `/`-separated and relative to the share root.
pub trait RemoteShare: Send + Sync {
    /// List a directory, without `.` and `..`.
    fn list_dir(&self, remote: &str) -> ShareResult<Vec<RemoteEntry>>;

    /// Copy one remote file to `local`. The parent of `local` exists.
    fn copy_file(&self, remote: &str, local: &Path) -> ShareResult<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Join remote path segments with `/`, ignoring empty segments.
pub fn join_remote(base: &str, name: &str) -> String {
    let base = base.trim_matches('/');
    let name = name.trim_matches('/');
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_remote_handles_slashes() {
        assert_eq!(join_remote("Audio/2024/", "12-34"), "Audio/2024/12-34");
        assert_eq!(join_remote("", "12-34"), "12-34");
        assert_eq!(join_remote("/base", ""), "base");
    }
}
