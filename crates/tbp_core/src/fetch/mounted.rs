//! Share reachable through a local mount point.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::share::{RemoteEntry, RemoteShare, ShareError, ShareResult};

/// Share mounted on the local filesystem (CIFS, GVFS, NFS).
#[derive(Debug, Clone)]
pub struct MountedShare {
    root: PathBuf,
}

impl MountedShare {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, remote: &str) -> PathBuf {
        remote
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, seg| acc.join(seg))
    }
}

fn map_io(remote: &str, e: io::Error) -> ShareError {
    match e.kind() {
        io::ErrorKind::NotFound => ShareError::NotFound(remote.to_string()),
        _ => ShareError::transport(remote, e.to_string()),
    }
}

impl RemoteShare for MountedShare {
    fn list_dir(&self, remote: &str) -> ShareResult<Vec<RemoteEntry>> {
        let path = self.resolve(remote);
        let mut entries = Vec::new();
        for entry in fs::read_dir(&path).map_err(|e| map_io(remote, e))? {
            let entry = entry.map_err(|e| map_io(remote, e))?;
            let is_dir = fs::metadata(entry.path())
                .map(|m| m.is_dir())
                .map_err(|e| map_io(remote, e))?;
            entries.push(RemoteEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn copy_file(&self, remote: &str, local: &Path) -> ShareResult<()> {
        fs::copy(self.resolve(remote), local)
            .map(|_| ())
            .map_err(|e| map_io(remote, e))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
