//! Pipeline-owned staging directories.
//!
//! Input and output staging are cleared and recreated on every run. The
//! persistent repository clone is never touched: any clear whose target
//! overlaps it is refused.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Settings;

/// Errors raised while preparing staging directories.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// The directory could not be created or listed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Some children could not be removed.
    #[error("Could not clear {path}: {failed} of its entries could not be removed")]
    Incomplete { path: PathBuf, failed: usize },

    /// The path is, or contains, a location that must never be cleared.
    #[error("Refusing to clear {path}: it overlaps protected path {protected}")]
    Protected { path: PathBuf, protected: PathBuf },

    /// The path exists but is not a directory.
    #[error("{0} exists and is not a directory")]
    NotADirectory(PathBuf),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// What a clear removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub files_removed: usize,
    pub dirs_removed: usize,
    /// The directory did not exist and was created.
    pub created: bool,
}

/// Create `path` (and parents) if it does not exist.
pub fn ensure_directory(path: &Path) -> WorkspaceResult<()> {
    if path.exists() && !path.is_dir() {
        return Err(WorkspaceError::NotADirectory(path.to_path_buf()));
    }
    fs::create_dir_all(path).map_err(|source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Empty `path`, creating it if absent.
///
/// Every direct child is removed (directories recursively). A child that
/// cannot be removed is logged and skipped; the call still fails if any
/// child remains. Idempotent: a second call on an empty directory removes
/// nothing and succeeds.
pub fn clear_directory(path: &Path) -> WorkspaceResult<ClearReport> {
    let mut report = ClearReport::default();

    if !path.exists() {
        ensure_directory(path)?;
        report.created = true;
        tracing::debug!("Created {}", path.display());
        return Ok(report);
    }
    if !path.is_dir() {
        return Err(WorkspaceError::NotADirectory(path.to_path_buf()));
    }

    let io_err = |source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut failed = 0;
    for entry in fs::read_dir(path).map_err(io_err)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Cannot read entry in {}: {}", path.display(), e);
                failed += 1;
                continue;
            }
        };

        let child = entry.path();
        // DirEntry::file_type does not follow symlinks.
        let is_dir = entry
            .file_type()
            .map(|t| t.is_dir())
            .unwrap_or(false);

        let removed = if is_dir {
            fs::remove_dir_all(&child)
        } else {
            fs::remove_file(&child)
        };

        match removed {
            Ok(()) if is_dir => report.dirs_removed += 1,
            Ok(()) => report.files_removed += 1,
            Err(e) => {
                tracing::warn!("Failed to remove {}: {}", child.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(WorkspaceError::Incomplete {
            path: path.to_path_buf(),
            failed,
        });
    }

    Ok(report)
}

/// Input and output staging directories of a run.
#[derive(Debug, Clone)]
pub struct StagingArea {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Paths that clearing must never reach (the repository clone).
    protected: Vec<PathBuf>,
}

impl StagingArea {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            protected: Vec::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.input_dir(), settings.output_dir()).protect(settings.git_repo_path())
    }

    /// Add a path that clearing must refuse to touch.
    pub fn protect(mut self, path: impl Into<PathBuf>) -> Self {
        self.protected.push(path.into());
        self
    }

    /// Clear one staging directory after checking it against protected
    /// paths.
    pub fn clear(&self, path: &Path) -> WorkspaceResult<ClearReport> {
        for protected in &self.protected {
            if overlaps(path, protected) {
                return Err(WorkspaceError::Protected {
                    path: path.to_path_buf(),
                    protected: protected.clone(),
                });
            }
        }
        clear_directory(path)
    }

    /// Clear both input and output staging.
    pub fn reset(&self) -> WorkspaceResult<(ClearReport, ClearReport)> {
        let input = self.clear(&self.input)?;
        let output = self.clear(&self.output)?;
        Ok((input, output))
    }
}

/// True when `target` equals `protected` or is one of its ancestors.
fn overlaps(target: &Path, protected: &Path) -> bool {
    let target = normalize(target);
    let protected = normalize(protected);
    protected.starts_with(&target)
}

fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn clear_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("data/oral_input");

        let report = clear_directory(&target).unwrap();
        assert!(report.created);
        assert!(target.is_dir());
    }

    #[test]
    fn clear_removes_children_and_counts_them() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("stage");
        fs::create_dir_all(target.join("12-34/nested")).unwrap();
        fs::write(target.join("12-34/nested/a.wav"), b"a").unwrap();
        fs::write(target.join("notes.txt"), b"n").unwrap();

        let report = clear_directory(&target).unwrap();
        assert_eq!(report.files_removed, 1);
        assert_eq!(report.dirs_removed, 1);
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("stage");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("x"), b"x").unwrap();

        clear_directory(&target).unwrap();
        let second = clear_directory(&target).unwrap();
        assert_eq!(second, ClearReport::default());
        assert!(target.is_dir());
    }

    #[test]
    fn clear_rejects_file_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            clear_directory(&file),
            Err(WorkspaceError::NotADirectory(_))
        ));
    }

    #[test]
    fn staging_refuses_to_clear_repo_clone_or_its_parent() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("work/repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        let staging = StagingArea::new(dir.path().join("work/in"), dir.path().join("work/out"))
            .protect(&repo);

        assert!(matches!(
            staging.clear(&repo),
            Err(WorkspaceError::Protected { .. })
        ));
        assert!(matches!(
            staging.clear(&dir.path().join("work")),
            Err(WorkspaceError::Protected { .. })
        ));
        assert!(repo.join(".git").exists());
    }

    #[test]
    fn reset_clears_both_staging_dirs() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("in"), dir.path().join("out"))
            .protect(dir.path().join("repo"));
        fs::create_dir_all(&staging.input).unwrap();
        fs::write(staging.input.join("old.wav"), b"x").unwrap();

        let (input, output) = staging.reset().unwrap();
        assert_eq!(input.files_removed, 1);
        assert!(output.created);
    }

    #[test]
    fn overlap_detects_equal_and_ancestor_paths() {
        assert!(overlaps(Path::new("/srv/a"), Path::new("/srv/a/repo")));
        assert!(overlaps(Path::new("/srv/a/repo"), Path::new("/srv/a/repo")));
        assert!(overlaps(Path::new("/srv/a/./x/.."), Path::new("/srv/a/repo")));
        assert!(!overlaps(Path::new("/srv/a/in"), Path::new("/srv/a/repo")));
    }
}
