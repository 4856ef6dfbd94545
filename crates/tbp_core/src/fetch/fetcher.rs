//! Recursive per-item fetch and the run summary.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::share::{join_remote, RemoteShare, ShareError};
use crate::work_items::WorkItem;

/// How the fetch of one work item ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Every file was copied.
    Success,
    /// The remote folder does not exist. Skipped, not fatal.
    NotFound,
    /// The folder could not be listed, or some files failed to copy.
    TransferError { message: String },
}

/// Result of fetching one work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub item_identifier: String,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub outcome: FetchOutcome,
    pub files_copied: usize,
    pub failed_files: usize,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        self.outcome == FetchOutcome::Success
    }
}

/// Copies work-item folders from a share into the input staging directory.
pub struct RemoteFetcher<'a> {
    share: &'a dyn RemoteShare,
    base_path: String,
    local_root: PathBuf,
}

#[derive(Default)]
struct CopyCounts {
    copied: usize,
    failed: usize,
    last_error: Option<String>,
}

impl<'a> RemoteFetcher<'a> {
    pub fn new(
        share: &'a dyn RemoteShare,
        base_path: impl Into<String>,
        local_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            share,
            base_path: base_path.into(),
            local_root: local_root.into(),
        }
    }

    /// Fetch `<base_path>/<identifier>` into `<local_root>/<identifier>`.
    ///
    /// Never deletes local content. Per-file failures are logged and
    /// counted; the rest of the folder is still copied.
    /// An identifier that is not a single plain path component is refused
    /// as a `TransferError` before anything is listed or written.
    pub fn fetch(&self, identifier: &str) -> FetchResult {
        if !is_single_component(identifier) {
            tracing::warn!("Skipping {:?}: not a plain folder name", identifier);
            return FetchResult {
                item_identifier: identifier.to_string(),
                remote_path: self.base_path.clone(),
                local_path: self.local_root.clone(),
                outcome: FetchOutcome::TransferError {
                    message: format!("unsafe identifier {:?}", identifier),
                },
                files_copied: 0,
                failed_files: 0,
            };
        }

        let remote_path = join_remote(&self.base_path, identifier);
        let local_path = self.local_root.join(identifier);

        let mut result = FetchResult {
            item_identifier: identifier.to_string(),
            remote_path: remote_path.clone(),
            local_path: local_path.clone(),
            outcome: FetchOutcome::Success,
            files_copied: 0,
            failed_files: 0,
        };

        let entries = match self.share.list_dir(&remote_path) {
            Ok(entries) => entries,
            Err(ShareError::NotFound(_)) => {
                tracing::warn!("Remote folder not found: {}", remote_path);
                result.outcome = FetchOutcome::NotFound;
                return result;
            }
            Err(e) => {
                tracing::error!("Cannot list {}: {}", remote_path, e);
                result.outcome = FetchOutcome::TransferError {
                    message: e.to_string(),
                };
                return result;
            }
        };

        if let Err(e) = fs::create_dir_all(&local_path) {
            result.outcome = FetchOutcome::TransferError {
                message: format!("cannot create {}: {}", local_path.display(), e),
            };
            return result;
        }

        let mut counts = CopyCounts::default();
        for entry in entries {
            let remote = join_remote(&remote_path, &entry.name);
            let local = local_path.join(&entry.name);
            if entry.is_dir {
                self.copy_tree(&remote, &local, &mut counts);
            } else {
                self.copy_one(&remote, &local, &mut counts);
            }
        }

        result.files_copied = counts.copied;
        result.failed_files = counts.failed;
        if counts.failed > 0 {
            result.outcome = FetchOutcome::TransferError {
                message: format!(
                    "{} file(s) failed; last error: {}",
                    counts.failed,
                    counts.last_error.unwrap_or_default()
                ),
            };
        }

        tracing::info!(
            "Fetched {}: {} file(s) copied, {} failed",
            identifier,
            result.files_copied,
            result.failed_files
        );
        result
    }

    /// Fetch every item, in order, and aggregate.
    pub fn fetch_all(&self, items: &[WorkItem]) -> FetchSummary {
        let mut summary = FetchSummary::default();
        for item in items {
            let result = self.fetch(&item.identifier);
            summary.record(result);
        }
        summary
    }

    fn copy_tree(&self, remote: &str, local: &Path, counts: &mut CopyCounts) {
        let entries = match self.share.list_dir(remote) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot list {}: {}", remote, e);
                counts.failed += 1;
                counts.last_error = Some(e.to_string());
                return;
            }
        };

        if let Err(e) = fs::create_dir_all(local) {
            tracing::warn!("Cannot create {}: {}", local.display(), e);
            counts.failed += 1;
            counts.last_error = Some(e.to_string());
            return;
        }

        for entry in entries {
            let child_remote = join_remote(remote, &entry.name);
            let child_local = local.join(&entry.name);
            if entry.is_dir {
                self.copy_tree(&child_remote, &child_local, counts);
            } else {
                self.copy_one(&child_remote, &child_local, counts);
            }
        }
    }

    fn copy_one(&self, remote: &str, local: &Path, counts: &mut CopyCounts) {
        match self.share.copy_file(remote, local) {
            Ok(()) => {
                tracing::debug!("Copied {}", remote);
                counts.copied += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to copy {}: {}", remote, e);
                counts.failed += 1;
                counts.last_error = Some(e.to_string());
            }
        }
    }
}

/// True for a name that joins as exactly one path component on either side.
fn is_single_component(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\', ':'])
        && !Path::new(name).is_absolute()
}

/// Aggregate of a fetch pass, for the run summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchSummary {
    pub results: Vec<FetchResult>,
}

impl FetchSummary {
    pub fn record(&mut self, result: FetchResult) {
        self.results.push(result);
    }

    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn not_found(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.outcome == FetchOutcome::NotFound)
            .map(|r| r.item_identifier.as_str())
            .collect()
    }

    pub fn transfer_errors(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, FetchOutcome::TransferError { .. }))
            .map(|r| r.item_identifier.as_str())
            .collect()
    }

    pub fn failed_files(&self) -> usize {
        self.results.iter().map(|r| r.failed_files).sum()
    }

    pub fn files_copied(&self) -> usize {
        self.results.iter().map(|r| r.files_copied).sum()
    }
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Fetched {}/{} work item(s), {} file(s) copied",
            self.succeeded(),
            self.attempted(),
            self.files_copied()
        )?;
        let not_found = self.not_found();
        if !not_found.is_empty() {
            writeln!(f, "Not found ({}): {}", not_found.len(), not_found.join(", "))?;
        }
        let errors = self.transfer_errors();
        if !errors.is_empty() {
            writeln!(
                f,
                "Transfer errors ({}, {} file(s)): {}",
                errors.len(),
                self.failed_files(),
                errors.join(", ")
            )?;
        }
        Ok(())
    }
}
