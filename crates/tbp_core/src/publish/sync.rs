//! Non-destructive directory merge.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::{PublishError, PublishResult};

const GIT_DIR: &str = ".git";

/// What a sync did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl SyncReport {
    pub fn changed(&self) -> usize {
        self.added + self.updated
    }
}

/// Merge `source` into `dest`.
///
/// New files are copied, files whose bytes differ are overwritten, and
/// files only present in `dest` are left alone. `.git` directories are
/// skipped on both sides.
pub fn sync_tree(source: &Path, dest: &Path) -> PublishResult<SyncReport> {
    if !source.is_dir() {
        return Err(PublishError::SourceMissing(source.to_path_buf()));
    }
    let mut report = SyncReport::default();
    merge_dir(source, dest, &mut report)?;
    Ok(report)
}

fn sync_err(path: &Path) -> impl FnOnce(io::Error) -> PublishError + '_ {
    move |source| PublishError::Sync {
        path: path.to_path_buf(),
        source,
    }
}

fn merge_dir(source: &Path, dest: &Path, report: &mut SyncReport) -> PublishResult<()> {
    fs::create_dir_all(dest).map_err(sync_err(dest))?;

    let mut entries = fs::read_dir(source)
        .map_err(sync_err(source))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sync_err(source))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if entry.file_name() == GIT_DIR {
            continue;
        }
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let meta = fs::metadata(&from).map_err(sync_err(&from))?;

        if meta.is_dir() {
            merge_dir(&from, &to, report)?;
        } else if !to.exists() {
            fs::copy(&from, &to).map_err(sync_err(&to))?;
            report.added += 1;
        } else if same_contents(&from, &to).map_err(sync_err(&to))? {
            report.unchanged += 1;
        } else {
            fs::copy(&from, &to).map_err(sync_err(&to))?;
            report.updated += 1;
        }
    }
    Ok(())
}

fn same_contents(a: &Path, b: &Path) -> io::Result<bool> {
    let meta_b = fs::metadata(b)?;
    if !meta_b.is_file() || fs::metadata(a)?.len() != meta_b.len() {
        return Ok(false);
    }

    let mut ra = BufReader::new(File::open(a)?);
    let mut rb = BufReader::new(File::open(b)?);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];
    loop {
        let n = ra.read(&mut buf_a)?;
        if n == 0 {
            return Ok(true);
        }
        rb.read_exact(&mut buf_b[..n])?;
        if buf_a[..n] != buf_b[..n] {
            return Ok(false);
        }
    }
}
