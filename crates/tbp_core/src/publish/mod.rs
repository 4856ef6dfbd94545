//! Publishing outputs to a git host.
//!
//! The persistent clone is refreshed (or created), a fresh
//! `{prefix}-{yyyymmdd-hhmmss}` branch is cut, the output directory is
//! merged in without deleting anything, and the branch is committed and
//! pushed only when that merge changed something.
//!
//! ```text
//! Uninitialized -> Cloned/Updated -> Branched -> Synced -> Pushed
//!                                                       -> NoChanges
//! ```

mod git;
mod publisher;
mod remote;
mod sync;

pub use git::GitCli;
pub use publisher::{branch_name, PublishOutcome, PublishRequest, RepositoryPublisher};
pub use remote::AuthenticatedRemote;
pub use sync::{sync_tree, SyncReport};

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Publish stage, used to say where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Setup,
    Branch,
    Sync,
    Stage,
    Commit,
    Push,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishStage::Setup => "setup",
            PublishStage::Branch => "branch",
            PublishStage::Sync => "sync",
            PublishStage::Stage => "stage",
            PublishStage::Commit => "commit",
            PublishStage::Push => "push",
        };
        f.write_str(name)
    }
}

/// Errors raised while publishing. The first failure aborts the publish.
#[derive(Error, Debug)]
pub enum PublishError {
    /// A git command failed. `command` is redacted.
    #[error("git {stage} failed: `{command}`: {detail}")]
    Git {
        stage: PublishStage,
        command: String,
        detail: String,
    },

    /// Copying outputs into the clone failed.
    #[error("Sync of {path} failed: {source}")]
    Sync {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The directory to publish does not exist.
    #[error("Source directory {0} does not exist")]
    SourceMissing(PathBuf),
}

pub type PublishResult<T> = Result<T, PublishError>;
