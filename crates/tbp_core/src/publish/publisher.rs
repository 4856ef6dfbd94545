//! Clone-or-update, branch, sync, conditional commit and push.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::git::GitCli;
use super::remote::AuthenticatedRemote;
use super::sync::{sync_tree, SyncReport};
use super::{PublishError, PublishResult, PublishStage};

/// `git config --unset` exit code when the key is not set.
const CONFIG_KEY_MISSING: i32 = 5;

/// `{prefix}-{yyyymmdd-hhmmss}`
pub fn branch_name(prefix: &str, at: &DateTime<Local>) -> String {
    format!("{}-{}", prefix, at.format("%Y%m%d-%H%M%S"))
}

/// Inputs of one publish.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Directory whose contents are merged into the clone root.
    pub source_dir: PathBuf,
    /// Persistent local clone. Created on first use.
    pub repo_path: PathBuf,
    pub branch_prefix: String,
    pub default_branch: String,
    /// Timestamp naming the branch and the commit.
    pub started_at: DateTime<Local>,
}

/// How a publish ended. Both variants are success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// A commit was pushed to a new branch.
    Pushed {
        branch: String,
        files: Vec<String>,
        pull_request_url: String,
    },
    /// The outputs were already in the repository.
    NoChanges { branch: String },
}

impl PublishOutcome {
    pub fn branch(&self) -> &str {
        match self {
            PublishOutcome::Pushed { branch, .. } | PublishOutcome::NoChanges { branch } => branch,
        }
    }
}

/// Publishes an output directory to a fresh branch of the remote.
pub struct RepositoryPublisher {
    git: GitCli,
    remote: AuthenticatedRemote,
}

impl RepositoryPublisher {
    pub fn new(git: GitCli, remote: AuthenticatedRemote) -> Self {
        Self { git, remote }
    }

    pub fn remote(&self) -> &AuthenticatedRemote {
        &self.remote
    }

    /// Run the whole publish. Aborts at the first failing git command.
    pub fn publish(&self, request: &PublishRequest) -> PublishResult<PublishOutcome> {
        if !request.source_dir.is_dir() {
            return Err(PublishError::SourceMissing(request.source_dir.clone()));
        }

        self.prepare_clone(&request.repo_path, &request.default_branch)?;

        let branch = branch_name(&request.branch_prefix, &request.started_at);
        self.create_branch(&request.repo_path, &branch)?;

        let report = sync_tree(&request.source_dir, &request.repo_path)?;
        tracing::info!(
            "Synced {} into clone: {} added, {} updated, {} unchanged",
            request.source_dir.display(),
            report.added,
            report.updated,
            report.unchanged
        );

        let files = self.stage_changes(&request.repo_path)?;
        if files.is_empty() {
            tracing::info!("No changes to publish on {}", branch);
            return Ok(PublishOutcome::NoChanges { branch });
        }

        self.commit_and_push(&request.repo_path, &branch, &request.started_at)?;

        let pull_request_url = self.remote.pull_request_url(&branch);
        tracing::info!("Pushed {} file(s) to {}", files.len(), branch);
        tracing::info!("Open a pull request: {}", pull_request_url);

        Ok(PublishOutcome::Pushed {
            branch,
            files,
            pull_request_url,
        })
    }

    /// Clone if absent; otherwise refresh the remote URL, check out the
    /// default branch and pull.
    ///
    /// The remote URL is rewritten on every run so a rotated token takes
    /// effect.
    pub fn prepare_clone(&self, repo: &Path, default_branch: &str) -> PublishResult<()> {
        if !repo.join(".git").exists() {
            if let Some(parent) = repo.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| PublishError::Sync {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }

            tracing::info!("Cloning {} into {}", self.remote, repo.display());
            let clone = self
                .remote
                .append_url(self.git.command(None).arg("clone"))
                .arg(repo);
            self.git.run(PublishStage::Setup, &clone)?;

            // Future network operations must use the URL token, not a cached
            // credential.
            let unset = self
                .git
                .command(Some(repo))
                .args(["config", "--local", "--unset", "credential.helper"]);
            self.git
                .run_allowing(PublishStage::Setup, &unset, &[CONFIG_KEY_MISSING])?;
            return Ok(());
        }

        tracing::info!("Updating existing clone at {}", repo.display());
        let set_url = self
            .remote
            .append_url(self.git.command(Some(repo)).args(["remote", "set-url", "origin"]));
        self.git.run(PublishStage::Setup, &set_url)?;

        let checkout = self
            .git
            .command(Some(repo))
            .args(["checkout", default_branch]);
        self.git.run(PublishStage::Setup, &checkout)?;

        let pull = self
            .git
            .command(Some(repo))
            .args(["pull", "origin", default_branch]);
        self.git.run(PublishStage::Setup, &pull)?;
        Ok(())
    }

    fn create_branch(&self, repo: &Path, branch: &str) -> PublishResult<()> {
        let spec = self.git.command(Some(repo)).args(["checkout", "-b", branch]);
        self.git.run(PublishStage::Branch, &spec)?;
        Ok(())
    }

    /// Stage additions and modifications (never deletions) and list what
    /// is staged.
    fn stage_changes(&self, repo: &Path) -> PublishResult<Vec<String>> {
        let add = self
            .git
            .command(Some(repo))
            .args(["add", "--ignore-removal", "."]);
        self.git.run(PublishStage::Stage, &add)?;

        let diff = self
            .git
            .command(Some(repo))
            .args(["diff", "--cached", "--name-only"]);
        let output = self.git.run(PublishStage::Stage, &diff)?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn commit_and_push(&self, repo: &Path, branch: &str, at: &DateTime<Local>) -> PublishResult<()> {
        let message = format!("Upload via pipeline {}", at.format("%Y-%m-%d %H:%M:%S"));
        let commit = self
            .git
            .command(Some(repo))
            .args(["commit", "-m", message.as_str()]);
        self.git.run(PublishStage::Commit, &commit)?;

        let push = self
            .git
            .command(Some(repo))
            .args(["push", "-u", "origin", branch]);
        self.git.run(PublishStage::Push, &push)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::process::test_support::{ok, output, StubRunner};
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 31, 14, 2, 11).unwrap()
    }

    fn publisher(runner: Arc<StubRunner>) -> RepositoryPublisher {
        RepositoryPublisher::new(
            GitCli::new("git", runner),
            AuthenticatedRemote::new("github.com", "lab", "out", "alice", Secret::new("tok")),
        )
    }

    fn request(source: &Path, repo: &Path) -> PublishRequest {
        PublishRequest {
            source_dir: source.to_path_buf(),
            repo_path: repo.to_path_buf(),
            branch_prefix: "upload".into(),
            default_branch: "main".into(),
            started_at: at(),
        }
    }

    #[test]
    fn branch_names_use_second_granularity() {
        let a = branch_name("upload", &at());
        let b = branch_name("upload", &(at() + chrono::Duration::seconds(2)));
        assert_eq!(a, "upload-20250131-140211");
        assert_ne!(a, b);
    }

    #[test]
    fn existing_clone_refreshes_url_and_pushes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("out");
        let repo = dir.path().join("repo");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(source.join("12-34.json"), b"{}").unwrap();

        let runner = Arc::new(StubRunner::with_results(vec![
            ok(""),
            ok(""),
            ok(""),
            ok(""),
            ok(""),
            ok("12-34.json\n"),
            ok(""),
            ok(""),
        ]));
        let outcome = publisher(runner.clone())
            .publish(&request(&source, &repo))
            .unwrap();

        assert_eq!(
            outcome,
            PublishOutcome::Pushed {
                branch: "upload-20250131-140211".into(),
                files: vec!["12-34.json".into()],
                pull_request_url:
                    "https://github.com/lab/out/pull/new/upload-20250131-140211".into(),
            }
        );
        assert_eq!(
            runner.rendered_calls(),
            vec![
                "git remote set-url origin ********",
                "git checkout main",
                "git pull origin main",
                "git checkout -b upload-20250131-140211",
                "git add --ignore-removal .",
                "git diff --cached --name-only",
                "git commit -m Upload via pipeline 2025-01-31 14:02:11",
                "git push -u origin upload-20250131-140211",
            ]
        );
        assert!(repo.join("12-34.json").exists());
    }

    #[test]
    fn fresh_clone_strips_credential_helper() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("out");
        fs::create_dir_all(&source).unwrap();
        let repo = dir.path().join("clones/repo");

        let runner = Arc::new(StubRunner::with_results(vec![
            ok(""),
            Ok(output(5, "", "")),
            ok(""),
            ok(""),
            ok(""),
        ]));
        let outcome = publisher(runner.clone())
            .publish(&request(&source, &repo))
            .unwrap();

        assert!(matches!(outcome, PublishOutcome::NoChanges { .. }));
        let calls = runner.rendered_calls();
        assert_eq!(calls[0], format!("git clone ******** {}", repo.display()));
        assert_eq!(calls[1], "git config --local --unset credential.helper");
        assert!(!calls.iter().any(|c| c.contains("tok")));
        assert!(!calls.iter().any(|c| c.starts_with("git commit")));
    }

    #[test]
    fn pull_failure_aborts_before_branching() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("out");
        let repo = dir.path().join("repo");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(repo.join(".git")).unwrap();

        let runner = Arc::new(StubRunner::with_results(vec![
            ok(""),
            ok(""),
            Ok(output(1, "", "fatal: Authentication failed")),
        ]));
        let err = publisher(runner.clone())
            .publish(&request(&source, &repo))
            .unwrap_err();

        assert!(matches!(
            err,
            PublishError::Git {
                stage: PublishStage::Setup,
                ..
            }
        ));
        assert!(err.to_string().contains("Authentication failed"));
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn push_failure_is_reported() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("out");
        let repo = dir.path().join("repo");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(repo.join(".git")).unwrap();

        let runner = Arc::new(StubRunner::with_results(vec![
            ok(""),
            ok(""),
            ok(""),
            ok(""),
            ok(""),
            ok("a.json\n"),
            ok(""),
            Ok(output(128, "", "fatal: unable to access remote")),
        ]));
        let err = publisher(runner)
            .publish(&request(&source, &repo))
            .unwrap_err();
        assert!(matches!(
            err,
            PublishError::Git {
                stage: PublishStage::Push,
                ..
            }
        ));
    }
}
