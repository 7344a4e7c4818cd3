use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::costs::ModelCost;
use crate::trailer;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {args} failed: {stderr}")]
    Failed { args: String, stderr: String },
}

/// Captured result of one git invocation.
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    fn into_stdout(self, args: &[&str]) -> Result<String, GitError> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(GitError::Failed {
                args: args.join(" "),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// The git operations the commit workflow relies on.
pub trait GitClient {
    /// Run git with `args`. Only a spawn failure is an `Err`; a non-zero
    /// exit is reported through `GitOutput::success`.
    fn exec_git(&self, args: &[&str]) -> Result<GitOutput, GitError>;

    /// Commit the staged tree with `message`.
    fn commit(&self, message: &str) -> Result<GitOutput, GitError>;

    fn head_sha(&self) -> Option<String> {
        let args = ["rev-parse", "HEAD"];
        let sha = self.exec_git(&args).ok()?.into_stdout(&args).ok()?;
        let sha = sha.trim();
        (!sha.is_empty()).then(|| sha.to_string())
    }

    fn staged_files(&self) -> Result<Vec<String>, GitError> {
        let args = ["diff", "--cached", "--name-only"];
        let out = self.exec_git(&args)?.into_stdout(&args)?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Costs from the most recent commit carrying a cost trailer. Any git
    /// failure (not a repository, no commits) yields an empty list.
    fn previous_cost_metrics(&self) -> Vec<ModelCost> {
        let args = ["log", trailer::LOG_FORMAT];
        match self.exec_git(&args).and_then(|o| o.into_stdout(&args)) {
            Ok(log) => trailer::scan_history(&log),
            Err(e) => {
                tracing::debug!(error = %e, "no commit history to scan");
                Vec::new()
            }
        }
    }
}

/// `git` executable run against a repository directory.
pub struct SystemGit {
    repo: PathBuf,
}

impl SystemGit {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }
}

impl GitClient for SystemGit {
    fn exec_git(&self, args: &[&str]) -> Result<GitOutput, GitError> {
        tracing::debug!(?args, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .stdin(Stdio::null())
            .output()?;

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn commit(&self, message: &str) -> Result<GitOutput, GitError> {
        let mut child = Command::new("git")
            .args(["commit", "-F", "-"])
            .current_dir(&self.repo)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(message.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        // git reports "nothing to commit" on stdout
        if !output.status.success() && stderr.trim().is_empty() {
            stderr = stdout.clone();
        }

        Ok(GitOutput {
            success: output.status.success(),
            stdout,
            stderr,
        })
    }
}
