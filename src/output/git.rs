//! Checkpoint publishers
//!
//! [`GitPublisher`] snapshots the dataset by committing it to the enclosing
//! git repository (and optionally pushing). [`LogPublisher`] only records
//! the checkpoint summary in the log.

use crate::output::traits::{CheckpointPublisher, OutputError, OutputResult, PublishOutcome};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Publishes checkpoints as git commits
#[derive(Debug, Clone)]
pub struct GitPublisher {
    repo_dir: PathBuf,
    dataset: PathBuf,
    push: bool,
    lfs: bool,
}

impl GitPublisher {
    /// Creates a publisher for `dataset` inside `repo_dir`
    ///
    /// # Arguments
    ///
    /// * `repo_dir` - Working directory of the repository
    /// * `dataset` - Path of the dataset file, as passed to `git add`
    /// * `push` - Push after each successful commit
    /// * `lfs` - Track the dataset with git LFS when it is first created
    pub fn new(repo_dir: &Path, dataset: &Path, push: bool, lfs: bool) -> Self {
        Self {
            repo_dir: repo_dir.to_path_buf(),
            dataset: dataset.to_path_buf(),
            push,
            lfs,
        }
    }

    fn git(&self, args: &[&str]) -> OutputResult<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .map_err(|e| OutputError::Command {
                command: format!("git {}", args.join(" ")),
                message: e.to_string(),
            })
    }

    /// Runs git and fails on a non-zero exit status
    fn git_checked(&self, args: &[&str]) -> OutputResult<Output> {
        let output = self.git(args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(OutputError::Command {
                command: format!("git {}", args.join(" ")),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn dataset_arg(&self) -> String {
        self.dataset.to_string_lossy().into_owned()
    }
}

impl CheckpointPublisher for GitPublisher {
    fn prepare(&mut self) -> OutputResult<()> {
        if self.lfs {
            let dataset = self.dataset_arg();
            self.git_checked(&["lfs", "track", &dataset])?;
            tracing::info!("Configured Git LFS to track {}", dataset);
        }
        Ok(())
    }

    fn publish(&mut self, summary: &str) -> OutputResult<PublishOutcome> {
        let dataset = self.dataset_arg();
        self.git_checked(&["add", &dataset])?;

        let commit = self.git(&["commit", "-m", summary])?;
        if !commit.status.success() {
            tracing::debug!(
                "git commit exited with {}: {}",
                commit.status,
                String::from_utf8_lossy(&commit.stdout).trim()
            );
            return Ok(PublishOutcome::NothingToPublish);
        }

        if self.push {
            self.git_checked(&["push"])?;
        }

        Ok(PublishOutcome::Published)
    }
}

/// Publisher that only logs checkpoint summaries
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

impl CheckpointPublisher for LogPublisher {
    fn publish(&mut self, summary: &str) -> OutputResult<PublishOutcome> {
        tracing::info!("Checkpoint: {}", summary);
        Ok(PublishOutcome::Published)
    }
}
