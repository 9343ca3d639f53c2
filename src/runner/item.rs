use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RunnerError;

/// One external command to run as an independent unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    program: String,
    args: Vec<String>,
    label: Option<String>,
    stdout: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl WorkItem {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            label: None,
            stdout: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Name used in logs and reports. Defaults to the command line.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Send the item's stdout to `path` (created or truncated at start).
    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Kill the item if it is still running `timeout` after it started.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn stdout_path(&self) -> Option<&Path> {
        self.stdout.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None if self.args.is_empty() => self.program.clone(),
            None => format!("{} {}", self.program, self.args.join(" ")),
        }
    }

    /// Start the process. Any failure here is a start-up error, not an item failure.
    ///
    /// An existing output file is left alone until the process is running.
    pub(crate) async fn spawn(&self) -> Result<(Child, Option<StagedOutput>), RunnerError> {
        let spawn_err = |source: io::Error| RunnerError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());

        let staged = match &self.stdout {
            Some(path) => {
                let (staged, file) = StagedOutput::create(path).await.map_err(spawn_err)?;
                cmd.stdout(Stdio::from(file));
                Some(staged)
            }
            None => None,
        };

        debug!(target: "skimrun::runner", program = %self.program, args = ?self.args, "spawn");
        match cmd.spawn() {
            Ok(child) => Ok((child, staged)),
            Err(e) => {
                if let Some(staged) = staged {
                    staged.discard().await;
                }
                Err(spawn_err(e))
            }
        }
    }
}

/// Output file written under a hidden name next to its target until the
/// item has started, so a failed start never truncates the previous output.
#[derive(Debug)]
pub(crate) struct StagedOutput {
    staged: PathBuf,
    target: PathBuf,
    created_target: bool,
}

impl StagedOutput {
    async fn create(target: &Path) -> io::Result<(Self, std::fs::File)> {
        let existed = fs::try_exists(target).await?;
        // Opening without truncation rejects names the directory cannot hold.
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(target)
            .await?;

        let staged = target.with_file_name(format!(".skimrun-{}", Uuid::new_v4().simple()));
        let file = fs::File::create(&staged).await?.into_std().await;
        Ok((
            Self {
                staged,
                target: target.to_path_buf(),
                created_target: !existed,
            },
            file,
        ))
    }

    /// Move the output into place; the running process keeps writing to it.
    pub(crate) async fn commit(self) {
        if let Err(e) = fs::rename(&self.staged, &self.target).await {
            warn!(
                target: "skimrun::runner",
                staged = %self.staged.display(),
                output = %self.target.display(),
                error = %e,
                "could not move output into place"
            );
        }
    }

    async fn discard(self) {
        let _ = fs::remove_file(&self.staged).await;
        if self.created_target {
            let _ = fs::remove_file(&self.target).await;
        }
    }
}

/// How a work item ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemStatus {
    Exited { code: i32 },
    Signaled { signal: Option<i32> },
    TimedOut,
    /// Waiting on the child failed, or its task panicked.
    Lost { reason: String },
}

impl ItemStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemStatus::Exited { code: 0 })
    }
}

impl From<ExitStatus> for ItemStatus {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ItemStatus::Exited { code };
        }

        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        ItemStatus::Signaled { signal }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Exited { code } => write!(f, "exit {code}"),
            ItemStatus::Signaled { signal: Some(sig) } => write!(f, "killed by signal {sig}"),
            ItemStatus::Signaled { signal: None } => write!(f, "killed by signal"),
            ItemStatus::TimedOut => write!(f, "timed out"),
            ItemStatus::Lost { reason } => write!(f, "lost: {reason}"),
        }
    }
}

/// Per-item record collected while draining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Position in submission order.
    pub index: usize,
    pub label: String,
    pub status: ItemStatus,
    pub elapsed_ms: u64,
}

/// Wait for `child`, killing it once `deadline` passes.
pub(crate) async fn supervise(child: &mut Child, deadline: Option<Instant>) -> ItemStatus {
    let waited = match deadline {
        Some(at) => match tokio::time::timeout_at(at, child.wait()).await {
            Ok(waited) => waited,
            Err(_) => {
                debug!(target: "skimrun::runner", "deadline passed; killing child");
                if let Err(e) = child.kill().await {
                    warn!(target: "skimrun::runner", error = %e, "failed to kill timed-out child");
                }
                return ItemStatus::TimedOut;
            }
        },
        None => child.wait().await,
    };

    match waited {
        Ok(status) => status.into(),
        Err(e) => ItemStatus::Lost {
            reason: format!("wait: {e}"),
        },
    }
}
