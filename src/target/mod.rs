//! Target-system access
//!
//! Checks only ever need two things from the system under audit: the metadata
//! and content of a file, and the output of a shell command. [`SystemAccess`]
//! is that seam. [`LocalSystem`] implements it for the running host or a
//! mounted image; tests use an in-memory recording stub.

mod local;

pub use local::LocalSystem;

use crate::checks::Subject;
use serde::Serialize;
use std::fmt;

/// What kind of filesystem object a path resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
  File,
  Directory,
  Other,
}

/// File metadata with ownership already resolved to names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
  pub kind: FileKind,
  /// Permission bits including setuid/setgid/sticky (`st_mode & 0o7777`)
  pub mode: u32,
  pub owner: String,
  pub group: String,
}

/// A resolved file subject
#[derive(Debug, Clone)]
pub struct FileSnapshot {
  pub path: String,
  pub meta: FileMeta,
  /// Loaded only when an assertion needs it
  pub content: Option<String>,
}

/// A resolved command subject
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  pub stdout: String,
  pub stderr: String,
  /// `None` when the process was terminated by a signal
  pub exit_status: Option<i32>,
}

/// A subject after resolution
#[derive(Debug, Clone)]
pub enum Observed {
  File(FileSnapshot),
  Command(CommandOutput),
}

/// Why a subject could not be resolved. Recorded on the check, never fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectError {
  /// The file path does not exist
  NotFound { path: String },
  /// The file exists but could not be inspected or read
  Unreadable { path: String, reason: String },
  /// The command could not be started
  Execution { command: String, reason: String },
  /// The command did not finish in time and was killed
  TimedOut { command: String, timeout_secs: u64 },
}

impl SubjectError {
  /// Stable machine-readable kind
  pub fn kind(&self) -> &'static str {
    match self {
      SubjectError::NotFound { .. } => "subject_not_found",
      SubjectError::Unreadable { .. } => "subject_unreadable",
      SubjectError::Execution { .. } => "execution_error",
      SubjectError::TimedOut { .. } => "execution_timeout",
    }
  }
}

impl fmt::Display for SubjectError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SubjectError::NotFound { path } => write!(f, "{} does not exist", path),
      SubjectError::Unreadable { path, reason } => write!(f, "cannot read {}: {}", path, reason),
      SubjectError::Execution { command, reason } => {
        write!(f, "cannot execute `{}`: {}", command, reason)
      }
      SubjectError::TimedOut { command, timeout_secs } => {
        write!(f, "`{}` timed out after {}s", command, timeout_secs)
      }
    }
  }
}

/// Read-only access to the system under audit
pub trait SystemAccess: Send + Sync {
  /// Inspect a path. Symlinks are followed.
  fn stat(&self, path: &str) -> Result<FileMeta, SubjectError>;

  /// Read a file's bytes
  fn read(&self, path: &str) -> Result<Vec<u8>, SubjectError>;

  /// Run a shell command and capture its output.
  /// Only failure to run at all is an error; a non-zero exit is a result.
  fn run(&self, command: &str) -> Result<CommandOutput, SubjectError>;
}

/// Resolve a subject against the target system
pub fn resolve(subject: &Subject, load_content: bool, system: &dyn SystemAccess) -> Result<Observed, SubjectError> {
  match subject {
    Subject::File { path } => {
      let meta = system.stat(path)?;
      let content = if load_content {
        let bytes = system.read(path)?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
      } else {
        None
      };
      Ok(Observed::File(FileSnapshot {
        path: path.clone(),
        meta,
        content,
      }))
    }
    Subject::Command { command } => system.run(command).map(Observed::Command),
  }
}
