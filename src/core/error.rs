//! Error types for stemcell-audit with contextual messages and exit codes
//!
//! Only errors that stop a run live here (bad configuration, an unusable target,
//! failed checks at the very end). Problems with a single check's subject are
//! recorded on that check's result instead; see [`crate::target::SubjectError`].

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for stemcell-audit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (I/O, worker pool, target root)
  System = 2,
  /// Validation failure (one or more checks failed)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for stemcell-audit
#[derive(Debug)]
pub enum AuditError {
  /// Configuration and catalog errors
  Config(ConfigError),

  /// Target-system access errors that prevent the run from starting
  Target(TargetError),

  /// The run completed but some checks failed
  ChecksFailed { failed: usize, total: usize },

  /// I/O errors
  Io(io::Error),

  /// A typed error with added context; exit code and help come from the inner error
  Context { error: Box<AuditError>, context: String },

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl AuditError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    AuditError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    AuditError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      AuditError::Message { message, context, help } => AuditError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      AuditError::Io(err) => AuditError::Message {
        message: format!("I/O error: {}", err),
        context: Some(ctx_str),
        help: None,
      },
      AuditError::Context { error, context } => AuditError::Context {
        error,
        context: format!("{}\n{}", ctx_str, context),
      },
      AuditError::Config(_) | AuditError::Target(_) => AuditError::Context {
        error: Box::new(self),
        context: ctx_str,
      },
      AuditError::ChecksFailed { .. } => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      AuditError::Config(_) => ExitCode::User,
      AuditError::Target(_) => ExitCode::System,
      AuditError::ChecksFailed { .. } => ExitCode::Validation,
      AuditError::Io(_) => ExitCode::System,
      AuditError::Message { .. } => ExitCode::User,
      AuditError::Context { error, .. } => error.exit_code(),
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      AuditError::Config(e) => e.help_message(),
      AuditError::Target(e) => e.help_message(),
      AuditError::ChecksFailed { .. } => {
        Some("Re-run with --json for machine-readable failure details.".to_string())
      }
      AuditError::Message { help, .. } => help.clone(),
      AuditError::Io(_) => None,
      AuditError::Context { error, .. } => error.help_message(),
    }
  }
}

impl fmt::Display for AuditError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AuditError::Config(e) => write!(f, "{}", e),
      AuditError::Target(e) => write!(f, "{}", e),
      AuditError::ChecksFailed { failed, total } => {
        write!(f, "{} of {} check(s) failed", failed, total)
      }
      AuditError::Io(e) => write!(f, "I/O error: {}", e),
      AuditError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
      AuditError::Context { error, context } => write!(f, "{}\n{}", error, context),
    }
  }
}

impl std::error::Error for AuditError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      AuditError::Io(e) => Some(e),
      AuditError::Context { error, .. } => Some(error.as_ref()),
      _ => None,
    }
  }
}

impl From<io::Error> for AuditError {
  fn from(err: io::Error) -> Self {
    AuditError::Io(err)
  }
}

impl From<String> for AuditError {
  fn from(msg: String) -> Self {
    AuditError::message(msg)
  }
}

impl From<&str> for AuditError {
  fn from(msg: &str) -> Self {
    AuditError::message(msg)
  }
}

impl From<ConfigError> for AuditError {
  fn from(err: ConfigError) -> Self {
    AuditError::Config(err)
  }
}

impl From<TargetError> for AuditError {
  fn from(err: TargetError) -> Self {
    AuditError::Target(err)
  }
}

impl From<toml_edit::de::Error> for AuditError {
  fn from(err: toml_edit::de::Error) -> Self {
    AuditError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for AuditError {
  fn from(err: serde_json::Error) -> Self {
    AuditError::message(format!("JSON error: {}", err))
  }
}

impl From<rayon::ThreadPoolBuildError> for AuditError {
  fn from(err: rayon::ThreadPoolBuildError) -> Self {
    AuditError::Target(TargetError::WorkerPool {
      reason: err.to_string(),
    })
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// An explicitly requested config file does not exist
  NotFound { path: PathBuf },

  /// A setting has an unusable value
  InvalidSetting { field: String, reason: String },

  /// A check definition is structurally wrong
  InvalidCheck { check: String, reason: String },

  /// A regular expression in a check does not compile
  InvalidPattern {
    check: String,
    pattern: String,
    reason: String,
  },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => Some(
        "Pass an existing file to --config, or omit it to search for stemcell-audit.toml in the current directory."
          .to_string(),
      ),
      ConfigError::InvalidCheck { .. } => Some(
        "Each [[checks]] entry needs exactly one of `file`/`command`, and each [[checks.assert]] exactly one matcher key."
          .to_string(),
      ),
      ConfigError::InvalidPattern { .. } => {
        Some("Patterns use Rust regex syntax; escape literal metacharacters such as `(` or `+`.".to_string())
      }
      ConfigError::InvalidSetting { .. } => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { path } => {
        write!(f, "Configuration file not found: {}", path.display())
      }
      ConfigError::InvalidSetting { field, reason } => {
        write!(f, "Invalid setting '{}': {}", field, reason)
      }
      ConfigError::InvalidCheck { check, reason } => {
        write!(f, "Invalid check '{}': {}", check, reason)
      }
      ConfigError::InvalidPattern { check, pattern, reason } => {
        write!(f, "Invalid pattern /{}/ in check '{}': {}", pattern, check, reason)
      }
    }
  }
}

/// Errors that make the target system unusable as a whole
#[derive(Debug)]
pub enum TargetError {
  /// The image root does not exist or is not a directory
  RootNotFound { path: PathBuf },

  /// The worker pool could not be created
  WorkerPool { reason: String },
}

impl TargetError {
  fn help_message(&self) -> Option<String> {
    match self {
      TargetError::RootNotFound { .. } => {
        Some("Mount the stemcell image first, or pass --root / to inspect the running system.".to_string())
      }
      TargetError::WorkerPool { .. } => Some("Try again with a smaller --jobs value.".to_string()),
    }
  }
}

impl fmt::Display for TargetError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TargetError::RootNotFound { path } => {
        write!(f, "Target root not found or not a directory: {}", path.display())
      }
      TargetError::WorkerPool { reason } => {
        write!(f, "Failed to start worker pool: {}", reason)
      }
    }
  }
}

/// Result type alias for stemcell-audit
pub type AuditResult<T> = Result<T, AuditError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> AuditResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> AuditResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<AuditError>,
{
  fn context(self, ctx: impl Into<String>) -> AuditResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> AuditResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &AuditError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
