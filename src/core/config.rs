use crate::catalog::CatalogParams;
use crate::catalog::toml_checks::CheckSpec;
use crate::core::context::Iaas;
use crate::core::error::{AuditError, AuditResult, ConfigError, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for stemcell-audit
/// Searched in order: stemcell-audit.toml, .stemcell-audit.toml, .config/stemcell-audit.toml
///
/// # Example
///
/// ```toml
/// [settings]
/// timeout_secs = 30
/// iaas = "aws"
///
/// [params]
/// hostname = "bosh-stemcell"
/// grub_superuser = "vcap"
///
/// [[checks]]
/// file = "/etc/motd"
/// [[checks.assert]]
/// contains = "Unauthorized use is strictly prohibited"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
  #[serde(default)]
  pub settings: Settings,
  #[serde(default)]
  pub params: CatalogParams,
  #[serde(default)]
  pub checks: Vec<CheckSpec>,
}

/// Run settings; every field can be overridden from the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
  /// Per-command timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,

  /// Worker threads (default: number of CPUs)
  #[serde(default)]
  pub jobs: Option<usize>,

  /// Provider the stemcell targets; drives `exclude_on_*` tags
  #[serde(default)]
  pub iaas: Option<String>,

  /// Tracing filter directive (RUST_LOG wins when set)
  #[serde(default = "default_log_level")]
  pub log_level: String,

  #[serde(default)]
  pub log_format: LogFormat,
}

fn default_timeout_secs() -> u64 {
  60
}

fn default_log_level() -> String {
  "warn".to_string()
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
      jobs: None,
      iaas: None,
      log_level: default_log_level(),
      log_format: LogFormat::default(),
    }
  }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
  /// Human-readable lines
  #[default]
  Text,
  /// One JSON object per event
  Json,
}

impl Settings {
  /// Validate settings
  pub fn validate(&self) -> AuditResult<()> {
    if self.timeout_secs == 0 {
      return Err(invalid_setting("timeout_secs", "must be at least 1 second"));
    }

    if self.jobs == Some(0) {
      return Err(invalid_setting("jobs", "must be at least 1"));
    }

    if self.log_level.trim().is_empty() {
      return Err(invalid_setting("log_level", "must not be empty"));
    }

    self.iaas()?;
    Ok(())
  }

  /// Parsed IaaS, if configured
  pub fn iaas(&self) -> AuditResult<Option<Iaas>> {
    self.iaas.as_deref().map(str::parse).transpose()
  }
}

fn invalid_setting(field: &str, reason: &str) -> AuditError {
  AuditError::Config(ConfigError::InvalidSetting {
    field: format!("settings.{}", field),
    reason: reason.to_string(),
  })
}

impl AuditConfig {
  /// Find config file in search order: stemcell-audit.toml, .stemcell-audit.toml, .config/stemcell-audit.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("stemcell-audit.toml"),
      path.join(".stemcell-audit.toml"),
      path.join(".config").join("stemcell-audit.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load configuration.
  ///
  /// An explicit path must exist. Without one, the search order above is tried
  /// in `cwd` and built-in defaults are used when nothing is found.
  pub fn load(explicit: Option<&Path>, cwd: &Path) -> AuditResult<Self> {
    let config_path = match explicit {
      Some(path) if !path.exists() => {
        return Err(AuditError::Config(ConfigError::NotFound {
          path: path.to_path_buf(),
        }));
      }
      Some(path) => path.to_path_buf(),
      None => match Self::find_config_path(cwd) {
        Some(path) => path,
        None => {
          tracing::debug!(cwd = %cwd.display(), "no configuration file found, using defaults");
          return Ok(Self::default());
        }
      },
    };

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config = Self::parse(&content).with_context(|| format!("Invalid config in {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), checks = config.checks.len(), "loaded configuration");
    Ok(config)
  }

  /// Parse and validate configuration text
  pub fn parse(content: &str) -> AuditResult<Self> {
    let config: AuditConfig = toml_edit::de::from_str(content)?;
    config.settings.validate()?;
    Ok(config)
  }
}
