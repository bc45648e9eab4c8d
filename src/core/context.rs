//! Execution context - the explicit description of the platform being audited
//!
//! The context is built once in `main.rs` from CLI flags, configuration and a
//! one-time snapshot of the process environment, then passed by reference to
//! everything that needs to decide whether a check applies. Nothing below
//! `main.rs` reads the process environment directly.

use crate::core::error::{AuditError, ConfigError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Environment variable carrying the OS family (e.g. `centos`, `rhel`)
pub const OS_NAME_VAR: &str = "OS_NAME";
/// Environment variable carrying the OS major version (e.g. `7`, `8`)
pub const OS_VERSION_VAR: &str = "OS_VERSION";

/// Tag prefix that excludes a check on one infrastructure provider
pub const EXCLUDE_TAG_PREFIX: &str = "exclude_on_";

/// Infrastructure providers a stemcell can be built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Iaas {
  Aws,
  Azure,
  Google,
  Openstack,
  Vcloud,
  Vsphere,
  Warden,
}

impl Iaas {
  /// Every known provider, in a stable order
  pub const ALL: [Iaas; 7] = [
    Iaas::Aws,
    Iaas::Azure,
    Iaas::Google,
    Iaas::Openstack,
    Iaas::Vcloud,
    Iaas::Vsphere,
    Iaas::Warden,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Iaas::Aws => "aws",
      Iaas::Azure => "azure",
      Iaas::Google => "google",
      Iaas::Openstack => "openstack",
      Iaas::Vcloud => "vcloud",
      Iaas::Vsphere => "vsphere",
      Iaas::Warden => "warden",
    }
  }

  /// The tag that excludes a check on this provider, e.g. `exclude_on_azure`
  pub fn exclusion_tag(self) -> String {
    format!("{}{}", EXCLUDE_TAG_PREFIX, self.as_str())
  }

  /// Exclusion tags for every provider except `self`
  pub fn exclusive_tags(self) -> Vec<String> {
    Iaas::ALL
      .iter()
      .filter(|other| **other != self)
      .map(|other| other.exclusion_tag())
      .collect()
  }
}

impl fmt::Display for Iaas {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Iaas {
  type Err = AuditError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_ascii_lowercase();
    Iaas::ALL
      .iter()
      .copied()
      .find(|iaas| iaas.as_str() == wanted)
      .ok_or_else(|| {
        AuditError::Config(ConfigError::InvalidSetting {
          field: "iaas".to_string(),
          reason: format!(
            "unknown IaaS '{}' (expected one of: {})",
            s,
            Iaas::ALL.iter().map(|i| i.as_str()).collect::<Vec<_>>().join(", ")
          ),
        })
      })
  }
}

/// Snapshot of the platform a run is evaluated against
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
  /// Provider the stemcell was built for; `None` disables tag exclusion
  pub iaas: Option<Iaas>,
  /// Environment variables visible to skip conditions
  env: BTreeMap<String, String>,
}

/// The part of the context that is safe and useful to print in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSummary {
  pub iaas: Option<Iaas>,
  pub os_name: Option<String>,
  pub os_version: Option<String>,
}

impl ExecutionContext {
  pub fn new<I>(iaas: Option<Iaas>, env: I) -> Self
  where
    I: IntoIterator<Item = (String, String)>,
  {
    Self {
      iaas,
      env: env.into_iter().collect(),
    }
  }

  /// Override (or add) one variable
  pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(name.into(), value.into());
    self
  }

  pub fn var(&self, name: &str) -> Option<&str> {
    self.env.get(name).map(String::as_str)
  }

  /// Returns the provider a tag excludes us on, if it applies to this context
  pub fn excluded_by(&self, tag: &str) -> Option<Iaas> {
    let iaas = self.iaas?;
    let target = tag.strip_prefix(EXCLUDE_TAG_PREFIX)?;
    (target == iaas.as_str()).then_some(iaas)
  }

  pub fn summary(&self) -> ContextSummary {
    ContextSummary {
      iaas: self.iaas,
      os_name: self.var(OS_NAME_VAR).map(str::to_string),
      os_version: self.var(OS_VERSION_VAR).map(str::to_string),
    }
  }
}
