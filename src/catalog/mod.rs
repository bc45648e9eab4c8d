//! Check catalogs: the built-in CentOS/RHEL checks plus configured ones

pub mod builder;
mod centos_rhel;
pub mod toml_checks;

pub use builder::CatalogBuilder;
pub use centos_rhel::{CatalogParams, centos_rhel};

use crate::checks::Check;
use crate::core::config::AuditConfig;
use crate::core::error::AuditResult;
use serde::Serialize;

/// An ordered, immutable list of checks
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  checks: Vec<Check>,
}

/// A structural problem found by [`Catalog::lint`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogIssue {
  pub id: usize,
  pub description: String,
  pub message: String,
}

impl Catalog {
  pub(crate) fn new(checks: Vec<Check>) -> Self {
    Self { checks }
  }

  pub fn checks(&self) -> &[Check] {
    &self.checks
  }

  pub fn len(&self) -> usize {
    self.checks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.checks.is_empty()
  }

  /// Keep checks whose description contains `needle`; ids are preserved
  pub fn filter(self, needle: &str) -> Self {
    Self {
      checks: self
        .checks
        .into_iter()
        .filter(|c| c.description.contains(needle))
        .collect(),
    }
  }

  /// Matchers attached to a subject kind they cannot inspect
  pub fn lint(&self) -> Vec<CatalogIssue> {
    let mut issues = Vec::new();
    for check in &self.checks {
      let kind = check.subject.kind();
      for (i, assertion) in check.assertions.iter().enumerate() {
        if !assertion.matcher.supports(kind) {
          issues.push(CatalogIssue {
            id: check.id,
            description: check.description.clone(),
            message: format!(
              "assertion {} (`{}`) is not applicable to a {} subject",
              i + 1,
              assertion.matcher.describe(),
              kind
            ),
          });
        }
      }
    }
    issues
  }
}

/// Build the catalog for a run: built-in checks first (unless disabled), then configured ones
pub fn assemble(config: &AuditConfig, include_builtin: bool) -> AuditResult<Catalog> {
  let mut builder = CatalogBuilder::new();
  if include_builtin {
    centos_rhel(&config.params, &mut builder);
  }
  let builtin = builder.len();
  toml_checks::append_checks(&config.checks, &mut builder)?;
  tracing::debug!(builtin, configured = builder.len() - builtin, "assembled catalog");
  builder.build()
}
