//! `validate`: check the configuration and catalog without running anything

use crate::catalog::{self, CatalogIssue};
use crate::core::config::AuditConfig;
use crate::core::error::{AuditError, AuditResult};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ValidationReport {
  valid: bool,
  checks: usize,
  issues: Vec<CatalogIssue>,
}

/// Validate the catalog.
///
/// Configuration and pattern errors surface while assembling; matchers that
/// do not suit their subject kind are collected and reported together.
pub fn run_validate(config: &AuditConfig, no_builtin: bool, json: bool) -> AuditResult<()> {
  let catalog = catalog::assemble(config, !no_builtin)?;
  let issues = catalog.lint();
  let report = ValidationReport {
    valid: issues.is_empty(),
    checks: catalog.len(),
    issues,
  };

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else if report.valid {
    println!("✅ {} check(s) valid", report.checks);
  } else {
    for issue in &report.issues {
      println!("❌ [{}] {}", issue.id, issue.description);
      println!("   {}", issue.message);
    }
  }

  if report.valid {
    Ok(())
  } else {
    Err(AuditError::with_help(
      format!("{} problem(s) found in {} check(s)", report.issues.len(), report.checks),
      "File subjects support mode/owner/group/is_file; command subjects support token_set/exit_status.",
    ))
  }
}
