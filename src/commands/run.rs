//! `run`: evaluate the catalog and report

use crate::catalog;
use crate::checks::{CheckRunner, Subject};
use crate::core::config::AuditConfig;
use crate::core::context::ExecutionContext;
use crate::core::error::{AuditError, AuditResult};
use crate::target::LocalSystem;
use crate::ui::report::RunReport;
use chrono::Utc;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options for one audit run; `None` falls back to `[settings]`
#[derive(Debug, Clone)]
pub struct RunOptions {
  pub root: PathBuf,
  pub chroot: bool,
  pub jobs: Option<usize>,
  pub timeout_secs: Option<u64>,
  pub no_builtin: bool,
  pub filter: Option<String>,
  pub json: bool,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      root: PathBuf::from("/"),
      chroot: false,
      jobs: None,
      timeout_secs: None,
      no_builtin: false,
      filter: None,
      json: false,
    }
  }
}

/// Run the audit.
///
/// Returns `Err(AuditError::ChecksFailed)` after printing the report when any
/// check failed, so the caller exits with the validation code.
pub fn run_audit(config: &AuditConfig, ctx: &ExecutionContext, options: &RunOptions) -> AuditResult<()> {
  let mut settings = config.settings.clone();
  if let Some(jobs) = options.jobs {
    settings.jobs = Some(jobs);
  }
  if let Some(timeout) = options.timeout_secs {
    settings.timeout_secs = timeout;
  }
  settings.validate()?;

  let mut catalog = catalog::assemble(config, !options.no_builtin)?;
  if let Some(needle) = &options.filter {
    catalog = catalog.filter(needle);
  }
  if catalog.is_empty() {
    return Err(AuditError::with_help(
      "No checks to run",
      "Drop --filter or --no-builtin, or declare [[checks]] in stemcell-audit.toml.",
    ));
  }

  let system = LocalSystem::new(&options.root, options.chroot, Duration::from_secs(settings.timeout_secs))?;

  let commands = catalog
    .checks()
    .iter()
    .filter(|check| matches!(check.subject, Subject::Command { .. }))
    .count();
  if commands > 0 && !options.chroot && options.root != Path::new("/") {
    tracing::warn!(
      commands,
      root = %options.root.display(),
      "command checks need --chroot to inspect an image and will fail"
    );
  }

  let runner = CheckRunner::new(settings.jobs)?.with_progress(!options.json && std::io::stderr().is_terminal());

  tracing::info!(
    checks = catalog.len(),
    root = %options.root.display(),
    chroot = options.chroot,
    "starting audit"
  );
  let started_at = Utc::now();
  let results = runner.run_all(catalog.checks(), ctx, &system);
  let report = RunReport::new(started_at, Utc::now(), ctx.summary(), results);

  if options.json {
    println!("{}", report.to_json()?);
  } else {
    print!("{}", report.render_text());
  }

  tracing::info!(
    passed = report.summary.passed,
    failed = report.summary.failed,
    skipped = report.summary.skipped,
    "audit finished"
  );

  if report.summary.failed > 0 {
    return Err(AuditError::ChecksFailed {
      failed: report.summary.failed,
      total: report.summary.total,
    });
  }
  Ok(())
}
