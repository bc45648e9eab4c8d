//! Check runner for executing a catalog against a target system

use super::model::{AssertionFailure, Check, RunResult};
use super::skip::skip_reason;
use crate::core::context::ExecutionContext;
use crate::core::error::AuditResult;
use crate::target::{SystemAccess, resolve};
use crate::ui::progress::CheckProgress;
use rayon::prelude::*;
use std::time::Instant;

/// Check runner that executes checks on a bounded worker pool
///
/// Checks are independent and read-only, so they may run in any order;
/// results always come back in declaration order.
pub struct CheckRunner {
  pool: rayon::ThreadPool,
  show_progress: bool,
}

impl CheckRunner {
  /// Create a runner with `jobs` worker threads (default: number of CPUs)
  pub fn new(jobs: Option<usize>) -> AuditResult<Self> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("stemcell-audit-{}", i));
    if let Some(jobs) = jobs {
      builder = builder.num_threads(jobs);
    }
    Ok(Self {
      pool: builder.build()?,
      show_progress: false,
    })
  }

  /// Draw a progress bar on stderr while running
  pub fn with_progress(mut self, show: bool) -> Self {
    self.show_progress = show;
    self
  }

  /// Run all checks and collect results in declaration order
  pub fn run_all(&self, checks: &[Check], ctx: &ExecutionContext, system: &dyn SystemAccess) -> Vec<RunResult> {
    let progress = self
      .show_progress
      .then(|| CheckProgress::new(checks.len(), "Auditing stemcell"));

    self.pool.install(|| {
      checks
        .par_iter()
        .map(|check| {
          let result = run_check(check, ctx, system);
          if let Some(progress) = &progress {
            progress.inc();
          }
          result
        })
        .collect()
    })
  }
}

/// Run a single check: decide applicability, resolve the subject, evaluate every assertion
pub fn run_check(check: &Check, ctx: &ExecutionContext, system: &dyn SystemAccess) -> RunResult {
  if let Some(reason) = skip_reason(check, ctx) {
    tracing::debug!(id = check.id, check = %check.description, %reason, "skipped");
    return RunResult::skipped(check, reason);
  }

  let started = Instant::now();
  let observed = match resolve(&check.subject, check.needs_content(), system) {
    Ok(observed) => observed,
    Err(err) => {
      tracing::warn!(id = check.id, subject = %check.subject, error = %err, "subject unavailable");
      return RunResult::subject_failed(check, &err, elapsed_ms(started));
    }
  };

  // Every assertion is attempted; one failure does not hide the next
  let failures: Vec<AssertionFailure> = check
    .assertions
    .iter()
    .enumerate()
    .filter_map(|(i, assertion)| {
      assertion
        .matcher
        .check(&observed)
        .err()
        .map(|mismatch| AssertionFailure::new(i + 1, assertion, mismatch))
    })
    .collect();

  for failure in &failures {
    tracing::info!(
      id = check.id,
      subject = %check.subject,
      assertion = %failure.label,
      expected = %failure.expected,
      actual = %failure.actual,
      "assertion failed"
    );
  }

  RunResult::evaluated(check, failures, elapsed_ms(started))
}

fn elapsed_ms(started: Instant) -> u64 {
  u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::CatalogBuilder;
  use crate::checks::model::Outcome;
  use crate::checks::skip::SkipCondition;
  use crate::core::context::Iaas;
  use crate::target::testing::RecordingSystem;

  fn rhel8_ctx() -> ExecutionContext {
    ExecutionContext::new(None, Vec::new())
      .with_var("OS_NAME", "rhel")
      .with_var("OS_VERSION", "8")
  }

  fn single(build: impl FnOnce(&mut CatalogBuilder)) -> Check {
    let mut builder = CatalogBuilder::new();
    build(&mut builder);
    let catalog = builder.build().unwrap();
    catalog.checks()[0].clone()
  }

  #[test]
  fn test_hostname_scenario_passes() {
    let check = single(|b| {
      b.group("hostname", |g| {
        g.file("/etc/hostname").equals("bosh-stemcell\n");
      });
    });
    let system = RecordingSystem::new().with_file("/etc/hostname", "bosh-stemcell\n");
    let result = run_check(&check, &ExecutionContext::default(), &system);
    assert_eq!(result.outcome, Outcome::Passed);
    assert_eq!(result.assertions_run, 1);
  }

  #[test]
  fn test_sshd_scenario_fails_with_details() {
    let check = single(|b| {
      b.group("sshd", |g| {
        g.file("/etc/ssh/sshd_config").matches("^PermitRootLogin no$");
      });
    });
    let system = RecordingSystem::new().with_file("/etc/ssh/sshd_config", "PermitRootLogin yes");
    let result = run_check(&check, &ExecutionContext::default(), &system);

    assert_eq!(result.outcome, Outcome::Failed);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].expected, "/^PermitRootLogin no$/");
    assert_eq!(result.failures[0].actual, "PermitRootLogin yes");
  }

  #[test]
  fn test_skipped_check_never_touches_subject() {
    let check = single(|b| {
      b.group("kernel", |g| {
        g.command("ls -1 /lib/modules | wc -l")
          .skip_if(
            SkipCondition::new("inapplicable to RHEL 8")
              .when_env("OS_NAME", "rhel")
              .when_env("OS_VERSION", "8"),
          )
          .equals("1\n");
      });
    });
    let system = RecordingSystem::new();
    let result = run_check(&check, &rhel8_ctx(), &system);

    assert_eq!(result.outcome, Outcome::Skipped);
    assert_eq!(result.skip_reason.as_deref(), Some("inapplicable to RHEL 8"));
    assert!(system.accesses().is_empty());
  }

  #[test]
  fn test_excluded_iaas_never_touches_subject() {
    let check = single(|b| {
      b.group_tagged("network", &["exclude_on_warden"], |g| {
        g.file("/etc/hostname").is_file();
      });
    });
    let system = RecordingSystem::new();
    let ctx = ExecutionContext::new(Some(Iaas::Warden), Vec::new());
    let result = run_check(&check, &ctx, &system);

    assert_eq!(result.outcome, Outcome::Skipped);
    assert!(system.accesses().is_empty());
  }

  #[test]
  fn test_setuid_scenario_is_order_independent() {
    let command = "find / -xdev -perm /ug=s -type f";
    let check = single(|b| {
      b.group("setuid", |g| {
        g.command(command).token_set(["/usr/bin/su", "/usr/bin/sudo"]);
      });
    });
    let system = RecordingSystem::new().with_command(command, "/usr/bin/sudo\n/usr/bin/su\n", 0);
    let result = run_check(&check, &ExecutionContext::default(), &system);
    assert_eq!(result.outcome, Outcome::Passed);
  }

  #[test]
  fn test_all_assertions_attempted() {
    let check = single(|b| {
      b.group("grub", |g| {
        g.file("/boot/grub2/grub.cfg")
          .matches("selinux=0")
          .mode(0o600)
          .owned_by("root")
          .grouped_into("root");
      });
    });
    let system = RecordingSystem::new().with_file_meta("/boot/grub2/grub.cfg", "linux selinux=1\n", 0o644, "vcap", "root");
    let result = run_check(&check, &ExecutionContext::default(), &system);

    assert_eq!(result.outcome, Outcome::Failed);
    assert_eq!(result.assertions_run, 4);
    let indices: Vec<usize> = result.failures.iter().map(|f| f.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
  }

  #[test]
  fn test_missing_file_and_empty_stdout_are_distinguishable() {
    let mut builder = CatalogBuilder::new();
    builder.group("distinct", |g| {
      g.file("/etc/missing").contains("x");
      g.command("true").equals("");
    });
    let catalog = builder.build().unwrap();
    let system = RecordingSystem::new().with_command("true", "", 0);
    let runner = CheckRunner::new(Some(2)).unwrap();
    let results = runner.run_all(catalog.checks(), &ExecutionContext::default(), &system);

    assert_eq!(results[0].outcome, Outcome::Failed);
    assert_eq!(
      results[0].subject_error.as_ref().map(|e| e.kind.as_str()),
      Some("subject_not_found")
    );
    assert_eq!(results[1].outcome, Outcome::Passed);
    assert!(results[1].subject_error.is_none());
  }

  #[test]
  fn test_unreadable_subject_reported_apart_from_missing() {
    let mut builder = CatalogBuilder::new();
    builder.group("kinds", |g| {
      g.file("/etc/ssh").contains("PermitRootLogin");
      g.file("/etc/absent").contains("PermitRootLogin");
    });
    let catalog = builder.build().unwrap();
    let system = RecordingSystem::new().with_dir("/etc/ssh");
    let runner = CheckRunner::new(Some(1)).unwrap();
    let results = runner.run_all(catalog.checks(), &ExecutionContext::default(), &system);

    let kinds: Vec<Option<&str>> = results
      .iter()
      .map(|r| r.subject_error.as_ref().map(|e| e.kind.as_str()))
      .collect();
    assert_eq!(kinds, vec![Some("subject_unreadable"), Some("subject_not_found")]);
    assert!(results.iter().all(|r| r.outcome == Outcome::Failed));
  }

  #[test]
  fn test_outcome_failed_iff_any_assertion_failed() {
    let mut builder = CatalogBuilder::new();
    builder.group("mixed", |g| {
      g.file("/etc/a").contains("yes");
      g.file("/etc/b").contains("yes").contains("no");
    });
    let catalog = builder.build().unwrap();
    let system = RecordingSystem::new()
      .with_file("/etc/a", "yes")
      .with_file("/etc/b", "yes");
    let runner = CheckRunner::new(Some(1)).unwrap();
    let results = runner.run_all(catalog.checks(), &ExecutionContext::default(), &system);

    for result in &results {
      assert_eq!(result.outcome == Outcome::Failed, !result.failures.is_empty());
    }
    assert_eq!(results[1].outcome, Outcome::Failed);
  }

  #[test]
  fn test_results_keep_declaration_order_and_are_repeatable() {
    let mut builder = CatalogBuilder::new();
    builder.group("many", |g| {
      for i in 0..50 {
        g.file(&format!("/etc/f{}", i)).contains(&format!("v{}", i));
      }
    });
    let catalog = builder.build().unwrap();
    let mut system = RecordingSystem::new();
    for i in 0..50 {
      if i % 3 != 0 {
        system = system.with_file(&format!("/etc/f{}", i), &format!("v{}", i));
      }
    }
    let runner = CheckRunner::new(Some(4)).unwrap();
    let ctx = ExecutionContext::default();

    let first = runner.run_all(catalog.checks(), &ctx, &system);
    let ids: Vec<usize> = first.iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=50).collect::<Vec<_>>());

    let second = runner.run_all(catalog.checks(), &ctx, &system);
    let outcomes = |results: &[RunResult]| results.iter().map(|r| r.outcome).collect::<Vec<_>>();
    assert_eq!(outcomes(&first), outcomes(&second));
  }

  #[test]
  fn test_each_check_resolved_once() {
    let mut builder = CatalogBuilder::new();
    builder.group("once", |g| {
      g.file("/etc/fstab").is_file().contains("UUID=").not_contains("nfs");
    });
    let catalog = builder.build().unwrap();
    let system = RecordingSystem::new().with_file("/etc/fstab", "UUID=1 / ext4 defaults 1 1\n");
    let runner = CheckRunner::new(Some(2)).unwrap();
    runner.run_all(catalog.checks(), &ExecutionContext::default(), &system);

    assert_eq!(
      system.accesses(),
      vec!["stat:/etc/fstab".to_string(), "read:/etc/fstab".to_string()]
    );
  }
}
