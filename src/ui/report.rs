//! Run reports: human-readable text and JSON

use crate::checks::{Outcome, RunResult};
use crate::core::context::ContextSummary;
use crate::core::error::AuditResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

/// Counts per outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
  pub total: usize,
  pub passed: usize,
  pub failed: usize,
  pub skipped: usize,
}

impl Summary {
  pub fn from_results(results: &[RunResult]) -> Self {
    results.iter().fold(
      Self {
        total: results.len(),
        ..Self::default()
      },
      |mut summary, result| {
        match result.outcome {
          Outcome::Passed => summary.passed += 1,
          Outcome::Failed => summary.failed += 1,
          Outcome::Skipped => summary.skipped += 1,
        }
        summary
      },
    )
  }
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub context: ContextSummary,
  pub summary: Summary,
  pub results: Vec<RunResult>,
}

impl RunReport {
  pub fn new(
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    context: ContextSummary,
    results: Vec<RunResult>,
  ) -> Self {
    Self {
      started_at,
      finished_at,
      context,
      summary: Summary::from_results(&results),
      results,
    }
  }

  pub fn to_json(&self) -> AuditResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn render_text(&self) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "🔍 Stemcell audit ({})\n", describe_context(&self.context));

    for result in &self.results {
      render_result(&mut out, result);
    }

    let elapsed = (self.finished_at - self.started_at).num_milliseconds();
    let _ = writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let _ = writeln!(
      out,
      "Summary: {} passed, {} failed, {} skipped ({} checks in {} ms)",
      self.summary.passed, self.summary.failed, self.summary.skipped, self.summary.total, elapsed
    );

    if self.summary.failed > 0 {
      let _ = writeln!(out, "\n⚠️  Stemcell does not meet its acceptance checks.");
    } else {
      let _ = writeln!(out, "\n✨ All applicable checks passed.");
    }
    out
  }
}

fn describe_context(context: &ContextSummary) -> String {
  let iaas = context.iaas.map(|i| i.to_string()).unwrap_or_else(|| "any".to_string());
  let os = match (&context.os_name, &context.os_version) {
    (Some(name), Some(version)) => format!("{} {}", name, version),
    (Some(name), None) => name.clone(),
    _ => "unknown".to_string(),
  };
  format!("iaas: {}, os: {}", iaas, os)
}

fn render_result(out: &mut String, result: &RunResult) {
  match result.outcome {
    Outcome::Passed => {
      let _ = writeln!(out, "✅ [{}] {}", result.id, result.description);
    }
    Outcome::Skipped => {
      let reason = result.skip_reason.as_deref().unwrap_or("not applicable");
      let _ = writeln!(out, "⏭️  [{}] {} (skipped: {})", result.id, result.description, reason);
    }
    Outcome::Failed => {
      let _ = writeln!(out, "❌ [{}] {}", result.id, result.description);
      if let Some(err) = &result.subject_error {
        let _ = writeln!(out, "   {}: {}", err.kind, err.message);
      }
      for failure in &result.failures {
        let _ = writeln!(out, "   ✗ {} ({}/{})", failure.label, failure.index, result.assertions_run);
        let _ = writeln!(out, "     expected: {}", failure.expected);
        write_block(out, "     actual:   ", &failure.actual);
        if !failure.references.is_empty() {
          let _ = writeln!(out, "     refs:     {}", failure.references.join(", "));
        }
      }
      let _ = writeln!(out);
    }
  }
}

/// Multi-line values are indented under their label
fn write_block(out: &mut String, label: &str, value: &str) {
  let pad = " ".repeat(label.chars().count());
  let mut lines = value.lines();
  match lines.next() {
    Some(first) => {
      let _ = writeln!(out, "{}{}", label, first);
    }
    None => {
      let _ = writeln!(out, "{}(empty)", label);
    }
  }
  for line in lines {
    let _ = writeln!(out, "{}{}", pad, line);
  }
}
