//! Check definitions and run results
//!
//! A [`Check`] names one subject (a file or a command), the conditions under
//! which it does not apply, and an ordered list of assertions. Checks are
//! immutable once built by the catalog; running one produces a [`RunResult`].

use super::matchers::{Matcher, Mismatch, SubjectKind};
use super::skip::SkipCondition;
use crate::target::SubjectError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a check inspects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
  File { path: String },
  Command { command: String },
}

impl Subject {
  pub fn kind(&self) -> SubjectKind {
    match self {
      Subject::File { .. } => SubjectKind::File,
      Subject::Command { .. } => SubjectKind::Command,
    }
  }
}

impl fmt::Display for Subject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Subject::File { path } => write!(f, "File {:?}", path),
      Subject::Command { command } => write!(f, "Command {:?}", command),
    }
  }
}

/// One expectation within a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
  pub matcher: Matcher,
  /// Human description, e.g. "should be of mode 600"
  pub label: Option<String>,
  /// Hardening-guide citations such as `stig: V-38583`; informational only
  pub references: Vec<String>,
}

impl Assertion {
  /// Label if present, otherwise the matcher description
  pub fn title(&self) -> String {
    self
      .label
      .clone()
      .unwrap_or_else(|| format!("should {}", self.matcher.describe()))
  }
}

/// A single acceptance check
#[derive(Debug, Clone)]
pub struct Check {
  /// 1-based position in the catalog
  pub id: usize,
  pub description: String,
  pub tags: BTreeSet<String>,
  pub skip_conditions: Vec<SkipCondition>,
  pub subject: Subject,
  pub assertions: Vec<Assertion>,
}

impl Check {
  /// Whether resolving the subject must read file content
  pub fn needs_content(&self) -> bool {
    self.assertions.iter().any(|a| a.matcher.needs_content())
  }
}

/// Final state of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
  Passed,
  Failed,
  Skipped,
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Outcome::Passed => write!(f, "PASS"),
      Outcome::Failed => write!(f, "FAIL"),
      Outcome::Skipped => write!(f, "SKIP"),
    }
  }
}

/// Why a subject could not be inspected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectFailure {
  /// `subject_not_found`, `subject_unreadable`, `execution_error` or `execution_timeout`
  pub kind: String,
  pub message: String,
}

impl From<&SubjectError> for SubjectFailure {
  fn from(err: &SubjectError) -> Self {
    Self {
      kind: err.kind().to_string(),
      message: err.to_string(),
    }
  }
}

/// One failed assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
  /// 1-based position of the assertion within its check
  pub index: usize,
  pub label: String,
  pub matcher: String,
  pub expected: String,
  pub actual: String,
  pub message: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub references: Vec<String>,
}

impl AssertionFailure {
  pub fn new(index: usize, assertion: &Assertion, mismatch: Mismatch) -> Self {
    Self {
      index,
      label: assertion.title(),
      matcher: assertion.matcher.describe(),
      expected: mismatch.expected,
      actual: mismatch.actual,
      message: mismatch.message,
      references: assertion.references.clone(),
    }
  }
}

/// Result of running one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
  pub id: usize,
  pub description: String,
  pub subject: String,
  #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
  pub tags: BTreeSet<String>,
  pub outcome: Outcome,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub skip_reason: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject_error: Option<SubjectFailure>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub failures: Vec<AssertionFailure>,
  /// Assertions actually evaluated (0 when skipped or the subject errored)
  pub assertions_run: usize,
  pub duration_ms: u64,
}

impl RunResult {
  fn base(check: &Check, outcome: Outcome) -> Self {
    Self {
      id: check.id,
      description: check.description.clone(),
      subject: check.subject.to_string(),
      tags: check.tags.clone(),
      outcome,
      skip_reason: None,
      subject_error: None,
      failures: Vec::new(),
      assertions_run: 0,
      duration_ms: 0,
    }
  }

  /// Check did not apply; nothing was inspected
  pub fn skipped(check: &Check, reason: impl Into<String>) -> Self {
    Self {
      skip_reason: Some(reason.into()),
      ..Self::base(check, Outcome::Skipped)
    }
  }

  /// Subject could not be resolved
  pub fn subject_failed(check: &Check, err: &SubjectError, duration_ms: u64) -> Self {
    Self {
      subject_error: Some(SubjectFailure::from(err)),
      duration_ms,
      ..Self::base(check, Outcome::Failed)
    }
  }

  /// Every assertion was evaluated; failed if any of them failed
  pub fn evaluated(check: &Check, failures: Vec<AssertionFailure>, duration_ms: u64) -> Self {
    let outcome = if failures.is_empty() {
      Outcome::Passed
    } else {
      Outcome::Failed
    };
    Self {
      failures,
      assertions_run: check.assertions.len(),
      duration_ms,
      ..Self::base(check, outcome)
    }
  }
}
