//! Applicability: IaaS exclusion tags and environment skip conditions
//!
//! Both are evaluated against an explicit [`ExecutionContext`]; nothing here
//! reads the process environment.

use super::model::Check;
use crate::core::context::ExecutionContext;
use serde::Serialize;

/// One `variable == value` predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvEquals {
  pub variable: String,
  pub value: String,
}

/// Skip a check when every listed variable has the listed value.
///
/// A variable that is absent from the context makes the condition false; the
/// check then runs normally. A condition with no predicates always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipCondition {
  pub reason: String,
  pub when: Vec<EnvEquals>,
}

impl SkipCondition {
  pub fn new(reason: impl Into<String>) -> Self {
    Self {
      reason: reason.into(),
      when: Vec::new(),
    }
  }

  /// Add a `variable == value` predicate
  pub fn when_env(mut self, variable: impl Into<String>, value: impl Into<String>) -> Self {
    self.when.push(EnvEquals {
      variable: variable.into(),
      value: value.into(),
    });
    self
  }

  pub fn holds(&self, ctx: &ExecutionContext) -> bool {
    self.when.iter().all(|predicate| match ctx.var(&predicate.variable) {
      Some(actual) => actual == predicate.value,
      None => {
        tracing::debug!(
          variable = %predicate.variable,
          reason = %self.reason,
          "skip condition references an unset variable, treating it as false"
        );
        false
      }
    })
  }
}

/// Reason a check does not apply in this context, if any.
/// Exclusion tags are considered before skip conditions.
pub fn skip_reason(check: &Check, ctx: &ExecutionContext) -> Option<String> {
  for tag in &check.tags {
    if let Some(iaas) = ctx.excluded_by(tag) {
      return Some(format!("excluded on {} ({})", iaas, tag));
    }
  }

  check
    .skip_conditions
    .iter()
    .find(|condition| condition.holds(ctx))
    .map(|condition| condition.reason.clone())
}
