//! Checks declared in the `[[checks]]` tables of the config file
//!
//! ```toml
//! [[checks]]
//! description = "hostname is set"
//! file = "/etc/hostname"
//! tags = ["exclude_on_warden"]
//!
//! [[checks.skip_if]]
//! reason = "not on rhel 8"
//! when = { OS_NAME = "rhel", OS_VERSION = "8" }
//!
//! [[checks.assert]]
//! equals = "bosh-stemcell\n"
//! label = "has the stemcell hostname"
//! ```

use super::builder::{CatalogBuilder, CheckDraft, MatcherSpec};
use crate::checks::Subject;
use crate::checks::skip::SkipCondition;
use crate::core::error::{AuditResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One `[[checks]]` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub file: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub command: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub skip_if: Vec<SkipSpec>,
  #[serde(default, rename = "assert")]
  pub assertions: Vec<AssertSpec>,
}

/// `[[checks.skip_if]]`: skip when every variable in `when` has its value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkipSpec {
  pub reason: String,
  #[serde(default)]
  pub when: BTreeMap<String, String>,
}

/// `[[checks.assert]]`: exactly one matcher key plus optional label and refs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssertSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub equals: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub contains: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub not_contains: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub matches: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub not_matches: Option<String>,
  /// Octal, e.g. `"0600"`
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mode: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub owner: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub group: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_file: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub valid_json: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub token_set: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exit_status: Option<i32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub refs: Vec<String>,
}

impl AssertSpec {
  fn matcher(&self, check: &str) -> Result<MatcherSpec, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidCheck {
      check: check.to_string(),
      reason,
    };

    let mut found: Vec<(&str, MatcherSpec)> = Vec::new();
    if let Some(v) = &self.equals {
      found.push(("equals", MatcherSpec::Equals(v.clone())));
    }
    if let Some(v) = &self.contains {
      found.push(("contains", MatcherSpec::Contains(v.clone())));
    }
    if let Some(v) = &self.not_contains {
      found.push(("not_contains", MatcherSpec::NotContains(v.clone())));
    }
    if let Some(v) = &self.matches {
      found.push(("matches", MatcherSpec::Matches(v.clone())));
    }
    if let Some(v) = &self.not_matches {
      found.push(("not_matches", MatcherSpec::NotMatches(v.clone())));
    }
    if let Some(v) = &self.mode {
      found.push(("mode", MatcherSpec::Mode(parse_mode(v).map_err(&invalid)?)));
    }
    if let Some(v) = &self.owner {
      found.push(("owner", MatcherSpec::OwnedBy(v.clone())));
    }
    if let Some(v) = &self.group {
      found.push(("group", MatcherSpec::GroupedInto(v.clone())));
    }
    match self.is_file {
      Some(true) => found.push(("is_file", MatcherSpec::IsFile)),
      Some(false) => return Err(invalid("`is_file` only accepts true".to_string())),
      None => {}
    }
    match self.valid_json {
      Some(true) => found.push(("valid_json", MatcherSpec::ValidJson)),
      Some(false) => return Err(invalid("`valid_json` only accepts true".to_string())),
      None => {}
    }
    if let Some(v) = &self.token_set {
      found.push(("token_set", MatcherSpec::TokenSetEquals(v.iter().cloned().collect::<BTreeSet<_>>())));
    }
    if let Some(v) = self.exit_status {
      found.push(("exit_status", MatcherSpec::ExitStatus(v)));
    }

    match found.len() {
      0 => Err(invalid("assertion has no matcher key".to_string())),
      1 => Ok(found.remove(0).1),
      _ => Err(invalid(format!(
        "assertion has more than one matcher key: {}",
        found.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(", ")
      ))),
    }
  }
}

/// Parse an octal mode such as `0600` or `0o600`
pub fn parse_mode(raw: &str) -> Result<u32, String> {
  let digits = raw.trim().trim_start_matches("0o");
  let mode = u32::from_str_radix(digits, 8).map_err(|_| format!("mode '{}' is not an octal number", raw))?;
  if mode > 0o7777 {
    return Err(format!("mode '{}' is out of range", raw));
  }
  Ok(mode)
}

impl CheckSpec {
  /// Name used in errors: `checks[2] (hostname is set)`
  fn display_name(&self, position: usize) -> String {
    match &self.description {
      Some(description) => format!("checks[{}] ({})", position, description),
      None => format!("checks[{}]", position),
    }
  }

  /// Convert into a builder draft; `position` is 1-based
  pub fn to_draft(&self, position: usize) -> AuditResult<CheckDraft> {
    let name = self.display_name(position);
    let invalid = |reason: &str| ConfigError::InvalidCheck {
      check: name.clone(),
      reason: reason.to_string(),
    };

    let subject = match (&self.file, &self.command) {
      (Some(path), None) => Subject::File { path: path.clone() },
      (None, Some(command)) => Subject::Command {
        command: command.clone(),
      },
      (Some(_), Some(_)) => return Err(invalid("set only one of `file` or `command`").into()),
      (None, None) => return Err(invalid("needs a `file` or `command` subject").into()),
    };
    if self.assertions.is_empty() {
      return Err(invalid("needs at least one [[checks.assert]] entry").into());
    }

    let mut draft = CheckDraft::new(subject);
    if let Some(description) = &self.description {
      draft.describe(description.as_str());
    }
    for tag in &self.tags {
      draft.tag(tag.as_str());
    }
    for skip in &self.skip_if {
      let condition = skip
        .when
        .iter()
        .fold(SkipCondition::new(skip.reason.as_str()), |c, (var, value)| c.when_env(var.as_str(), value.as_str()));
      draft.skip_if(condition);
    }
    for assertion in &self.assertions {
      draft.assert_with(assertion.matcher(&name)?);
      if let Some(label) = &assertion.label {
        draft.label(label.as_str());
      }
      draft.refs(&assertion.refs);
    }
    Ok(draft)
  }
}

/// Append configured checks after whatever the builder already holds
pub fn append_checks(specs: &[CheckSpec], builder: &mut CatalogBuilder) -> AuditResult<()> {
  for (i, spec) in specs.iter().enumerate() {
    builder.push(spec.to_draft(i + 1)?);
  }
  Ok(())
}
