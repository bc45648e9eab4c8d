//! Composition API for declaring checks
//!
//! Groups nest the way a hardening checklist is organised: a group contributes
//! its name to the description of every check inside it, and its tags and skip
//! conditions are inherited. Building flattens the tree into an ordered list
//! and compiles every pattern.
//!
//! ```rust,ignore
//! let mut catalog = CatalogBuilder::new();
//! catalog.group_tagged("installed by system-network", ["exclude_on_warden"], |g| {
//!   g.file("/etc/hostname").is_file().equals("bosh-stemcell");
//! });
//! let catalog = catalog.build()?;
//! ```

use super::Catalog;
use crate::checks::matchers::{Matcher, Pattern};
use crate::checks::skip::SkipCondition;
use crate::checks::{Assertion, Check, Subject};
use crate::core::error::{AuditResult, ConfigError};
use std::collections::BTreeSet;

/// A matcher before its pattern is compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatcherSpec {
  Equals(String),
  Contains(String),
  NotContains(String),
  Matches(String),
  NotMatches(String),
  Mode(u32),
  OwnedBy(String),
  GroupedInto(String),
  IsFile,
  ValidJson,
  TokenSetEquals(BTreeSet<String>),
  ExitStatus(i32),
}

impl MatcherSpec {
  /// Returns the offending pattern alongside the regex error
  fn compile(self) -> Result<Matcher, (String, regex::Error)> {
    let pattern = |source: String| Pattern::new(source.clone()).map_err(|e| (source, e));
    Ok(match self {
      MatcherSpec::Equals(s) => Matcher::Equals(s),
      MatcherSpec::Contains(s) => Matcher::Contains(s),
      MatcherSpec::NotContains(s) => Matcher::NotContains(s),
      MatcherSpec::Matches(s) => Matcher::Matches(pattern(s)?),
      MatcherSpec::NotMatches(s) => Matcher::NotMatches(pattern(s)?),
      MatcherSpec::Mode(m) => Matcher::Mode(m),
      MatcherSpec::OwnedBy(u) => Matcher::OwnedBy(u),
      MatcherSpec::GroupedInto(g) => Matcher::GroupedInto(g),
      MatcherSpec::IsFile => Matcher::IsFile,
      MatcherSpec::ValidJson => Matcher::ValidJson,
      MatcherSpec::TokenSetEquals(set) => Matcher::TokenSetEquals(set),
      MatcherSpec::ExitStatus(code) => Matcher::ExitStatus(code),
    })
  }
}

#[derive(Debug, Clone)]
struct AssertionSpec {
  matcher: MatcherSpec,
  label: Option<String>,
  references: Vec<String>,
}

/// A check being declared
#[derive(Debug, Clone)]
pub struct CheckDraft {
  path: Vec<String>,
  description: Option<String>,
  subject: Subject,
  tags: BTreeSet<String>,
  skip_conditions: Vec<SkipCondition>,
  assertions: Vec<AssertionSpec>,
}

impl CheckDraft {
  pub fn new(subject: Subject) -> Self {
    Self {
      path: Vec::new(),
      description: None,
      subject,
      tags: BTreeSet::new(),
      skip_conditions: Vec::new(),
      assertions: Vec::new(),
    }
  }

  /// Replace the generated description
  pub fn describe(&mut self, description: impl Into<String>) -> &mut Self {
    self.description = Some(description.into());
    self
  }

  pub fn tag(&mut self, tag: impl Into<String>) -> &mut Self {
    self.tags.insert(tag.into());
    self
  }

  pub fn skip_if(&mut self, condition: SkipCondition) -> &mut Self {
    self.skip_conditions.push(condition);
    self
  }

  pub fn assert_with(&mut self, matcher: MatcherSpec) -> &mut Self {
    self.assertions.push(AssertionSpec {
      matcher,
      label: None,
      references: Vec::new(),
    });
    self
  }

  /// Label the most recent assertion
  pub fn label(&mut self, label: impl Into<String>) -> &mut Self {
    if let Some(last) = self.assertions.last_mut() {
      last.label = Some(label.into());
    }
    self
  }

  /// Attach hardening-guide references to the most recent assertion
  pub fn refs<I, S>(&mut self, references: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    if let Some(last) = self.assertions.last_mut() {
      last
        .references
        .extend(references.into_iter().map(|r| r.as_ref().to_string()));
    }
    self
  }

  pub fn equals(&mut self, expected: impl Into<String>) -> &mut Self {
    self.assert_with(MatcherSpec::Equals(expected.into()))
  }

  pub fn contains(&mut self, needle: impl Into<String>) -> &mut Self {
    self.assert_with(MatcherSpec::Contains(needle.into()))
  }

  pub fn not_contains(&mut self, needle: impl Into<String>) -> &mut Self {
    self.assert_with(MatcherSpec::NotContains(needle.into()))
  }

  pub fn matches(&mut self, pattern: impl Into<String>) -> &mut Self {
    self.assert_with(MatcherSpec::Matches(pattern.into()))
  }

  pub fn not_matches(&mut self, pattern: impl Into<String>) -> &mut Self {
    self.assert_with(MatcherSpec::NotMatches(pattern.into()))
  }

  pub fn mode(&mut self, mode: u32) -> &mut Self {
    self.assert_with(MatcherSpec::Mode(mode))
  }

  pub fn owned_by(&mut self, owner: impl Into<String>) -> &mut Self {
    self.assert_with(MatcherSpec::OwnedBy(owner.into()))
  }

  pub fn grouped_into(&mut self, group: impl Into<String>) -> &mut Self {
    self.assert_with(MatcherSpec::GroupedInto(group.into()))
  }

  pub fn is_file(&mut self) -> &mut Self {
    self.assert_with(MatcherSpec::IsFile)
  }

  pub fn valid_json(&mut self) -> &mut Self {
    self.assert_with(MatcherSpec::ValidJson)
  }

  pub fn token_set<I, S>(&mut self, tokens: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let set = tokens.into_iter().map(|t| t.as_ref().to_string()).collect();
    self.assert_with(MatcherSpec::TokenSetEquals(set))
  }

  pub fn exit_status(&mut self, code: i32) -> &mut Self {
    self.assert_with(MatcherSpec::ExitStatus(code))
  }

  fn full_description(&self) -> String {
    if let Some(description) = &self.description {
      return description.clone();
    }
    let mut parts = self.path.clone();
    parts.push(self.subject.to_string());
    parts.join(" ")
  }

  fn compile(self, id: usize) -> AuditResult<Check> {
    let description = self.full_description();
    if self.assertions.is_empty() {
      return Err(
        ConfigError::InvalidCheck {
          check: description,
          reason: "declares no assertions".to_string(),
        }
        .into(),
      );
    }

    let mut assertions = Vec::with_capacity(self.assertions.len());
    for spec in self.assertions {
      let matcher = spec.matcher.compile().map_err(|(pattern, err)| ConfigError::InvalidPattern {
        check: description.clone(),
        pattern,
        reason: err.to_string(),
      })?;
      assertions.push(Assertion {
        matcher,
        label: spec.label,
        references: spec.references,
      });
    }

    Ok(Check {
      id,
      description,
      tags: self.tags,
      skip_conditions: self.skip_conditions,
      subject: self.subject,
      assertions,
    })
  }
}

/// A named level of the declaration tree
pub struct GroupBuilder {
  path: Vec<String>,
  tags: BTreeSet<String>,
  skip_conditions: Vec<SkipCondition>,
  drafts: Vec<CheckDraft>,
}

impl GroupBuilder {
  fn child<I, S>(path: Vec<String>, inherited: &BTreeSet<String>, tags: I, skip: Vec<SkipCondition>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut all_tags = inherited.clone();
    all_tags.extend(tags.into_iter().map(|t| t.as_ref().to_string()));
    Self {
      path,
      tags: all_tags,
      skip_conditions: skip,
      drafts: Vec::new(),
    }
  }

  /// Nested group without extra tags
  pub fn group(&mut self, name: &str, f: impl FnOnce(&mut GroupBuilder)) -> &mut Self {
    self.group_tagged(name, std::iter::empty::<&str>(), f)
  }

  /// Nested group whose checks carry additional tags
  pub fn group_tagged<I, S>(&mut self, name: &str, tags: I, f: impl FnOnce(&mut GroupBuilder)) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut path = self.path.clone();
    path.push(name.to_string());
    let mut child = GroupBuilder::child(path, &self.tags, tags, self.skip_conditions.clone());
    f(&mut child);
    self.drafts.append(&mut child.drafts);
    self
  }

  /// Skip every check declared after this call in this group
  pub fn skip_if(&mut self, condition: SkipCondition) -> &mut Self {
    self.skip_conditions.push(condition);
    self
  }

  pub fn file(&mut self, path: &str) -> &mut CheckDraft {
    self.push(Subject::File { path: path.to_string() })
  }

  pub fn command(&mut self, command: &str) -> &mut CheckDraft {
    self.push(Subject::Command {
      command: command.to_string(),
    })
  }

  fn push(&mut self, subject: Subject) -> &mut CheckDraft {
    let mut draft = CheckDraft::new(subject);
    draft.path = self.path.clone();
    draft.tags = self.tags.clone();
    draft.skip_conditions = self.skip_conditions.clone();
    let index = self.drafts.len();
    self.drafts.push(draft);
    &mut self.drafts[index]
  }
}

/// Collects checks in declaration order
#[derive(Default)]
pub struct CatalogBuilder {
  drafts: Vec<CheckDraft>,
}

impl CatalogBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn group(&mut self, name: &str, f: impl FnOnce(&mut GroupBuilder)) -> &mut Self {
    self.group_tagged(name, std::iter::empty::<&str>(), f)
  }

  pub fn group_tagged<I, S>(&mut self, name: &str, tags: I, f: impl FnOnce(&mut GroupBuilder)) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut root = GroupBuilder::child(vec![name.to_string()], &BTreeSet::new(), tags, Vec::new());
    f(&mut root);
    self.drafts.append(&mut root.drafts);
    self
  }

  /// Append a standalone check
  pub fn push(&mut self, draft: CheckDraft) -> &mut Self {
    self.drafts.push(draft);
    self
  }

  pub fn len(&self) -> usize {
    self.drafts.len()
  }

  /// Compile patterns and number checks from 1
  pub fn build(self) -> AuditResult<Catalog> {
    let checks = self
      .drafts
      .into_iter()
      .enumerate()
      .map(|(i, draft)| draft.compile(i + 1))
      .collect::<AuditResult<Vec<_>>>()?;
    Ok(Catalog::new(checks))
  }
}
