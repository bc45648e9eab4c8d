//! Matcher library
//!
//! Each matcher is a pure comparison between an observed value and an
//! expectation. On mismatch it produces a [`Mismatch`] carrying the expected
//! and observed values in a form that is useful without re-running the audit.

use crate::target::{FileKind, Observed};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use std::fmt;

/// Maximum number of lines shown for an observed value
const EXCERPT_LINES: usize = 8;
/// Maximum number of characters shown for an observed value
const EXCERPT_CHARS: usize = 400;

/// A compiled regular expression that remembers its source.
///
/// `^` and `$` match at line boundaries, so `^PermitRootLogin no$` finds the
/// directive anywhere in a multi-line config file.
#[derive(Debug, Clone)]
pub struct Pattern {
  source: String,
  regex: Regex,
}

impl Pattern {
  pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
    let source = source.into();
    let regex = RegexBuilder::new(&source).multi_line(true).build()?;
    Ok(Self { source, regex })
  }

  pub fn as_str(&self) -> &str {
    &self.source
  }

  pub fn is_match(&self, haystack: &str) -> bool {
    self.regex.is_match(haystack)
  }

  /// Leading literal word of the pattern, used to find the lines a human wants to see.
  /// `^PermitRootLogin no$` yields `PermitRootLogin`.
  fn leading_literal(&self) -> Option<&str> {
    let body = self.source.trim_start_matches('^');
    let end = body
      .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
      .unwrap_or(body.len());
    let literal = &body[..end];
    (literal.len() >= 3).then_some(literal)
  }
}

impl PartialEq for Pattern {
  fn eq(&self, other: &Self) -> bool {
    self.source == other.source
  }
}

impl Eq for Pattern {}

/// Which kind of subject a matcher can be applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
  File,
  Command,
}

impl fmt::Display for SubjectKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SubjectKind::File => f.write_str("file"),
      SubjectKind::Command => f.write_str("command"),
    }
  }
}

/// An expectation about a subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
  /// Content/stdout is exactly this string
  Equals(String),
  /// Content/stdout contains this substring
  Contains(String),
  NotContains(String),
  /// Content/stdout matches this regex
  Matches(Pattern),
  NotMatches(Pattern),
  /// File permission bits equal this mode
  Mode(u32),
  /// File owner name
  OwnedBy(String),
  /// File group name
  GroupedInto(String),
  /// Path is a regular file
  IsFile,
  /// Content/stdout parses as JSON
  ValidJson,
  /// Whitespace-separated tokens of stdout form exactly this set
  TokenSetEquals(BTreeSet<String>),
  /// Command exited with this status
  ExitStatus(i32),
}

/// A failed expectation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
  pub expected: String,
  pub actual: String,
  pub message: String,
}

// Pure comparisons

pub fn equals(actual: &str, expected: &str) -> bool {
  actual == expected
}

pub fn contains(actual: &str, needle: &str) -> bool {
  actual.contains(needle)
}

pub fn matches(actual: &str, pattern: &Pattern) -> bool {
  pattern.is_match(actual)
}

pub fn mode_equals(actual: u32, expected: u32) -> bool {
  actual & 0o7777 == expected & 0o7777
}

/// Parse error for text that is not a JSON document
pub fn json_error(actual: &str) -> Option<String> {
  serde_json::from_str::<serde_json::Value>(actual).err().map(|e| e.to_string())
}

/// Order-independent comparison of whitespace-separated tokens
pub fn token_set_equals(actual: &str, expected: &BTreeSet<String>) -> bool {
  tokens(actual) == *expected
}

fn tokens(actual: &str) -> BTreeSet<String> {
  actual.split_whitespace().map(str::to_string).collect()
}

impl Matcher {
  /// Short description, e.g. `match /^PermitRootLogin no$/`
  pub fn describe(&self) -> String {
    match self {
      Matcher::Equals(s) => format!("eq {:?}", s),
      Matcher::Contains(s) => format!("include {:?}", s),
      Matcher::NotContains(s) => format!("not include {:?}", s),
      Matcher::Matches(p) => format!("match /{}/", p.as_str()),
      Matcher::NotMatches(p) => format!("not match /{}/", p.as_str()),
      Matcher::Mode(m) => format!("be mode {:04o}", m),
      Matcher::OwnedBy(u) => format!("be owned by {}", u),
      Matcher::GroupedInto(g) => format!("be grouped into {}", g),
      Matcher::IsFile => "be a file".to_string(),
      Matcher::ValidJson => "be valid JSON".to_string(),
      Matcher::TokenSetEquals(set) => format!("contain exactly {}", format_set(set)),
      Matcher::ExitStatus(code) => format!("exit with status {}", code),
    }
  }

  /// Whether this matcher looks at file content
  pub fn needs_content(&self) -> bool {
    matches!(
      self,
      Matcher::Equals(_)
        | Matcher::Contains(_)
        | Matcher::NotContains(_)
        | Matcher::Matches(_)
        | Matcher::NotMatches(_)
        | Matcher::ValidJson
    )
  }

  /// Whether this matcher can be applied to a subject kind
  pub fn supports(&self, kind: SubjectKind) -> bool {
    match self {
      Matcher::Mode(_) | Matcher::OwnedBy(_) | Matcher::GroupedInto(_) | Matcher::IsFile => kind == SubjectKind::File,
      Matcher::TokenSetEquals(_) | Matcher::ExitStatus(_) => kind == SubjectKind::Command,
      _ => true,
    }
  }

  /// Evaluate against a resolved subject
  pub fn check(&self, observed: &Observed) -> Result<(), Mismatch> {
    let kind = match observed {
      Observed::File(_) => SubjectKind::File,
      Observed::Command(_) => SubjectKind::Command,
    };
    if !self.supports(kind) {
      return Err(Mismatch {
        expected: self.describe(),
        actual: format!("a {} subject", kind),
        message: format!("`{}` is not applicable to a {} subject", self.describe(), kind),
      });
    }

    match observed {
      Observed::File(snapshot) => match self {
        Matcher::Mode(expected) => check_mode(snapshot.meta.mode, *expected),
        Matcher::OwnedBy(expected) => check_name("owner", &snapshot.meta.owner, expected),
        Matcher::GroupedInto(expected) => check_name("group", &snapshot.meta.group, expected),
        Matcher::IsFile => check_is_file(snapshot.meta.kind),
        _ => self.check_text(snapshot.content.as_deref().unwrap_or_default(), "content"),
      },
      Observed::Command(output) => match self {
        Matcher::ExitStatus(expected) => check_exit_status(output.exit_status, *expected),
        Matcher::TokenSetEquals(expected) => check_token_set(&output.stdout, expected),
        _ => self.check_text(&output.stdout, "stdout"),
      },
    }
  }

  fn check_text(&self, actual: &str, what: &str) -> Result<(), Mismatch> {
    let (passed, shown) = match self {
      Matcher::Equals(expected) => (equals(actual, expected), format!("{:?}", truncate(actual))),
      Matcher::Contains(needle) => (contains(actual, needle), excerpt(actual)),
      Matcher::NotContains(needle) => (!contains(actual, needle), lines_containing(actual, needle)),
      Matcher::Matches(pattern) => (matches(actual, pattern), relevant_lines(actual, pattern)),
      Matcher::NotMatches(pattern) => (!matches(actual, pattern), lines_matching(actual, pattern)),
      Matcher::ValidJson => match json_error(actual) {
        None => (true, String::new()),
        Some(e) => (false, format!("invalid JSON: {}", e)),
      },
      other => (false, format!("`{}` cannot be evaluated against text", other.describe())),
    };

    if passed {
      return Ok(());
    }

    Err(Mismatch {
      expected: self.expected_value(),
      actual: shown,
      message: format!("expected {} to {}", what, self.describe()),
    })
  }

  fn expected_value(&self) -> String {
    match self {
      Matcher::Equals(s) | Matcher::Contains(s) => format!("{:?}", s),
      Matcher::NotContains(s) => format!("no {:?}", s),
      Matcher::Matches(p) => format!("/{}/", p.as_str()),
      Matcher::NotMatches(p) => format!("no match for /{}/", p.as_str()),
      Matcher::ValidJson => "valid JSON".to_string(),
      other => other.describe(),
    }
  }
}

fn check_mode(actual: u32, expected: u32) -> Result<(), Mismatch> {
  if mode_equals(actual, expected) {
    return Ok(());
  }
  Err(Mismatch {
    expected: format!("{:04o}", expected),
    actual: format!("{:04o}", actual),
    message: format!("expected mode {:04o}, got {:04o}", expected, actual),
  })
}

fn check_name(what: &str, actual: &str, expected: &str) -> Result<(), Mismatch> {
  if actual == expected {
    return Ok(());
  }
  Err(Mismatch {
    expected: expected.to_string(),
    actual: actual.to_string(),
    message: format!("expected {} {}, got {}", what, expected, actual),
  })
}

fn check_is_file(kind: FileKind) -> Result<(), Mismatch> {
  if kind == FileKind::File {
    return Ok(());
  }
  let actual = match kind {
    FileKind::Directory => "directory",
    _ => "special file",
  };
  Err(Mismatch {
    expected: "regular file".to_string(),
    actual: actual.to_string(),
    message: format!("expected a regular file, found a {}", actual),
  })
}

fn check_exit_status(actual: Option<i32>, expected: i32) -> Result<(), Mismatch> {
  if actual == Some(expected) {
    return Ok(());
  }
  let shown = actual.map_or_else(|| "killed by signal".to_string(), |code| code.to_string());
  Err(Mismatch {
    expected: expected.to_string(),
    actual: shown.clone(),
    message: format!("expected exit status {}, got {}", expected, shown),
  })
}

fn check_token_set(stdout: &str, expected: &BTreeSet<String>) -> Result<(), Mismatch> {
  if token_set_equals(stdout, expected) {
    return Ok(());
  }
  let actual = tokens(stdout);
  let missing: BTreeSet<_> = expected.difference(&actual).cloned().collect();
  let extra: BTreeSet<_> = actual.difference(expected).cloned().collect();

  let mut parts = Vec::new();
  if !missing.is_empty() {
    parts.push(format!("missing {}", format_set(&missing)));
  }
  if !extra.is_empty() {
    parts.push(format!("unexpected {}", format_set(&extra)));
  }

  Err(Mismatch {
    expected: format_set(expected),
    actual: format_set(&actual),
    message: format!("token set differs: {}", parts.join(", ")),
  })
}

fn format_set(set: &BTreeSet<String>) -> String {
  format!("[{}]", set.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
}

fn truncate(text: &str) -> String {
  if text.chars().count() <= EXCERPT_CHARS {
    return text.to_string();
  }
  let cut: String = text.chars().take(EXCERPT_CHARS).collect();
  format!("{}…", cut)
}

/// First lines of `text`, bounded in lines and characters
fn excerpt(text: &str) -> String {
  if text.is_empty() {
    return "(empty)".to_string();
  }
  let total = text.lines().count();
  let mut shown: Vec<&str> = text.lines().take(EXCERPT_LINES).collect();
  if total > EXCERPT_LINES {
    shown.push("…");
  }
  truncate(&shown.join("\n"))
}

fn join_lines(lines: Vec<&str>) -> String {
  let total = lines.len();
  let mut shown: Vec<&str> = lines.into_iter().take(EXCERPT_LINES).collect();
  if total > EXCERPT_LINES {
    shown.push("…");
  }
  truncate(&shown.join("\n"))
}

/// Lines sharing the pattern's leading word, falling back to an excerpt
fn relevant_lines(text: &str, pattern: &Pattern) -> String {
  if let Some(literal) = pattern.leading_literal() {
    let lines: Vec<&str> = text.lines().filter(|line| line.contains(literal)).collect();
    if !lines.is_empty() {
      return join_lines(lines);
    }
  }
  excerpt(text)
}

fn lines_containing(text: &str, needle: &str) -> String {
  let lines: Vec<&str> = text.lines().filter(|line| line.contains(needle)).collect();
  if lines.is_empty() {
    // the needle spans a line break
    return excerpt(text);
  }
  join_lines(lines)
}

fn lines_matching(text: &str, pattern: &Pattern) -> String {
  let lines: Vec<&str> = text.lines().filter(|line| pattern.is_match(line)).collect();
  if lines.is_empty() {
    return excerpt(text);
  }
  join_lines(lines)
}
