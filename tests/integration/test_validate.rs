//! Integration tests for `stemcell-audit validate`

use crate::helpers::{TestImage, json, run_audit, stderr, stdout};
use anyhow::Result;

#[test]
fn test_validate_builtin_catalog() -> Result<()> {
  let image = TestImage::new()?;
  let output = run_audit(&image.work, &["validate"])?;

  assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
  assert!(stdout(&output).contains("✅ 17 check(s) valid"));
  Ok(())
}

#[test]
fn test_validate_reports_inapplicable_matcher() -> Result<()> {
  let image = TestImage::new()?;
  image.config(
    r#"
[[checks]]
description = "setuid binaries"
file = "/etc/setuid-list"
[[checks.assert]]
token_set = ["/usr/bin/su"]
"#,
  )?;

  let output = run_audit(&image.work, &["validate", "--no-builtin", "--json"])?;
  assert_eq!(output.status.code(), Some(1));
  let report = json(&output)?;
  assert_eq!(report["valid"], false);
  assert_eq!(report["issues"][0]["description"], "setuid binaries");
  Ok(())
}

#[test]
fn test_validate_rejects_bad_pattern() -> Result<()> {
  let image = TestImage::new()?;
  image.config(
    r#"
[[checks]]
description = "broken"
file = "/etc/x"
[[checks.assert]]
matches = "(unclosed"
"#,
  )?;

  let output = run_audit(&image.work, &["validate"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("Invalid pattern /(unclosed/ in check 'broken'"));
  Ok(())
}

#[test]
fn test_validate_rejects_ambiguous_assertion() -> Result<()> {
  let image = TestImage::new()?;
  image.config(
    r#"
[[checks]]
file = "/etc/x"
[[checks.assert]]
contains = "a"
not_contains = "b"
"#,
  )?;

  let output = run_audit(&image.work, &["validate"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("checks[1]"));
  Ok(())
}

#[test]
fn test_invalid_settings_rejected() -> Result<()> {
  let image = TestImage::new()?;
  image.config("[settings]\ntimeout_secs = 0\n")?;

  let output = run_audit(&image.work, &["validate"])?;
  assert_eq!(output.status.code(), Some(1));
  let err = stderr(&output);
  assert!(err.contains("settings.timeout_secs"), "{}", err);
  assert!(err.contains("Invalid config in") && err.contains("stemcell-audit.toml"), "{}", err);
  Ok(())
}
