//! Integration tests for `stemcell-audit list`

use crate::helpers::{TestImage, json, run_audit, stdout};
use anyhow::Result;

#[test]
fn test_list_builtin_catalog() -> Result<()> {
  let image = TestImage::new()?;
  let output = run_audit(&image.work, &["list", "--json"])?;

  assert_eq!(output.status.code(), Some(0));
  let entries = json(&output)?;
  let entries = entries.as_array().cloned().unwrap_or_default();
  assert_eq!(entries.len(), 17);
  assert_eq!(entries[0]["id"], 1);
  assert_eq!(entries[0]["subject"], "Command \"ls -1 /lib/modules | wc -l\"");
  Ok(())
}

#[test]
fn test_list_shows_skips_for_context() -> Result<()> {
  let image = TestImage::new()?;
  let output = run_audit(&image.work, &["list", "--iaas", "azure"])?;

  assert_eq!(output.status.code(), Some(0));
  let text = stdout(&output);
  assert!(text.contains("📋 17 check(s)"));
  assert!(text.contains("would skip: excluded on azure (exclude_on_azure)"));
  Ok(())
}

#[test]
fn test_list_does_not_touch_target() -> Result<()> {
  let image = TestImage::new()?;
  image.config(
    r#"
[[checks]]
command = "touch touched"
[[checks.assert]]
exit_status = 0
"#,
  )?;

  let output = run_audit(&image.work, &["list", "--no-builtin", "--json"])?;
  assert_eq!(output.status.code(), Some(0));
  assert!(!image.work.join("touched").exists());
  Ok(())
}
