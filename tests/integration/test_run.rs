//! Integration tests for `stemcell-audit run`

use crate::helpers::{TestImage, json, run_audit, stderr, stdout};
use anyhow::Result;

const SSHD_CHECK: &str = r#"
[[checks]]
description = "sshd disallows root login"
file = "/etc/ssh/sshd_config"
[[checks.assert]]
matches = "^PermitRootLogin no$"
label = "should disallow root login"
refs = ["stig: V-38613"]
"#;

fn root_arg(image: &TestImage) -> String {
  image.path.display().to_string()
}

#[test]
fn test_builtin_grub_checks_pass_on_hardened_image() -> Result<()> {
  let image = TestImage::new()?;
  image.with_hardened_grub()?;

  let root = root_arg(&image);
  let output = run_audit(
    &image.work,
    &["run", "--root", &root, "--filter", "image_install_grub", "--json"],
  )?;

  assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
  let report = json(&output)?;
  assert_eq!(report["summary"]["total"], 4);
  assert_eq!(report["summary"]["passed"], 4);
  Ok(())
}

#[test]
fn test_wrong_grub_mode_fails_with_reference() -> Result<()> {
  let image = TestImage::new()?;
  image.with_hardened_grub()?;
  let cfg = std::fs::read_to_string(image.path.join("boot/grub2/grub.cfg"))?;
  image.write("/boot/grub2/grub.cfg", &cfg, 0o644)?;

  let root = root_arg(&image);
  let output = run_audit(
    &image.work,
    &["run", "--root", &root, "--filter", "grub2/grub.cfg", "--json"],
  )?;

  assert_eq!(output.status.code(), Some(3));
  let report = json(&output)?;
  let failures = report["results"][0]["failures"].as_array().cloned().unwrap_or_default();
  assert_eq!(failures.len(), 1);
  assert_eq!(failures[0]["expected"], "0600");
  assert_eq!(failures[0]["actual"], "0644");
  assert_eq!(failures[0]["references"][0], "stig: V-38583");
  Ok(())
}

#[test]
fn test_sshd_failure_shows_offending_line() -> Result<()> {
  let image = TestImage::new()?;
  image.write("/etc/ssh/sshd_config", "Port 22\nPermitRootLogin yes\n", 0o600)?;
  let config = image.config(SSHD_CHECK)?;

  let root = root_arg(&image);
  let config = config.display().to_string();
  let output = run_audit(&image.work, &["run", "--config", &config, "--root", &root, "--no-builtin"])?;

  assert_eq!(output.status.code(), Some(3));
  let text = stdout(&output);
  assert!(text.contains("❌ [1] sshd disallows root login"), "{}", text);
  assert!(text.contains("should disallow root login"));
  assert!(text.contains("actual:   PermitRootLogin yes"));
  assert!(text.contains("stig: V-38613"));
  assert!(text.contains("0 passed, 1 failed, 0 skipped"));
  Ok(())
}

#[test]
fn test_config_discovered_in_working_directory() -> Result<()> {
  let image = TestImage::new()?;
  image.write("/etc/ssh/sshd_config", "PermitRootLogin no\n", 0o600)?;
  image.config(SSHD_CHECK)?;

  let root = root_arg(&image);
  let output = run_audit(&image.work, &["run", "--root", &root, "--no-builtin"])?;
  assert_eq!(output.status.code(), Some(0), "stdout: {}", stdout(&output));
  Ok(())
}

#[test]
fn test_hostname_group_skipped_on_warden() -> Result<()> {
  let image = TestImage::new()?;
  let root = root_arg(&image);
  let output = run_audit(
    &image.work,
    &["run", "--root", &root, "--iaas", "warden", "--filter", "system-network", "--json"],
  )?;

  assert_eq!(output.status.code(), Some(0));
  let report = json(&output)?;
  assert_eq!(report["context"]["iaas"], "warden");
  assert_eq!(report["summary"]["skipped"], 1);
  assert_eq!(report["results"][0]["skip_reason"], "excluded on warden (exclude_on_warden)");
  Ok(())
}

#[test]
fn test_kernel_modules_skipped_on_rhel8() -> Result<()> {
  let image = TestImage::new()?;
  let root = root_arg(&image);
  let output = run_audit(
    &image.work,
    &[
      "run",
      "--root",
      &root,
      "--os-name",
      "rhel",
      "--os-version",
      "8",
      "--filter",
      "Linux kernel modules",
      "--json",
    ],
  )?;

  assert_eq!(output.status.code(), Some(0));
  let report = json(&output)?;
  assert_eq!(report["results"][0]["outcome"], "skipped");
  assert_eq!(report["results"][0]["skip_reason"], "inapplicable to RHEL 8");
  assert_eq!(report["context"]["os_name"], "rhel");
  Ok(())
}

#[test]
fn test_missing_file_is_subject_error() -> Result<()> {
  let image = TestImage::new()?;
  let root = root_arg(&image);
  let output = run_audit(
    &image.work,
    &["run", "--root", &root, "--iaas", "aws", "--filter", "system-network", "--json"],
  )?;

  assert_eq!(output.status.code(), Some(3));
  let report = json(&output)?;
  assert_eq!(report["results"][0]["subject_error"]["kind"], "subject_not_found");
  assert_eq!(report["results"][0]["assertions_run"], 0);
  Ok(())
}

#[test]
fn test_command_checks_against_image_need_chroot() -> Result<()> {
  let image = TestImage::new()?;
  image.write("/lib/modules/5.0-a/modules.dep", "", 0o644)?;

  let root = root_arg(&image);
  let output = run_audit(
    &image.work,
    &["run", "--root", &root, "--filter", "Linux kernel modules", "--json"],
  )?;

  assert_eq!(output.status.code(), Some(3), "stdout: {}", stdout(&output));
  let report = json(&output)?;
  let error = &report["results"][0]["subject_error"];
  assert_eq!(error["kind"], "execution_error");
  assert!(error["message"].as_str().unwrap_or_default().contains("--chroot"));
  assert!(stderr(&output).contains("need --chroot"));
  Ok(())
}

#[test]
fn test_command_checks_run_on_host_root() -> Result<()> {
  let image = TestImage::new()?;
  image.config(
    r#"
[[checks]]
description = "shell in root"
command = "pwd"
[[checks.assert]]
equals = "/\n"
[[checks.assert]]
exit_status = 0
"#,
  )?;

  let output = run_audit(&image.work, &["run", "--root", "/", "--no-builtin", "--json"])?;
  assert_eq!(output.status.code(), Some(0), "stdout: {}", stdout(&output));
  Ok(())
}

#[test]
fn test_symlinked_file_resolved_inside_image() -> Result<()> {
  let image = TestImage::new()?;
  image.write("/etc/ssh/sshd_config.real", "PermitRootLogin no\n", 0o600)?;
  std::os::unix::fs::symlink("/etc/ssh/sshd_config.real", image.path.join("etc/ssh/sshd_config"))?;
  image.config(SSHD_CHECK)?;

  let root = root_arg(&image);
  let output = run_audit(&image.work, &["run", "--root", &root, "--no-builtin", "--json"])?;
  assert_eq!(output.status.code(), Some(0), "stdout: {}", stdout(&output));
  Ok(())
}

#[test]
fn test_unreadable_subject_kept_apart_from_missing() -> Result<()> {
  let image = TestImage::new()?;
  image.write("/etc/ssh/moduli", "", 0o644)?;
  image.config(
    r#"
[[checks]]
description = "directory instead of file"
file = "/etc/ssh"
[[checks.assert]]
contains = "PermitRootLogin"

[[checks]]
description = "absent file"
file = "/etc/ssh/sshd_config"
[[checks.assert]]
contains = "PermitRootLogin"
"#,
  )?;

  let root = root_arg(&image);
  let output = run_audit(&image.work, &["run", "--root", &root, "--no-builtin", "--json"])?;
  assert_eq!(output.status.code(), Some(3));
  let report = json(&output)?;
  assert_eq!(report["results"][0]["subject_error"]["kind"], "subject_unreadable");
  assert_eq!(report["results"][1]["subject_error"]["kind"], "subject_not_found");
  Ok(())
}

#[test]
fn test_slow_command_times_out() -> Result<()> {
  let image = TestImage::new()?;
  image.config(
    r#"
[[checks]]
command = "sleep 10"
[[checks.assert]]
exit_status = 0
"#,
  )?;

  let started = std::time::Instant::now();
  let output = run_audit(
    &image.work,
    &["run", "--root", "/", "--no-builtin", "--timeout", "1", "--json"],
  )?;

  assert!(started.elapsed().as_secs() < 8);
  assert_eq!(output.status.code(), Some(3));
  let report = json(&output)?;
  assert_eq!(report["results"][0]["subject_error"]["kind"], "execution_timeout");
  Ok(())
}

#[test]
fn test_missing_root_is_system_error() -> Result<()> {
  let image = TestImage::new()?;
  let missing = image.path.join("does-not-exist").display().to_string();
  let output = run_audit(&image.work, &["run", "--root", &missing])?;

  assert_eq!(output.status.code(), Some(2));
  assert!(stderr(&output).contains("Target root not found"));
  Ok(())
}

#[test]
fn test_missing_explicit_config_is_user_error() -> Result<()> {
  let image = TestImage::new()?;
  let output = run_audit(&image.work, &["run", "--config", "nope.toml"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("Configuration file not found"));
  Ok(())
}

#[test]
fn test_unknown_iaas_is_user_error() -> Result<()> {
  let image = TestImage::new()?;
  let root = root_arg(&image);
  let output = run_audit(&image.work, &["run", "--root", &root, "--iaas", "mainframe"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("unknown IaaS"));
  Ok(())
}

#[test]
fn test_hostname_scenario_and_json_shape() -> Result<()> {
  let image = TestImage::new()?;
  image.write("/etc/hostname", "bosh-stemcell\n", 0o644)?;
  image.config(
    r#"
[[checks]]
description = "hostname"
file = "/etc/hostname"
[[checks.assert]]
equals = "bosh-stemcell\n"
"#,
  )?;

  let root = root_arg(&image);
  let output = run_audit(&image.work, &["run", "--root", &root, "--no-builtin", "--json"])?;
  assert_eq!(output.status.code(), Some(0));

  let report = json(&output)?;
  for key in ["started_at", "finished_at", "context", "summary", "results"] {
    assert!(report.get(key).is_some(), "missing {}", key);
  }
  assert_eq!(report["summary"]["passed"], 1);
  assert_eq!(report["results"][0]["id"], 1);
  assert_eq!(report["results"][0]["subject"], "File \"/etc/hostname\"");
  assert_eq!(report["results"][0]["outcome"], "passed");
  Ok(())
}

#[test]
fn test_setuid_scenario_ignores_order() -> Result<()> {
  let image = TestImage::new()?;
  image.config(
    r#"
[[checks]]
command = "printf '/usr/bin/sudo\n/usr/bin/su\n'"
[[checks.assert]]
token_set = ["/usr/bin/su", "/usr/bin/sudo"]
"#,
  )?;

  let output = run_audit(&image.work, &["run", "--root", "/", "--no-builtin", "--json"])?;
  assert_eq!(output.status.code(), Some(0), "stdout: {}", stdout(&output));
  Ok(())
}
