//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A fake stemcell image root plus a directory for config files
pub struct TestImage {
  _root: TempDir,
  pub path: PathBuf,
  pub work: PathBuf,
}

impl TestImage {
  /// Create an empty image whose `root` account owns every file we write
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("image");
    let work = root.path().join("work");
    std::fs::create_dir_all(path.join("etc"))?;
    std::fs::create_dir_all(&work)?;

    // Files are created by whoever runs the tests; name that account `root`
    // inside the image so owner/group assertions are deterministic.
    let meta = std::fs::metadata(&path)?;
    std::fs::write(
      path.join("etc/passwd"),
      format!("root:x:{}:{}:root:/root:/bin/bash\n", meta.uid(), meta.gid()),
    )?;
    std::fs::write(path.join("etc/group"), format!("root:x:{}:\n", meta.gid()))?;

    Ok(Self { _root: root, path, work })
  }

  /// Write a file inside the image with the given mode
  pub fn write(&self, path: &str, content: &str, mode: u32) -> Result<()> {
    let host = self.path.join(path.trim_start_matches('/'));
    if let Some(parent) = host.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&host, content).with_context(|| format!("Failed to write {}", host.display()))?;
    std::fs::set_permissions(&host, std::fs::Permissions::from_mode(mode))?;
    Ok(())
  }

  /// Write stemcell-audit.toml into the work directory
  pub fn config(&self, content: &str) -> Result<PathBuf> {
    let path = self.work.join("stemcell-audit.toml");
    std::fs::write(&path, content)?;
    Ok(path)
  }

  /// Populate the files the grub checks inspect, all passing
  pub fn with_hardened_grub(&self) -> Result<()> {
    let cfg = "set superusers=vcap\n\
               password_pbkdf2 vcap grub.pbkdf2.sha512.10000.ABCDEF\n\
               linux /vmlinuz ro net.ifnames=0 selinux=0 plymouth.enable=0 audit=1\n";
    self.write("/boot/grub2/grub.cfg", cfg, 0o600)?;
    self.write("/boot/grub/grub.cfg", cfg, 0o600)?;
    self.write("/etc/fstab", "UUID=abcd / ext4 defaults 1 1\n", 0o644)?;
    Ok(())
  }
}

/// Run the stemcell-audit binary; failures are returned, not bailed on,
/// so tests can assert on exit codes
pub fn run_audit(cwd: &Path, args: &[&str]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_stemcell-audit");

  Command::new(bin)
    .current_dir(cwd)
    .args(args)
    .env_remove("RUST_LOG")
    .env_remove("OS_NAME")
    .env_remove("OS_VERSION")
    .output()
    .context("Failed to run stemcell-audit")
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).to_string()
}

/// Parse stdout as JSON
pub fn json(output: &Output) -> Result<serde_json::Value> {
  serde_json::from_slice(&output.stdout).with_context(|| format!("stdout is not JSON:\n{}", stdout(output)))
}
