//! Local filesystem and process access, for the running host or a mounted image

use super::{CommandOutput, FileKind, FileMeta, SubjectError, SystemAccess};
use crate::core::error::{AuditResult, TargetError};
use nix::unistd::{Gid, Group, Uid, User};
use std::collections::{HashMap, VecDeque};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Read};
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Same limit as Linux `MAXSYMLINKS`
const MAX_SYMLINK_HOPS: usize = 40;

/// [`SystemAccess`] backed by the local filesystem and `/bin/sh`
///
/// With a root other than `/`, file paths and their symlinks are resolved
/// inside that directory, and owner/group names come from the image's own
/// `/etc/passwd` and `/etc/group`, not the host's. Commands against an image
/// only run inside it via `chroot`; without it they are refused, since a host
/// shell would report the host's state.
#[derive(Debug)]
pub struct LocalSystem {
  root: PathBuf,
  chroot: bool,
  timeout: Duration,
  /// `None` means "ask the host's NSS"
  accounts: Option<AccountTables>,
}

#[derive(Debug, Default)]
struct AccountTables {
  users: HashMap<u32, String>,
  groups: HashMap<u32, String>,
}

impl LocalSystem {
  pub fn new(root: impl Into<PathBuf>, chroot: bool, timeout: Duration) -> AuditResult<Self> {
    let root = root.into();
    if !root.is_dir() {
      return Err(TargetError::RootNotFound { path: root }.into());
    }

    let accounts = if root == Path::new("/") {
      None
    } else {
      Some(AccountTables::load(&root))
    };

    Ok(Self {
      root,
      chroot,
      timeout,
      accounts,
    })
  }

  fn is_image(&self) -> bool {
    self.root != Path::new("/")
  }

  /// Host path for a target path, with every symlink resolved under the root.
  ///
  /// Absolute link targets are re-rooted and `..` stops at the root, so a
  /// link inside the image never leads to a host file.
  fn host_path(&self, path: &str) -> io::Result<PathBuf> {
    let mut resolved = self.root.clone();
    let mut depth = 0usize;
    let mut pending = path_components(Path::new(path));
    let mut hops = 0usize;

    while let Some(name) = pending.pop_front() {
      if name == ".." {
        if depth > 0 {
          resolved.pop();
          depth -= 1;
        }
        continue;
      }

      let candidate = resolved.join(&name);
      if !fs::symlink_metadata(&candidate)?.file_type().is_symlink() {
        resolved = candidate;
        depth += 1;
        continue;
      }

      hops += 1;
      if hops > MAX_SYMLINK_HOPS {
        return Err(io::Error::other("too many levels of symbolic links"));
      }
      let target = fs::read_link(&candidate)?;
      if target.is_absolute() {
        resolved = self.root.clone();
        depth = 0;
      }
      for part in path_components(&target).into_iter().rev() {
        pending.push_front(part);
      }
    }

    Ok(resolved)
  }

  fn owner_name(&self, uid: u32) -> String {
    match &self.accounts {
      Some(tables) => tables.users.get(&uid).cloned(),
      None => User::from_uid(Uid::from_raw(uid)).ok().flatten().map(|u| u.name),
    }
    .unwrap_or_else(|| uid.to_string())
  }

  fn group_name(&self, gid: u32) -> String {
    match &self.accounts {
      Some(tables) => tables.groups.get(&gid).cloned(),
      None => Group::from_gid(Gid::from_raw(gid)).ok().flatten().map(|g| g.name),
    }
    .unwrap_or_else(|| gid.to_string())
  }

  fn shell(&self, command: &str) -> Command {
    if self.chroot {
      let mut cmd = Command::new("chroot");
      cmd.arg(&self.root).arg("/bin/sh").arg("-c").arg(command);
      cmd
    } else {
      let mut cmd = Command::new("/bin/sh");
      cmd.arg("-c").arg(command).current_dir(&self.root);
      cmd
    }
  }
}

impl AccountTables {
  fn load(root: &Path) -> Self {
    Self {
      users: parse_id_table(&root.join("etc/passwd")),
      groups: parse_id_table(&root.join("etc/group")),
    }
  }
}

/// Normal and `..` components; `/` and `.` carry nothing once relative to the root
fn path_components(path: &Path) -> VecDeque<OsString> {
  path
    .components()
    .filter_map(|component| match component {
      Component::Normal(name) => Some(name.to_os_string()),
      Component::ParentDir => Some(OsString::from("..")),
      Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
    })
    .collect()
}

/// Parse `name:x:id:...` lines; the first name wins for a duplicated id
fn parse_id_table(path: &Path) -> HashMap<u32, String> {
  let mut table = HashMap::new();
  let Ok(content) = fs::read_to_string(path) else {
    tracing::debug!(path = %path.display(), "account table not readable, falling back to numeric ids");
    return table;
  };

  for line in content.lines() {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    let mut fields = line.split(':');
    let (Some(name), Some(_), Some(id)) = (fields.next(), fields.next(), fields.next()) else {
      continue;
    };
    if let Ok(id) = id.parse::<u32>() {
      table.entry(id).or_insert_with(|| name.to_string());
    }
  }
  table
}

fn unreadable(path: &str, err: &io::Error) -> SubjectError {
  if err.kind() == io::ErrorKind::NotFound {
    SubjectError::NotFound { path: path.to_string() }
  } else {
    SubjectError::Unreadable {
      path: path.to_string(),
      reason: err.to_string(),
    }
  }
}

impl SystemAccess for LocalSystem {
  fn stat(&self, path: &str) -> Result<FileMeta, SubjectError> {
    let host = self.host_path(path).map_err(|e| unreadable(path, &e))?;
    let metadata = fs::metadata(&host).map_err(|e| unreadable(path, &e))?;
    let file_type = metadata.file_type();
    let kind = if file_type.is_file() {
      FileKind::File
    } else if file_type.is_dir() {
      FileKind::Directory
    } else {
      FileKind::Other
    };

    Ok(FileMeta {
      kind,
      mode: metadata.mode() & 0o7777,
      owner: self.owner_name(metadata.uid()),
      group: self.group_name(metadata.gid()),
    })
  }

  fn read(&self, path: &str) -> Result<Vec<u8>, SubjectError> {
    let host = self.host_path(path).map_err(|e| unreadable(path, &e))?;
    fs::read(&host).map_err(|e| unreadable(path, &e))
  }

  fn run(&self, command: &str) -> Result<CommandOutput, SubjectError> {
    let execution_error = |reason: String| SubjectError::Execution {
      command: command.to_string(),
      reason,
    };

    if self.is_image() && !self.chroot {
      return Err(execution_error(format!(
        "commands against image root {} need --chroot",
        self.root.display()
      )));
    }

    let mut child = self
      .shell(command)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| execution_error(format!("spawn failed: {}", e)))?;

    // Drain both pipes concurrently so a chatty command never blocks on a full pipe
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let started = Instant::now();
    let status = loop {
      match child.try_wait() {
        Ok(Some(status)) => break status,
        Ok(None) => {
          if started.elapsed() > self.timeout {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(command, timeout_secs = self.timeout.as_secs(), "command timed out");
            return Err(SubjectError::TimedOut {
              command: command.to_string(),
              timeout_secs: self.timeout.as_secs(),
            });
          }
          thread::sleep(POLL_INTERVAL);
        }
        Err(e) => return Err(execution_error(format!("wait failed: {}", e))),
      }
    };

    Ok(CommandOutput {
      stdout: join_reader(stdout_reader),
      stderr: join_reader(stderr_reader),
      exit_status: status.code(),
    })
  }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
  thread::spawn(move || {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    buf
  })
}

fn join_reader(reader: Option<thread::JoinHandle<Vec<u8>>>) -> String {
  reader
    .and_then(|handle| handle.join().ok())
    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    .unwrap_or_default()
}
