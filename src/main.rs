mod catalog;
mod checks;
mod commands;
mod core;
mod target;
mod ui;

use clap::{Args, Parser, Subcommand};
use commands::{ContextArgs, RunOptions};
use crate::core::config::{AuditConfig, LogFormat};
use crate::core::error::{AuditError, print_error};
use std::path::PathBuf;

/// Acceptance checks for built CentOS/RHEL stemcell images
#[derive(Parser)]
#[command(name = "stemcell-audit")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Path to stemcell-audit.toml (default: search the current directory)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Log filter, e.g. `debug` or `stemcell_audit=trace` (RUST_LOG wins when set)
  #[arg(long, global = true)]
  log_level: Option<String>,

  /// Log output format
  #[arg(long, global = true, value_enum)]
  log_format: Option<LogFormat>,

  #[command(subcommand)]
  command: Commands,
}

/// Platform the stemcell was built for
#[derive(Args, Debug, Clone)]
struct ContextFlags {
  /// IaaS the image targets (aws, azure, google, openstack, vcloud, vsphere, warden)
  #[arg(long)]
  iaas: Option<String>,
  /// Overrides OS_NAME for skip conditions
  #[arg(long)]
  os_name: Option<String>,
  /// Overrides OS_VERSION for skip conditions
  #[arg(long)]
  os_version: Option<String>,
}

impl From<ContextFlags> for ContextArgs {
  fn from(flags: ContextFlags) -> Self {
    Self {
      iaas: flags.iaas,
      os_name: flags.os_name,
      os_version: flags.os_version,
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Run the acceptance checks against an image root
  Run {
    /// Image root that file paths are resolved under
    #[arg(long, default_value = "/")]
    root: PathBuf,
    /// Run commands inside the image with `chroot <root>`
    #[arg(long)]
    chroot: bool,
    #[command(flatten)]
    context: ContextFlags,
    /// Worker threads (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Per-command timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Run only checks declared in the config file
    #[arg(long)]
    no_builtin: bool,
    /// Only run checks whose description contains this text
    #[arg(long)]
    filter: Option<String>,
    /// Output the report in JSON format
    #[arg(long)]
    json: bool,
  },

  /// List checks and whether they would be skipped
  List {
    #[command(flatten)]
    context: ContextFlags,
    /// List only checks declared in the config file
    #[arg(long)]
    no_builtin: bool,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Validate configuration and catalog without running checks
  Validate {
    /// Validate only checks declared in the config file
    #[arg(long)]
    no_builtin: bool,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = Cli::parse();

  let cwd = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(1);
    }
  };

  let config = match AuditConfig::load(cli.config.as_deref(), &cwd) {
    Ok(config) => config,
    Err(e) => handle_error(e),
  };

  let log_level = cli.log_level.as_deref().unwrap_or(&config.settings.log_level);
  let log_format = cli.log_format.unwrap_or(config.settings.log_format);
  if let Err(e) = crate::core::logging::init_tracing(log_level, log_format) {
    handle_error(e);
  }

  // Skip conditions see this snapshot, never the live environment
  let env: Vec<(String, String)> = std::env::vars().collect();

  let result = match cli.command {
    Commands::Run {
      root,
      chroot,
      context,
      jobs,
      timeout,
      no_builtin,
      filter,
      json,
    } => commands::execution_context(&config, &context.into(), env).and_then(|ctx| {
      let options = RunOptions {
        root,
        chroot,
        jobs,
        timeout_secs: timeout,
        no_builtin,
        filter,
        json,
      };
      commands::run_audit(&config, &ctx, &options)
    }),
    Commands::List {
      context,
      no_builtin,
      json,
    } => commands::execution_context(&config, &context.into(), env)
      .and_then(|ctx| commands::run_list(&config, &ctx, no_builtin, json)),
    Commands::Validate { no_builtin, json } => commands::run_validate(&config, no_builtin, json),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: AuditError) -> ! {
  // The report already itemized the failures
  if !matches!(err, AuditError::ChecksFailed { .. }) {
    print_error(&err);
  } else {
    tracing::debug!(error = %err, "exiting with validation failure");
  }
  std::process::exit(err.exit_code().as_i32());
}
