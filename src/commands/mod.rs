//! CLI commands for stemcell-audit
//!
//! - **run**: evaluate the catalog against an image root or the running host
//! - **list**: show every check, and whether it would be skipped
//! - **validate**: load the catalog and report structural problems
//!
//! Commands receive the loaded [`AuditConfig`] and an environment snapshot
//! taken once in `main`; none of them read the process environment.

pub mod list;
pub mod run;
pub mod validate;

pub use list::run_list;
pub use run::{RunOptions, run_audit};
pub use validate::run_validate;

use crate::core::config::AuditConfig;
use crate::core::context::{ExecutionContext, Iaas, OS_NAME_VAR, OS_VERSION_VAR};
use crate::core::error::AuditResult;

/// Flags that describe the platform a stemcell was built for
#[derive(Debug, Clone, Default)]
pub struct ContextArgs {
  pub iaas: Option<String>,
  pub os_name: Option<String>,
  pub os_version: Option<String>,
}

/// Build the execution context: flags win over `[settings]`, which win over the environment
pub fn execution_context<I>(config: &AuditConfig, args: &ContextArgs, env: I) -> AuditResult<ExecutionContext>
where
  I: IntoIterator<Item = (String, String)>,
{
  let iaas = match &args.iaas {
    Some(name) => Some(name.parse::<Iaas>()?),
    None => config.settings.iaas()?,
  };

  let mut ctx = ExecutionContext::new(iaas, env);
  if let Some(name) = &args.os_name {
    ctx = ctx.with_var(OS_NAME_VAR, name.as_str());
  }
  if let Some(version) = &args.os_version {
    ctx = ctx.with_var(OS_VERSION_VAR, version.as_str());
  }
  tracing::debug!(
    iaas = ?ctx.iaas,
    os_name = ?ctx.var(OS_NAME_VAR),
    os_version = ?ctx.var(OS_VERSION_VAR),
    "execution context"
  );
  Ok(ctx)
}
