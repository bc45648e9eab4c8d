//! `list`: print the catalog without touching the target

use crate::catalog::{self, Catalog};
use crate::checks::skip::skip_reason;
use crate::core::config::AuditConfig;
use crate::core::context::ExecutionContext;
use crate::core::error::AuditResult;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Serialize)]
struct ListedCheck<'a> {
  id: usize,
  description: &'a str,
  subject: String,
  tags: &'a BTreeSet<String>,
  assertions: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  skip_reason: Option<String>,
}

fn listed<'a>(catalog: &'a Catalog, ctx: &ExecutionContext) -> Vec<ListedCheck<'a>> {
  catalog
    .checks()
    .iter()
    .map(|check| ListedCheck {
      id: check.id,
      description: &check.description,
      subject: check.subject.to_string(),
      tags: &check.tags,
      assertions: check.assertions.iter().map(|a| a.title()).collect(),
      skip_reason: skip_reason(check, ctx),
    })
    .collect()
}

/// List every check; with context flags, show which would be skipped
pub fn run_list(config: &AuditConfig, ctx: &ExecutionContext, no_builtin: bool, json: bool) -> AuditResult<()> {
  let catalog = catalog::assemble(config, !no_builtin)?;
  let entries = listed(&catalog, ctx);

  if json {
    println!("{}", serde_json::to_string_pretty(&entries)?);
    return Ok(());
  }

  println!("📋 {} check(s)\n", entries.len());
  for entry in &entries {
    let icon = if entry.skip_reason.is_some() { "⏭️ " } else { "•" };
    println!("{} [{}] {}", icon, entry.id, entry.description);
    println!("   subject: {}", entry.subject);
    if !entry.tags.is_empty() {
      let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
      println!("   tags:    {}", tags.join(", "));
    }
    println!("   asserts: {}", entry.assertions.len());
    if let Some(reason) = &entry.skip_reason {
      println!("   would skip: {}", reason);
    }
  }
  Ok(())
}
