//! Core building blocks shared by every command
//!
//! - **config**: stemcell-audit.toml parsing and validation
//! - **context**: the explicit platform description checks are evaluated against
//! - **error**: error types with contextual help messages and exit codes
//! - **logging**: tracing subscriber setup

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
