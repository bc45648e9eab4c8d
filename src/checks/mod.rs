//! Check model, matchers, applicability and the runner
//!
//! - **model**: `Check`, `Subject`, `Assertion` and `RunResult`
//! - **matchers**: pure comparisons plus failure messages
//! - **skip**: IaaS exclusion tags and environment skip conditions
//! - **runner**: evaluates a catalog on a bounded worker pool
//!
//! # Example
//!
//! ```rust,ignore
//! use stemcell_audit::checks::CheckRunner;
//!
//! let runner = CheckRunner::new(None)?;
//! let results = runner.run_all(catalog.checks(), &ctx, &system);
//!
//! for result in results {
//!   if result.outcome == Outcome::Failed {
//!     println!("❌ {}", result.description);
//!   }
//! }
//! ```

pub mod matchers;
mod model;
mod runner;
pub mod skip;

pub use model::{Assertion, AssertionFailure, Check, Outcome, RunResult, Subject, SubjectFailure};
pub use runner::CheckRunner;
