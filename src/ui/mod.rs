//! Terminal output: progress bars and run reports

pub mod progress;
pub mod report;
