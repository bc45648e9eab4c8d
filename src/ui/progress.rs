//! Progress bar for check runs
//!
//! Uses `linya`, whose bars are cheap to update from many worker threads.

use linya::{Bar, Progress};
use std::sync::{Arc, Mutex};

/// Thread-safe progress bar shared by the runner's workers
#[derive(Clone)]
pub struct CheckProgress {
  progress: Arc<Mutex<Progress>>,
  bar: Arc<Bar>,
}

impl CheckProgress {
  /// Draw a bar on stderr for `total` checks
  pub fn new(total: usize, label: impl Into<String>) -> Self {
    let mut progress = Progress::new();
    let bar = progress.bar(total, label.into());
    Self {
      progress: Arc::new(Mutex::new(progress)),
      bar: Arc::new(bar),
    }
  }

  /// Mark one more check as finished
  pub fn inc(&self) {
    // A worker that panicked mid-draw leaves the bar usable
    let mut progress = match self.progress.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    progress.inc_and_draw(&self.bar, 1);
  }
}
