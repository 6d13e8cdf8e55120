//! Utility functions and types

pub mod data_loader;
pub mod stats;

pub use data_loader::{require_columns, DataLoader, DataSaver};
pub use stats::SummaryStats;

use std::time::Instant;

/// Wall-clock timer for stage timings
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start timing now
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// Seconds elapsed since start
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
