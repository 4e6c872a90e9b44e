//! Progress observers for a migration run.

use crate::normalize::TableOutcome;
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Stage of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    CreatingSchema,
    Populating,
    Verifying,
    Committing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::CreatingSchema => "creating schema",
            Phase::Populating => "populating tables",
            Phase::Verifying => "verifying",
            Phase::Committing => "committing",
        };
        f.write_str(name)
    }
}

/// Observer notified as a run advances.
pub trait ProgressReporter: Send + Sync {
    /// A new phase started.
    fn phase(&self, phase: Phase);

    /// A table finished populating. `completed` counts tables done so far.
    fn table_done(&self, outcome: &TableOutcome, completed: usize, total: usize);
}

/// Default reporter: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn phase(&self, phase: Phase) {
        info!("Phase: {}", phase);
    }

    fn table_done(&self, outcome: &TableOutcome, completed: usize, total: usize) {
        info!(
            "[{}/{}] {} populated ({} rows)",
            completed, total, outcome.table, outcome.rows_written
        );
    }
}
