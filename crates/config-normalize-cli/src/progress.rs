//! JSON-lines progress output for `--progress`.

use chrono::Utc;
use config_normalize::{Phase, ProgressReporter, TableOutcome};
use serde::Serialize;

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ProgressEvent<'a> {
    Phase {
        phase: Phase,
        timestamp: String,
    },
    TableDone {
        table: &'a str,
        rows_written: u64,
        completed: usize,
        total: usize,
        timestamp: String,
    },
}

/// Writes one JSON object per event to stderr.
pub struct JsonLinesReporter;

impl JsonLinesReporter {
    fn emit(&self, event: &ProgressEvent<'_>) {
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{}", line);
        }
    }
}

impl ProgressReporter for JsonLinesReporter {
    fn phase(&self, phase: Phase) {
        self.emit(&ProgressEvent::Phase {
            phase,
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    fn table_done(&self, outcome: &TableOutcome, completed: usize, total: usize) {
        self.emit(&ProgressEvent::TableDone {
            table: &outcome.table,
            rows_written: outcome.rows_written,
            completed,
            total,
            timestamp: Utc::now().to_rfc3339(),
        });
    }
}
