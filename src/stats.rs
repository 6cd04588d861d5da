use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::NeighborhoodSummary;
use crate::dataset::SnapshotDiagnostics;

/// One diagnostic record per pipeline run, appended to a CSV for
/// inspection across runs.
#[derive(Debug, Default, Serialize)]
pub struct RunStats {
    pub timestamp: DateTime<Utc>,
    pub source: Option<String>,

    // cleaning counters
    pub rows_parsed: usize,
    pub rows_skipped: usize,
    pub geometry_unparsed: usize,
    pub off_year: usize,
    pub dropped_invalid: usize,

    // outcome
    pub eligible_records: usize,
    pub neighborhoods: usize,
    pub accessible_neighborhoods: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl RunStats {
    pub fn from_snapshot(diagnostics: &SnapshotDiagnostics) -> Self {
        RunStats {
            timestamp: Utc::now(),
            rows_parsed: diagnostics.rows_parsed,
            rows_skipped: diagnostics.rows_skipped,
            geometry_unparsed: diagnostics.geometry_unparsed,
            off_year: diagnostics.off_year,
            dropped_invalid: diagnostics.dropped_invalid,
            ..Default::default()
        }
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(error_type: &str, error_message: &str) -> Self {
        RunStats {
            timestamp: Utc::now(),
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    /// Set the dataset source this run consumed
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Record what the aggregation produced
    pub fn with_outcome(
        mut self,
        eligible_records: usize,
        summaries: &BTreeMap<String, NeighborhoodSummary>,
    ) -> Self {
        self.eligible_records = eligible_records;
        self.neighborhoods = summaries.len();
        self.accessible_neighborhoods =
            summaries.values().filter(|s| s.is_accessible).count();
        self
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn accessible_pct(&self) -> f64 {
        Self::pct(self.accessible_neighborhoods, self.neighborhoods)
    }
}
