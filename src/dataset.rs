//! Year filtering, validation, and the immutable dataset snapshot.
//!
//! A [`DatasetSnapshot`] is created from one successful fetch+parse and
//! replaced only by an explicit [`DatasetSnapshot::refresh`]. Downstream
//! stages borrow it; nothing mutates it.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::info;

use crate::fetch::{self, FetchError, HttpClient};
use crate::parser::{self, ParseError, ParsedBatch, RentRecord};

/// The single year the published reference tables cover.
pub const TARGET_YEAR: i32 = 2025;

/// CSV export endpoint of the rent-reference dataset.
pub const DEFAULT_DATA_URL: &str = "https://opendata.paris.fr/api/explore/v2.1/catalog/datasets/logement-encadrement-des-loyers/exports/csv?lang=fr&timezone=Europe%2FParis&use_labels=true&delimiter=%3B";

/// Why no snapshot could be built. The two `Empty*` variants are
/// user-visible warnings at the interface, not process failures: they let
/// the caller say "nothing received" vs "nothing for the target year".
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Malformed(#[from] ParseError),
    #[error("failed to read local payload: {0}")]
    Io(#[from] std::io::Error),
    #[error("the source returned no usable rows")]
    EmptyDataset,
    #[error("no rows found for year {year}")]
    EmptyYear { year: i32 },
}

/// Counts describing what the cleaning stages did to the raw payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotDiagnostics {
    /// Rows successfully parsed from the payload.
    pub rows_parsed: usize,
    /// Rows skipped by the parser (missing fields, bad numbers).
    pub rows_skipped: usize,
    /// Rows kept whose geometry payload did not decode.
    pub geometry_unparsed: usize,
    /// Parsed rows outside the target year.
    pub off_year: usize,
    /// Target-year rows dropped by validation.
    pub dropped_invalid: usize,
}

/// One immutable, validated view of the dataset for the target year,
/// together with the categorical values discovered in it.
#[derive(Debug)]
pub struct DatasetSnapshot {
    records: Vec<RentRecord>,
    rental_types: BTreeSet<String>,
    construction_eras: BTreeSet<String>,
    diagnostics: SnapshotDiagnostics,
}

impl DatasetSnapshot {
    /// Fetches the raw export from `url` and builds a snapshot for
    /// [`TARGET_YEAR`].
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] on fetch failure, a structurally malformed
    /// payload, or an empty result (see [`DatasetError::EmptyDataset`] and
    /// [`DatasetError::EmptyYear`]).
    pub async fn load<C: HttpClient>(client: &C, url: &str) -> Result<Self, DatasetError> {
        let raw = fetch::fetch_text(client, url).await?;
        Self::from_raw(&raw, TARGET_YEAR)
    }

    /// Builds a snapshot from raw delimited text.
    ///
    /// # Errors
    ///
    /// [`DatasetError::EmptyDataset`] when parsing yields no records at
    /// all; [`DatasetError::EmptyYear`] when records exist but none match
    /// `year`; [`DatasetError::Malformed`] when the payload is not the
    /// expected export.
    pub fn from_raw(raw: &str, year: i32) -> Result<Self, DatasetError> {
        let ParsedBatch {
            records,
            skips,
            geometry_unparsed,
        } = parser::parse_records(raw)?;

        let mut diagnostics = SnapshotDiagnostics {
            rows_parsed: records.len(),
            rows_skipped: skips.len(),
            geometry_unparsed,
            ..SnapshotDiagnostics::default()
        };

        if records.is_empty() {
            return Err(DatasetError::EmptyDataset);
        }

        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if record.year != year {
                diagnostics.off_year += 1;
                continue;
            }
            if !is_valid(&record) {
                diagnostics.dropped_invalid += 1;
                continue;
            }
            kept.push(record);
        }

        if kept.is_empty() {
            return Err(DatasetError::EmptyYear { year });
        }

        let rental_types = kept.iter().map(|r| r.rental_type.clone()).collect();
        let construction_eras = kept.iter().map(|r| r.construction_era.clone()).collect();

        info!(
            rows = kept.len(),
            skipped = diagnostics.rows_skipped,
            off_year = diagnostics.off_year,
            dropped = diagnostics.dropped_invalid,
            "Snapshot ready"
        );

        Ok(Self {
            records: kept,
            rental_types,
            construction_eras,
            diagnostics,
        })
    }

    /// Fetches the source again and replaces this snapshot in place. The
    /// old snapshot survives untouched if the reload fails.
    ///
    /// # Errors
    ///
    /// Same as [`DatasetSnapshot::load`].
    pub async fn refresh<C: HttpClient>(
        &mut self,
        client: &C,
        url: &str,
    ) -> Result<(), DatasetError> {
        *self = Self::load(client, url).await?;
        Ok(())
    }

    pub fn records(&self) -> &[RentRecord] {
        &self.records
    }

    /// Rental-type values discovered in the target-year data, sorted.
    pub fn rental_types(&self) -> &BTreeSet<String> {
        &self.rental_types
    }

    /// Construction-era values discovered in the target-year data, sorted.
    pub fn construction_eras(&self) -> &BTreeSet<String> {
        &self.construction_eras
    }

    pub fn diagnostics(&self) -> &SnapshotDiagnostics {
        &self.diagnostics
    }
}

/// Re-checks the invariants the parser establishes: finite, non-negative
/// rates and a non-empty neighborhood name. Dropped rows are counted.
fn is_valid(record: &RentRecord) -> bool {
    [
        record.reference_rent,
        record.reference_rent_capped,
        record.reference_rent_floor,
    ]
    .iter()
    .all(|v| v.is_finite() && *v >= 0.0)
        && !record.neighborhood_name.is_empty()
}
