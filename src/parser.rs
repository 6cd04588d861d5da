//! Parser for the raw semicolon-delimited rent-reference export.
//!
//! Column mapping from published header names to record fields is a fixed
//! table, resolved once per payload. Per-row failures are collected as
//! [`RowSkip`] values and never abort the batch; only a payload whose
//! header is missing a required column is fatal.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::geometry::GeoShape;

const COL_YEAR: &str = "Année";
const COL_GEO_SECTOR: &str = "Secteurs géographiques";
const COL_NEIGHBORHOOD_ID: &str = "Numéro du quartier";
const COL_NEIGHBORHOOD_NAME: &str = "Nom du quartier";
const COL_ROOM_COUNT: &str = "Nombre de pièces principales";
const COL_CONSTRUCTION_ERA: &str = "Epoque de construction";
const COL_RENTAL_TYPE: &str = "Type de location";
const COL_REFERENCE_RENT: &str = "Loyers de référence";
const COL_RENT_CAPPED: &str = "Loyers de référence majorés";
const COL_RENT_FLOOR: &str = "Loyers de référence minorés";
const COL_INSEE: &str = "Numéro INSEE du quartier";
const COL_GEO_SHAPE: &str = "geo_shape";

/// One row of source data after parsing. Immutable for the lifetime of a
/// snapshot; downstream stages only derive views from it.
#[derive(Debug, Clone, PartialEq)]
pub struct RentRecord {
    pub year: i32,
    pub geo_sector: String,
    pub neighborhood_id: String,
    pub neighborhood_name: String,
    pub room_count: u32,
    pub construction_era: String,
    pub rental_type: String,
    /// Published € per m² rates for this unit type.
    pub reference_rent: f64,
    pub reference_rent_capped: f64,
    pub reference_rent_floor: f64,
    /// `None` when the `geo_shape` payload was present but undecodable.
    /// Such records stay in the pipeline; only their outline is lost.
    pub geometry: Option<GeoShape>,
    pub insee_code: Option<String>,
}

/// Why a row was left out of the parsed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Required field empty or absent.
    MissingField(&'static str),
    /// Field present but not a usable number (after decimal-comma
    /// normalization; rejects non-finite and negative rates).
    InvalidNumber(&'static str),
    /// The row itself could not be read from the payload.
    MalformedRow,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField(col) => write!(f, "missing required field '{col}'"),
            SkipReason::InvalidNumber(col) => write!(f, "invalid number in '{col}'"),
            SkipReason::MalformedRow => write!(f, "malformed row"),
        }
    }
}

/// A skipped row: 1-based line number in the payload plus the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSkip {
    pub line: u64,
    pub reason: SkipReason,
}

/// Result of parsing one payload: the usable records plus an inspectable
/// account of everything that was left out.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub records: Vec<RentRecord>,
    pub skips: Vec<RowSkip>,
    /// Rows kept despite a `geo_shape` payload that did not decode.
    pub geometry_unparsed: usize,
}

/// Fatal parse failure: the payload as a whole is not the expected export.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing required column '{0}' in header")]
    MissingColumn(&'static str),
    #[error("failed to read header row: {0}")]
    Header(#[from] csv::Error),
}

struct ColumnIndex {
    year: usize,
    geo_sector: usize,
    neighborhood_id: usize,
    neighborhood_name: usize,
    room_count: usize,
    construction_era: usize,
    rental_type: usize,
    reference_rent: usize,
    rent_capped: usize,
    rent_floor: usize,
    insee: Option<usize>,
    geo_shape: usize,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, ParseError> {
        let find = |name: &'static str| -> Result<usize, ParseError> {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(ParseError::MissingColumn(name))
        };

        Ok(Self {
            year: find(COL_YEAR)?,
            geo_sector: find(COL_GEO_SECTOR)?,
            neighborhood_id: find(COL_NEIGHBORHOOD_ID)?,
            neighborhood_name: find(COL_NEIGHBORHOOD_NAME)?,
            room_count: find(COL_ROOM_COUNT)?,
            construction_era: find(COL_CONSTRUCTION_ERA)?,
            rental_type: find(COL_RENTAL_TYPE)?,
            reference_rent: find(COL_REFERENCE_RENT)?,
            rent_capped: find(COL_RENT_CAPPED)?,
            rent_floor: find(COL_RENT_FLOOR)?,
            insee: headers.iter().position(|h| h.trim() == COL_INSEE),
            geo_shape: find(COL_GEO_SHAPE)?,
        })
    }
}

/// Parses a raw export payload into typed records.
///
/// An empty payload (no content, or a header with zero data rows) yields
/// an empty batch, not an error.
///
/// # Errors
///
/// Returns [`ParseError`] only when the header row is unreadable or is
/// missing a required column.
pub fn parse_records(raw: &str) -> Result<ParsedBatch, ParseError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    if raw.trim().is_empty() {
        return Ok(ParsedBatch::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(raw.as_bytes());
    let headers = reader.headers()?.clone();
    let columns = ColumnIndex::resolve(&headers)?;

    let mut batch = ParsedBatch::default();

    for (i, row) in reader.records().enumerate() {
        // Header is line 1; data rows follow.
        let line = i as u64 + 2;

        let row = match row {
            Ok(row) => row,
            Err(_) => {
                batch.skips.push(RowSkip {
                    line,
                    reason: SkipReason::MalformedRow,
                });
                continue;
            }
        };

        match parse_row(&row, &columns) {
            Ok((record, geometry_unparsed)) => {
                if geometry_unparsed {
                    batch.geometry_unparsed += 1;
                }
                batch.records.push(record);
            }
            Err(reason) => batch.skips.push(RowSkip { line, reason }),
        }
    }

    debug!(
        records = batch.records.len(),
        skipped = batch.skips.len(),
        geometry_unparsed = batch.geometry_unparsed,
        "Raw payload parsed"
    );

    Ok(batch)
}

/// Parses one data row. The boolean flags a kept row whose geometry
/// payload did not decode.
fn parse_row(
    row: &csv::StringRecord,
    columns: &ColumnIndex,
) -> Result<(RentRecord, bool), SkipReason> {
    let field = |idx: usize, name: &'static str| -> Result<&str, SkipReason> {
        match row.get(idx).map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(SkipReason::MissingField(name)),
        }
    };

    let year = field(columns.year, COL_YEAR)?
        .parse::<i32>()
        .map_err(|_| SkipReason::InvalidNumber(COL_YEAR))?;
    let room_count = field(columns.room_count, COL_ROOM_COUNT)?
        .parse::<u32>()
        .map_err(|_| SkipReason::InvalidNumber(COL_ROOM_COUNT))?;

    let rent = |idx: usize, name: &'static str| -> Result<f64, SkipReason> {
        parse_decimal(field(idx, name)?).ok_or(SkipReason::InvalidNumber(name))
    };

    let reference_rent = rent(columns.reference_rent, COL_REFERENCE_RENT)?;
    let reference_rent_capped = rent(columns.rent_capped, COL_RENT_CAPPED)?;
    let reference_rent_floor = rent(columns.rent_floor, COL_RENT_FLOOR)?;

    // The raw geometry cell is required; whether it decodes is not.
    let raw_shape = field(columns.geo_shape, COL_GEO_SHAPE)?;
    let geometry = GeoShape::decode(raw_shape);
    let geometry_unparsed = geometry.is_none();

    let insee_code = columns
        .insee
        .and_then(|idx| row.get(idx))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let record = RentRecord {
        year,
        geo_sector: field(columns.geo_sector, COL_GEO_SECTOR)?.to_string(),
        neighborhood_id: field(columns.neighborhood_id, COL_NEIGHBORHOOD_ID)?.to_string(),
        neighborhood_name: field(columns.neighborhood_name, COL_NEIGHBORHOOD_NAME)?.to_string(),
        room_count,
        construction_era: field(columns.construction_era, COL_CONSTRUCTION_ERA)?.to_string(),
        rental_type: field(columns.rental_type, COL_RENTAL_TYPE)?.to_string(),
        reference_rent,
        reference_rent_capped,
        reference_rent_floor,
        geometry,
        insee_code,
    };

    Ok((record, geometry_unparsed))
}

/// Accepts both `32.5` and the locale form `32,5`. Rejects non-finite and
/// negative values.
fn parse_decimal(s: &str) -> Option<f64> {
    let value = s.replace(',', ".").parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Année;Secteurs géographiques;Numéro du quartier;Nom du quartier;Nombre de pièces principales;Epoque de construction;Type de location;Loyers de référence;Loyers de référence majorés;Loyers de référence minorés;Numéro INSEE du quartier;geo_shape";

    const SHAPE: &str = r#"{"type": "Polygon", "coordinates": [[[2.35, 48.85], [2.36, 48.86]]]}"#;

    fn payload(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    fn row(rent: &str) -> String {
        format!("2025;1;101;Quartier A;2;1971-1990;non meublé;{rent};38,6;22,5;7510101;{SHAPE}")
    }

    #[test]
    fn parses_decimal_comma_rates() {
        let batch = parse_records(&payload(&[&row("32,2")])).unwrap();

        assert_eq!(batch.records.len(), 1);
        assert!(batch.skips.is_empty());

        let record = &batch.records[0];
        assert_eq!(record.year, 2025);
        assert_eq!(record.neighborhood_name, "Quartier A");
        assert_eq!(record.room_count, 2);
        assert!((record.reference_rent - 32.2).abs() < 1e-9);
        assert!((record.reference_rent_capped - 38.6).abs() < 1e-9);
        assert!((record.reference_rent_floor - 22.5).abs() < 1e-9);
        assert_eq!(record.insee_code.as_deref(), Some("7510101"));
        assert!(record.geometry.is_some());
    }

    #[test]
    fn decimal_point_rates_also_accepted() {
        let batch = parse_records(&payload(&[&row("32.2")])).unwrap();
        assert!((batch.records[0].reference_rent - 32.2).abs() < 1e-9);
    }

    #[test]
    fn missing_rent_skips_row_with_reason() {
        let batch = parse_records(&payload(&[&row("")])).unwrap();

        assert!(batch.records.is_empty());
        assert_eq!(
            batch.skips,
            vec![RowSkip {
                line: 2,
                reason: SkipReason::MissingField(COL_REFERENCE_RENT),
            }]
        );
    }

    #[test]
    fn unparseable_rent_skips_row_with_reason() {
        let batch = parse_records(&payload(&[&row("n/a")])).unwrap();
        assert_eq!(
            batch.skips[0].reason,
            SkipReason::InvalidNumber(COL_REFERENCE_RENT)
        );
    }

    #[test]
    fn negative_rent_is_rejected() {
        let batch = parse_records(&payload(&[&row("-1,0")])).unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(
            batch.skips[0].reason,
            SkipReason::InvalidNumber(COL_REFERENCE_RENT)
        );
    }

    #[test]
    fn undecodable_geometry_keeps_row_and_counts_it() {
        let bad_shape =
            "2025;1;101;Quartier A;2;1971-1990;non meublé;32,2;38,6;22,5;7510101;not-json";
        let batch = parse_records(&payload(&[bad_shape])).unwrap();

        assert_eq!(batch.records.len(), 1);
        assert!(batch.records[0].geometry.is_none());
        assert_eq!(batch.geometry_unparsed, 1);
        assert!(batch.skips.is_empty());
    }

    #[test]
    fn empty_geometry_cell_skips_row() {
        let no_shape = "2025;1;101;Quartier A;2;1971-1990;non meublé;32,2;38,6;22,5;7510101;";
        let batch = parse_records(&payload(&[no_shape])).unwrap();

        assert!(batch.records.is_empty());
        assert_eq!(
            batch.skips[0].reason,
            SkipReason::MissingField(COL_GEO_SHAPE)
        );
    }

    #[test]
    fn empty_payload_is_a_valid_empty_batch() {
        let batch = parse_records("").unwrap();
        assert!(batch.records.is_empty());
        assert!(batch.skips.is_empty());

        let batch = parse_records(&payload(&[])).unwrap();
        assert!(batch.records.is_empty());
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let err = parse_records("Année;Nom du quartier\n2025;Quartier A").unwrap_err();
        assert!(matches!(err, ParseError::MissingColumn(_)));
    }

    #[test]
    fn bom_before_header_is_tolerated() {
        let batch = parse_records(&format!("\u{feff}{}", payload(&[&row("32,2")]))).unwrap();
        assert_eq!(batch.records.len(), 1);
    }

    #[test]
    fn skip_lines_are_one_based_after_header() {
        let batch = parse_records(&payload(&[&row("32,2"), &row("bad"), &row("33,0")])).unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.skips, vec![RowSkip {
            line: 3,
            reason: SkipReason::InvalidNumber(COL_REFERENCE_RENT),
        }]);
    }
}
