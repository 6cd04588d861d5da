//! Output formatting and persistence for neighborhood summaries.
//!
//! Supports pretty-printing, JSON serialization for the rendering
//! collaborator, and CSV append of per-run statistics.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::NeighborhoodSummary;
use crate::stats::RunStats;

/// One entry of the renderer-facing JSON payload.
#[derive(Debug, Serialize)]
pub struct MapLayer<'a> {
    pub name: &'a str,
    pub accessible: bool,
    pub color: &'static str,
    /// `[latitude, longitude]` outline, `null` when nothing is renderable.
    pub outline: Option<&'a [[f64; 2]]>,
    pub line_items: &'a [String],
}

/// Flattens the ordered summary map into renderer layers.
pub fn to_layers(summaries: &BTreeMap<String, NeighborhoodSummary>) -> Vec<MapLayer<'_>> {
    summaries
        .values()
        .map(|summary| MapLayer {
            name: &summary.name,
            accessible: summary.is_accessible,
            color: summary.color(),
            outline: summary.outline.as_deref(),
            line_items: &summary.line_items,
        })
        .collect()
}

/// Logs summaries using Rust's debug pretty-print format.
pub fn print_pretty(summaries: &BTreeMap<String, NeighborhoodSummary>) {
    debug!("{:#?}", summaries);
}

/// Logs the renderer payload as pretty-printed JSON.
pub fn print_json(summaries: &BTreeMap<String, NeighborhoodSummary>) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(&to_layers(summaries))?);
    Ok(())
}

/// Writes the ordered renderer payload to `path` as JSON.
pub fn write_layers(path: &str, summaries: &BTreeMap<String, NeighborhoodSummary>) -> Result<()> {
    let layers = to_layers(summaries);
    std::fs::write(path, serde_json::to_vec_pretty(&layers)?)?;
    info!(path, layers = layers.len(), "Renderer payload written");
    Ok(())
}

/// Appends a [`RunStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, run_stats: &RunStats) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(run_stats)?;
    writer.flush()?;

    Ok(())
}
