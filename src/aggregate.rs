//! Per-neighborhood aggregation of estimated records.
//!
//! One affordable constituent flags the whole neighborhood accessible.
//! That optimistic rule matches the published product behavior; see
//! DESIGN.md for the caveat.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::estimate::EstimatedRecord;
use crate::geometry;

/// Rendering-ready digest of one neighborhood.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborhoodSummary {
    pub name: String,
    /// True iff at least one constituent record fits the budget.
    pub is_accessible: bool,
    /// Renderer-ready `[latitude, longitude]` outline; `None` marks a
    /// neighborhood with nothing renderable. It still appears in the
    /// textual output.
    pub outline: Option<Vec<[f64; 2]>>,
    /// Human-readable per-record lines, ascending by room count, ties
    /// broken by ascending estimated rent.
    pub line_items: Vec<String>,
}

impl NeighborhoodSummary {
    /// Map marker derived from the verdict.
    pub fn color(&self) -> &'static str {
        if self.is_accessible { "green" } else { "red" }
    }
}

/// One display line per record: rooms, era, selected per-m² rate,
/// estimated monthly rent, verdict mark.
pub fn line_item(entry: &EstimatedRecord<'_>) -> String {
    let mark = if entry.within_budget { '✓' } else { '✗' };
    format!(
        "{} room(s) ({}): {:.2} €/m² | rent {:.0} € {}",
        entry.record.room_count,
        entry.record.construction_era,
        entry.rate_per_m2,
        entry.estimated_monthly_rent,
        mark
    )
}

/// Groups estimated records by neighborhood name and derives one summary
/// per group, keyed and ordered by name.
///
/// The representative geometry is the first member carrying a decoded
/// shape; all members of one neighborhood are expected to share identical
/// geometry, and a mismatch is logged rather than treated as fatal. A
/// shape with nothing renderable in it downgrades to the `None` marker.
pub fn summarize(entries: &[EstimatedRecord<'_>]) -> BTreeMap<String, NeighborhoodSummary> {
    let mut groups: BTreeMap<&str, Vec<&EstimatedRecord<'_>>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(entry.record.neighborhood_name.as_str())
            .or_default()
            .push(entry);
    }

    groups
        .into_iter()
        .map(|(name, mut members)| {
            members.sort_by(|a, b| {
                a.record
                    .room_count
                    .cmp(&b.record.room_count)
                    .then(a.estimated_monthly_rent.total_cmp(&b.estimated_monthly_rent))
            });

            let is_accessible = members.iter().any(|m| m.within_budget);

            let representative = members.iter().find_map(|m| m.record.geometry.as_ref());
            if let Some(reference) = representative {
                let mismatched = members
                    .iter()
                    .filter_map(|m| m.record.geometry.as_ref())
                    .any(|shape| shape != reference);
                if mismatched {
                    warn!(
                        neighborhood = name,
                        "members disagree on geometry, using the first"
                    );
                }
            }

            let outline = representative.and_then(|shape| match geometry::outline(shape) {
                Ok(points) => Some(points),
                Err(e) => {
                    warn!(neighborhood = name, error = %e, "no renderable geometry");
                    None
                }
            });

            let summary = NeighborhoodSummary {
                name: name.to_string(),
                is_accessible,
                outline,
                line_items: members.iter().map(|m| line_item(m)).collect(),
            };
            (name.to_string(), summary)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::{EstimationCriteria, RentTier, select_eligible};
    use crate::geometry::GeoShape;
    use crate::parser::RentRecord;

    const SHAPE: &str = r#"{"type": "Polygon", "coordinates": [[[2.35, 48.85], [2.36, 48.86]]]}"#;

    fn record(name: &str, rooms: u32, capped: f64, shape: Option<&str>) -> RentRecord {
        RentRecord {
            year: 2025,
            geo_sector: "1".to_string(),
            neighborhood_id: "101".to_string(),
            neighborhood_name: name.to_string(),
            room_count: rooms,
            construction_era: "1971-1990".to_string(),
            rental_type: "non meublé".to_string(),
            reference_rent: capped - 4.0,
            reference_rent_capped: capped,
            reference_rent_floor: capped - 8.0,
            geometry: shape.and_then(GeoShape::decode),
            insee_code: None,
        }
    }

    fn criteria(budget: f64) -> EstimationCriteria {
        EstimationCriteria {
            budget,
            surface_area: 30.0,
            rental_type: "non meublé".to_string(),
            allowed_eras: ["1971-1990".to_string()].into_iter().collect(),
            rent_tier: RentTier::Capped,
        }
    }

    fn summaries(
        records: &[RentRecord],
        budget: f64,
    ) -> BTreeMap<String, NeighborhoodSummary> {
        let eligible = select_eligible(records, &criteria(budget)).unwrap();
        summarize(&eligible)
    }

    #[test]
    fn one_affordable_member_flags_the_neighborhood_accessible() {
        let records = vec![
            record("Quartier A", 1, 40.0, Some(SHAPE)), // 1200 €
            record("Quartier A", 2, 60.0, Some(SHAPE)), // 1800 €
        ];

        let result = summaries(&records, 1500.0);
        assert!(result["Quartier A"].is_accessible);
        assert_eq!(result["Quartier A"].color(), "green");
    }

    #[test]
    fn raising_the_only_affordable_rent_flips_the_verdict() {
        let affordable = vec![
            record("Quartier A", 1, 40.0, Some(SHAPE)),
            record("Quartier A", 2, 60.0, Some(SHAPE)),
        ];
        assert!(summaries(&affordable, 1500.0)["Quartier A"].is_accessible);

        let unaffordable = vec![
            record("Quartier A", 1, 55.0, Some(SHAPE)), // 1650 €, over budget
            record("Quartier A", 2, 60.0, Some(SHAPE)),
        ];
        let result = summaries(&unaffordable, 1500.0);
        assert!(!result["Quartier A"].is_accessible);
        assert_eq!(result["Quartier A"].color(), "red");
    }

    #[test]
    fn line_items_sorted_by_room_count_then_rent() {
        let records = vec![
            record("Quartier A", 3, 50.0, Some(SHAPE)),
            record("Quartier A", 1, 45.0, Some(SHAPE)),
            record("Quartier A", 1, 40.0, Some(SHAPE)),
            record("Quartier A", 2, 42.0, Some(SHAPE)),
        ];

        let result = summaries(&records, 1500.0);
        let items = &result["Quartier A"].line_items;

        assert_eq!(items.len(), 4);
        assert!(items[0].starts_with("1 room(s)") && items[0].contains("1200 €"));
        assert!(items[1].starts_with("1 room(s)") && items[1].contains("1350 €"));
        assert!(items[2].starts_with("2 room(s)"));
        assert!(items[3].starts_with("3 room(s)"));
    }

    #[test]
    fn record_without_geometry_still_counts_toward_accessibility() {
        let records = vec![
            record("Quartier A", 1, 40.0, None), // affordable, no shape
            record("Quartier A", 2, 60.0, Some(SHAPE)),
        ];

        let result = summaries(&records, 1500.0);
        let summary = &result["Quartier A"];

        assert!(summary.is_accessible);
        assert_eq!(summary.line_items.len(), 2);
        // The shape-carrying member supplies the outline.
        assert!(summary.outline.is_some());
    }

    #[test]
    fn neighborhood_with_no_renderable_geometry_keeps_its_summary() {
        let records = vec![
            record("Quartier B", 1, 40.0, None),
            record("Quartier B", 2, 60.0, None),
        ];

        let result = summaries(&records, 1500.0);
        let summary = &result["Quartier B"];

        assert!(summary.outline.is_none());
        assert_eq!(summary.line_items.len(), 2);
    }

    #[test]
    fn summaries_are_ordered_by_neighborhood_name() {
        let records = vec![
            record("Quartier C", 1, 40.0, Some(SHAPE)),
            record("Quartier A", 1, 40.0, Some(SHAPE)),
            record("Quartier B", 1, 40.0, Some(SHAPE)),
        ];

        let result = summaries(&records, 1500.0);
        let names: Vec<_> = result.keys().cloned().collect();
        assert_eq!(names, vec!["Quartier A", "Quartier B", "Quartier C"]);
    }

    #[test]
    fn outline_comes_back_in_renderer_axis_order() {
        let records = vec![record("Quartier A", 1, 40.0, Some(SHAPE))];

        let result = summaries(&records, 1500.0);
        let outline = result["Quartier A"].outline.as_ref().unwrap();
        assert_eq!(outline[0], [48.85, 2.35]);
    }
}
