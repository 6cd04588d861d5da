//! Per-record affordability estimation against caller criteria.
//!
//! Everything here is a pure derivation over the snapshot: re-running with
//! new criteria recomputes the estimated views without touching upstream
//! records.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use clap::ValueEnum;
use thiserror::Error;

use crate::dataset::DatasetSnapshot;
use crate::parser::RentRecord;

pub const BUDGET_RANGE: RangeInclusive<f64> = 300.0..=10_000.0;
pub const SURFACE_RANGE: RangeInclusive<f64> = 10.0..=200.0;
pub const DEFAULT_BUDGET: f64 = 1_500.0;
pub const DEFAULT_SURFACE: f64 = 30.0;

/// Which of the three published per-m² rates drives the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RentTier {
    /// Upper ("majoré") rate.
    #[default]
    Capped,
    /// Midpoint reference rate.
    Reference,
    /// Lower ("minoré") rate.
    Floor,
}

impl RentTier {
    /// Selects the matching per-m² rate. Total over the enum; an
    /// unrecognized tier cannot reach the pipeline because the interface
    /// boundary rejects unknown values before constructing one.
    pub fn rate(self, record: &RentRecord) -> f64 {
        match self {
            RentTier::Capped => record.reference_rent_capped,
            RentTier::Reference => record.reference_rent,
            RentTier::Floor => record.reference_rent_floor,
        }
    }
}

impl fmt::Display for RentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RentTier::Capped => "capped",
            RentTier::Reference => "reference",
            RentTier::Floor => "floor",
        };
        f.write_str(name)
    }
}

/// Invalid interface input, reported to the caller before any estimation
/// runs.
#[derive(Debug, Error, PartialEq)]
pub enum CriteriaError {
    #[error("budget {0} € outside the supported 300-10000 € range")]
    BudgetOutOfRange(f64),
    #[error("surface {0} m² outside the supported 10-200 m² range")]
    SurfaceOutOfRange(f64),
    #[error("unknown rental type '{0}'")]
    UnknownRentalType(String),
    #[error("unknown construction era '{0}'")]
    UnknownConstructionEra(String),
}

/// Defensive failure for non-finite numeric input. Should not occur for
/// records that passed snapshot validation.
#[derive(Debug, Error, PartialEq)]
#[error("non-finite value in rent computation for '{0}'")]
pub struct ComputationError(pub String);

/// One query's worth of caller input, validated against the snapshot's
/// discovered category sets.
#[derive(Debug, Clone)]
pub struct EstimationCriteria {
    pub budget: f64,
    pub surface_area: f64,
    pub rental_type: String,
    pub allowed_eras: BTreeSet<String>,
    pub rent_tier: RentTier,
}

impl EstimationCriteria {
    /// Resolves raw interface inputs. `rental_type = None` selects the
    /// first discovered type in sorted order; an empty `eras` list selects
    /// all discovered eras.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError`] for out-of-range budget or surface, or a
    /// rental type / era not present in the dataset.
    pub fn resolve(
        snapshot: &DatasetSnapshot,
        budget: f64,
        surface_area: f64,
        rental_type: Option<String>,
        eras: Vec<String>,
        rent_tier: RentTier,
    ) -> Result<Self, CriteriaError> {
        if !budget.is_finite() || !BUDGET_RANGE.contains(&budget) {
            return Err(CriteriaError::BudgetOutOfRange(budget));
        }
        if !surface_area.is_finite() || !SURFACE_RANGE.contains(&surface_area) {
            return Err(CriteriaError::SurfaceOutOfRange(surface_area));
        }

        let rental_type = match rental_type {
            Some(t) if snapshot.rental_types().contains(&t) => t,
            Some(t) => return Err(CriteriaError::UnknownRentalType(t)),
            // Snapshot construction guarantees at least one record.
            None => snapshot
                .rental_types()
                .iter()
                .next()
                .cloned()
                .unwrap_or_default(),
        };

        let allowed_eras = if eras.is_empty() {
            snapshot.construction_eras().clone()
        } else {
            for era in &eras {
                if !snapshot.construction_eras().contains(era) {
                    return Err(CriteriaError::UnknownConstructionEra(era.clone()));
                }
            }
            eras.into_iter().collect()
        };

        Ok(Self {
            budget,
            surface_area,
            rental_type,
            allowed_eras,
            rent_tier,
        })
    }
}

/// A rent record together with its derived estimate for one set of
/// criteria. Borrows the record; nothing upstream is copied or mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedRecord<'a> {
    pub record: &'a RentRecord,
    /// The selected tier's € per m² rate.
    pub rate_per_m2: f64,
    pub estimated_monthly_rent: f64,
    pub within_budget: bool,
}

/// Estimates the monthly rent for one record: selected rate × surface.
///
/// # Errors
///
/// Returns [`ComputationError`] if the rate or surface is non-finite.
pub fn estimate<'a>(
    record: &'a RentRecord,
    criteria: &EstimationCriteria,
) -> Result<EstimatedRecord<'a>, ComputationError> {
    let rate = criteria.rent_tier.rate(record);
    if !rate.is_finite() || !criteria.surface_area.is_finite() {
        return Err(ComputationError(record.neighborhood_name.clone()));
    }

    let estimated_monthly_rent = rate * criteria.surface_area;
    Ok(EstimatedRecord {
        record,
        rate_per_m2: rate,
        estimated_monthly_rent,
        within_budget: estimated_monthly_rent <= criteria.budget,
    })
}

/// Narrows records to the criteria's rental type and era set, estimating
/// each survivor. An empty result means no offer matches the criteria;
/// the caller reports that as a warning, not a failure.
///
/// # Errors
///
/// Propagates the first [`ComputationError`].
pub fn select_eligible<'a>(
    records: &'a [RentRecord],
    criteria: &EstimationCriteria,
) -> Result<Vec<EstimatedRecord<'a>>, ComputationError> {
    records
        .iter()
        .filter(|r| {
            r.rental_type == criteria.rental_type
                && criteria.allowed_eras.contains(&r.construction_era)
        })
        .map(|r| estimate(r, criteria))
        .collect()
}
