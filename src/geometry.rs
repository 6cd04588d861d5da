//! Geometry decoding and renderer adaptation.
//!
//! The source's `geo_shape` column carries a JSON object whose
//! `coordinates` member holds nested `[longitude, latitude]` pairs, either
//! as a polygon (rings of pairs) or a multipolygon (a list of polygons).
//! Renderers consume `[latitude, longitude]`, so [`outline`] swaps the
//! axis order as an explicit step.

use serde::Deserialize;
use thiserror::Error;

/// Decoded `geo_shape` payload. Only the `coordinates` member of the
/// source object is retained; pairs stay in storage order (lon, lat).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoShape {
    pub(crate) coordinates: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

impl GeoShape {
    /// Decodes a raw `geo_shape` string. Returns `None` on malformed JSON,
    /// a missing `coordinates` member, or an unexpected nesting shape.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Reasons a decoded shape still has nothing renderable in it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("geometry contains no polygon")]
    NoPolygon,
    #[error("first polygon has an empty outer ring")]
    EmptyRing,
    #[error("non-finite coordinate in outer ring")]
    NonFinite,
}

/// Returns the renderer-ready outline of a shape: the first ring of the
/// first polygon, with each pair swapped from storage order (lon, lat) to
/// renderer order (lat, lon).
///
/// # Errors
///
/// Returns [`GeometryError`] when the shape holds no polygon, the outer
/// ring is empty, or a coordinate is not finite. Callers treat this as
/// "no renderable geometry" rather than a batch failure.
pub fn outline(shape: &GeoShape) -> Result<Vec<[f64; 2]>, GeometryError> {
    let ring = match &shape.coordinates {
        Coordinates::Polygon(rings) => rings.first(),
        Coordinates::MultiPolygon(polygons) => polygons.first().and_then(|p| p.first()),
    }
    .ok_or(GeometryError::NoPolygon)?;

    if ring.is_empty() {
        return Err(GeometryError::EmptyRing);
    }

    ring.iter()
        .map(|&[lon, lat]| {
            if lon.is_finite() && lat.is_finite() {
                Ok([lat, lon])
            } else {
                Err(GeometryError::NonFinite)
            }
        })
        .collect()
}
