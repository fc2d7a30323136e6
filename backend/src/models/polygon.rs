//! Polygon, site and project records read by the validators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

crate::define_id_type!(Uuid, PolygonUuid);
crate::define_id_type!(Uuid, SiteUuid);
crate::define_id_type!(Uuid, ProjectUuid);

/// A longitude/latitude pair in degrees (EPSG:4326), serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.x, c.y]
    }
}

/// Exterior boundary of a polygon.
///
/// Rings are stored closed (first coordinate repeated at the end); [`Ring::new`]
/// closes an open coordinate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ring {
    pub coordinates: Vec<Coordinate>,
}

impl Ring {
    pub fn new(mut coordinates: Vec<Coordinate>) -> Self {
        let open = match (coordinates.first(), coordinates.last()) {
            (Some(first), Some(last)) => first != last,
            _ => false,
        };
        if open {
            let first = coordinates[0];
            coordinates.push(first);
        }
        Self { coordinates }
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self::new(pairs.iter().map(|&(x, y)| Coordinate::new(x, y)).collect())
    }

    /// Vertices without the closing duplicate.
    pub fn vertices(&self) -> &[Coordinate] {
        match self.coordinates.len() {
            0 | 1 => &self.coordinates,
            n if self.coordinates[0] == self.coordinates[n - 1] => &self.coordinates[..n - 1],
            _ => &self.coordinates,
        }
    }
}

/// Descriptive fields captured by field teams for a polygon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonAttributes {
    pub poly_name: Option<String>,
    pub practice: Option<String>,
    pub target_sys: Option<String>,
    pub distr: Option<String>,
    pub num_trees: Option<i32>,
    pub plantstart: Option<NaiveDate>,
}

/// A polygon as stored in the geometry store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonRecord {
    pub uuid: PolygonUuid,
    pub site_uuid: SiteUuid,
    pub attributes: PolygonAttributes,
    /// Area in hectares as recorded at upload time.
    pub calc_area: Option<f64>,
    pub is_active: bool,
    pub boundary: Ring,
}

/// Polygon metadata joined with its owning site, as read by metadata checks.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonDetails {
    pub uuid: PolygonUuid,
    pub site_uuid: SiteUuid,
    pub attributes: PolygonAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub uuid: SiteUuid,
    pub name: String,
    pub project_uuid: ProjectUuid,
    pub start_date: Option<NaiveDate>,
    pub area_goal_hectares: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub uuid: ProjectUuid,
    pub name: String,
    pub area_goal_hectares: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_is_closed_on_construction() {
        let ring = Ring::from_pairs(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(ring.coordinates.len(), 4);
        assert_eq!(ring.coordinates[0], ring.coordinates[3]);
        assert_eq!(ring.vertices().len(), 3);
    }

    #[test]
    fn test_coordinate_serializes_as_pair() {
        let json = serde_json::to_value(Coordinate::new(1.5, -2.0)).unwrap();
        assert_eq!(json, serde_json::json!([1.5, -2.0]));
        let back: Coordinate = serde_json::from_value(json).unwrap();
        assert_eq!(back, Coordinate::new(1.5, -2.0));
    }
}
