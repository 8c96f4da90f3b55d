//! Geometry model and encoding.
//!
//! Geometries arrive from the record source in GeoJSON shape and leave the
//! table export as well-known text. This module provides the model plus the
//! encoding pipeline: full WKT, topology-aware simplification, and
//! representative-point fallbacks, combined by the bounded-size policy in
//! [`bounded`].

mod bounded;
mod representative;
mod simplify;
pub mod wkt;

pub use bounded::encode_bounded;
pub use representative::{centroid, representative_point};
pub use simplify::simplify;

use serde::{Deserialize, Serialize};

/// A single lon/lat coordinate pair.
pub type Position = [f64; 2];

/// GeoJSON-shaped geometry.
///
/// Adjacent tagging makes the serde form exactly the GeoJSON object:
/// `{"type": "Point", "coordinates": [lon, lat]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// Returns the primary coordinate used for the `lon`/`lat` columns.
    ///
    /// Point and MultiPoint use the first pair, LineString the first
    /// vertex, Polygon the first ring's first vertex, MultiPolygon the
    /// first polygon's first ring's first vertex. MultiLineString has no
    /// primary coordinate.
    pub fn primary_coordinate(&self) -> Option<Position> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::MultiPoint(points) | Geometry::LineString(points) => {
                points.first().copied()
            }
            Geometry::Polygon(rings) => rings.first().and_then(|r| r.first()).copied(),
            Geometry::MultiPolygon(polys) => polys
                .first()
                .and_then(|p| p.first())
                .and_then(|r| r.first())
                .copied(),
            Geometry::MultiLineString(_) => None,
        }
    }

    /// True for point-like geometries that are always encoded in full.
    pub fn is_simple(&self) -> bool {
        matches!(self, Geometry::Point(_) | Geometry::MultiPoint(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geojson_round_trip() {
        let json = r#"{"type":"Point","coordinates":[12.5,41.9]}"#;
        let geom: Geometry = serde_json::from_str(json).unwrap();
        assert_eq!(geom, Geometry::Point([12.5, 41.9]));
        assert_eq!(serde_json::to_string(&geom).unwrap(), json);
    }

    #[test]
    fn test_polygon_deserializes() {
        let json = r#"{"type":"Polygon","coordinates":[[[0.0,0.0],[4.0,0.0],[4.0,4.0],[0.0,0.0]]]}"#;
        let geom: Geometry = serde_json::from_str(json).unwrap();
        match geom {
            Geometry::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].len(), 4);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_primary_coordinate_point() {
        let geom = Geometry::Point([1.0, 2.0]);
        assert_eq!(geom.primary_coordinate(), Some([1.0, 2.0]));
    }

    #[test]
    fn test_primary_coordinate_multipoint_and_linestring() {
        let coords = vec![[3.0, 4.0], [5.0, 6.0]];
        assert_eq!(
            Geometry::MultiPoint(coords.clone()).primary_coordinate(),
            Some([3.0, 4.0])
        );
        assert_eq!(
            Geometry::LineString(coords).primary_coordinate(),
            Some([3.0, 4.0])
        );
    }

    #[test]
    fn test_primary_coordinate_polygons() {
        let ring = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
        assert_eq!(
            Geometry::Polygon(vec![ring.clone()]).primary_coordinate(),
            Some([0.0, 0.0])
        );
        assert_eq!(
            Geometry::MultiPolygon(vec![vec![ring]]).primary_coordinate(),
            Some([0.0, 0.0])
        );
    }

    #[test]
    fn test_primary_coordinate_multilinestring_absent() {
        let geom = Geometry::MultiLineString(vec![vec![[0.0, 0.0], [1.0, 1.0]]]);
        assert_eq!(geom.primary_coordinate(), None);
    }

    #[test]
    fn test_primary_coordinate_empty_shapes() {
        assert_eq!(Geometry::MultiPoint(vec![]).primary_coordinate(), None);
        assert_eq!(Geometry::Polygon(vec![]).primary_coordinate(), None);
    }

    #[test]
    fn test_is_simple() {
        assert!(Geometry::Point([0.0, 0.0]).is_simple());
        assert!(Geometry::MultiPoint(vec![]).is_simple());
        assert!(!Geometry::LineString(vec![]).is_simple());
        assert!(!Geometry::Polygon(vec![]).is_simple());
    }
}
