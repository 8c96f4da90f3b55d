//! Well-known-text encoding.
//!
//! Produces the classic `TYPE (…)` form with a space after the type name
//! and comma-separated `x y` pairs. Coordinates format via `f64` `Display`,
//! so whole numbers carry no trailing `.0`.

use crate::geometry::{Geometry, Position};

/// Encodes a geometry as WKT.
pub fn encode(geom: &Geometry) -> String {
    match geom {
        Geometry::Point(p) => format!("POINT ({})", pair(p)),
        Geometry::MultiPoint(points) => {
            format!("MULTIPOINT ({})", join(points.iter().map(|p| format!("({})", pair(p)))))
        }
        Geometry::LineString(points) => format!("LINESTRING ({})", sequence(points)),
        Geometry::MultiLineString(lines) => format!(
            "MULTILINESTRING ({})",
            join(lines.iter().map(|l| format!("({})", sequence(l))))
        ),
        Geometry::Polygon(rings) => format!("POLYGON ({})", rings_body(rings)),
        Geometry::MultiPolygon(polys) => format!(
            "MULTIPOLYGON ({})",
            join(polys.iter().map(|p| format!("({})", rings_body(p))))
        ),
    }
}

/// Encodes a bare point from a coordinate pair.
///
/// Used for representative-point fallbacks so callers do not have to build
/// a [`Geometry`] first.
pub fn encode_point(p: &Position) -> String {
    format!("POINT ({})", pair(p))
}

fn pair(p: &Position) -> String {
    format!("{} {}", p[0], p[1])
}

fn sequence(points: &[Position]) -> String {
    join(points.iter().map(pair))
}

fn rings_body(rings: &[Vec<Position>]) -> String {
    join(rings.iter().map(|r| format!("({})", sequence(r))))
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(", ")
}

/// Parses the coordinates of a `POINT (x y)` / `POINT(x y)` string.
///
/// Only points are supported; this exists so exports can be spot-checked
/// without a full WKT parser.
pub fn parse_point(wkt: &str) -> Option<Position> {
    let rest = wkt.trim().strip_prefix("POINT")?.trim();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    let mut parts = inner.split_whitespace();
    let x: f64 = parts.next()?.parse().ok()?;
    let y: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some([x, y])
}
