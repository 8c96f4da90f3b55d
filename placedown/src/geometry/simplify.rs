//! Geometry simplification.
//!
//! Ramer–Douglas–Peucker with guards that keep the output topologically
//! sane: endpoints are always kept, polygon rings stay closed, and a ring
//! that would collapse below four vertices is left unsimplified.

use crate::geometry::{Geometry, Position};

/// Minimum vertex count for a closed ring (triangle plus closing vertex).
const MIN_RING_LEN: usize = 4;

/// Simplifies a geometry at the given tolerance (degrees).
///
/// Returns `None` for point-like geometries, which have nothing to
/// simplify, and for degenerate inputs (empty lines or rings).
pub fn simplify(geom: &Geometry, tolerance: f64) -> Option<Geometry> {
    match geom {
        Geometry::Point(_) | Geometry::MultiPoint(_) => None,
        Geometry::LineString(points) => {
            if points.len() < 2 {
                return None;
            }
            Some(Geometry::LineString(simplify_line(points, tolerance)))
        }
        Geometry::MultiLineString(lines) => {
            if lines.iter().any(|l| l.len() < 2) {
                return None;
            }
            Some(Geometry::MultiLineString(
                lines.iter().map(|l| simplify_line(l, tolerance)).collect(),
            ))
        }
        Geometry::Polygon(rings) => simplify_rings(rings, tolerance).map(Geometry::Polygon),
        Geometry::MultiPolygon(polys) => {
            let simplified: Option<Vec<_>> = polys
                .iter()
                .map(|rings| simplify_rings(rings, tolerance))
                .collect();
            simplified.map(Geometry::MultiPolygon)
        }
    }
}

fn simplify_rings(rings: &[Vec<Position>], tolerance: f64) -> Option<Vec<Vec<Position>>> {
    if rings.is_empty() || rings.iter().any(|r| r.len() < MIN_RING_LEN) {
        return None;
    }
    Some(
        rings
            .iter()
            .map(|ring| {
                let reduced = simplify_line(ring, tolerance);
                if reduced.len() < MIN_RING_LEN {
                    // Would collapse the ring; keep the original.
                    ring.clone()
                } else {
                    reduced
                }
            })
            .collect(),
    )
}

/// Ramer–Douglas–Peucker over an open or closed vertex sequence.
fn simplify_line(points: &[Position], tolerance: f64) -> Vec<Position> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    mark_kept(points, 0, points.len() - 1, tolerance, &mut keep);

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn mark_kept(points: &[Position], first: usize, last: usize, tolerance: f64, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }

    let mut max_distance = 0.0;
    let mut max_index = first;
    for i in (first + 1)..last {
        let d = perpendicular_distance(&points[i], &points[first], &points[last]);
        if d > max_distance {
            max_distance = d;
            max_index = i;
        }
    }

    if max_distance > tolerance {
        keep[max_index] = true;
        mark_kept(points, first, max_index, tolerance, keep);
        mark_kept(points, max_index, last, tolerance, keep);
    }
}

fn perpendicular_distance(p: &Position, a: &Position, b: &Position) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        // Segment endpoints coincide; fall back to point distance.
        return ((p[0] - a[0]).powi(2) + (p[1] - a[1]).powi(2)).sqrt();
    }
    // Distance from p to the infinite line through a and b.
    (dy * p[0] - dx * p[1] + b[0] * a[1] - b[1] * a[0]).abs() / len_sq.sqrt()
}
