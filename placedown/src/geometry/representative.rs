//! Representative single-point encodings.
//!
//! Last-resort fallbacks for geometries whose WKT cannot fit the size
//! budget: a point guaranteed to lie on the geometry where cheaply
//! possible, with the centroid as the looser alternative.

use crate::geometry::{Geometry, Position};

/// Returns a point that lies on (or for thin slivers, very near) the
/// geometry.
///
/// Polygons use the midpoint of the widest horizontal span at the centroid
/// latitude, the classic point-on-surface construction; lines use their
/// middle vertex; points pass through. `None` only for empty geometries.
pub fn representative_point(geom: &Geometry) -> Option<Position> {
    match geom {
        Geometry::Point(p) => Some(*p),
        Geometry::MultiPoint(points) => points.first().copied(),
        Geometry::LineString(points) => middle_vertex(points),
        Geometry::MultiLineString(lines) => {
            let longest = lines.iter().max_by(|a, b| {
                path_length(a)
                    .partial_cmp(&path_length(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
            middle_vertex(longest)
        }
        Geometry::Polygon(rings) => interior_point(rings).or_else(|| centroid(geom)),
        Geometry::MultiPolygon(polys) => {
            let largest = polys.iter().max_by(|a, b| {
                ring_area(a.first())
                    .partial_cmp(&ring_area(b.first()))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
            interior_point(largest).or_else(|| centroid(geom))
        }
    }
}

/// Returns the centroid of a geometry.
///
/// Polygons use the area-weighted centroid of their outer rings; lines and
/// point sets use the vertex average. `None` for empty geometries.
pub fn centroid(geom: &Geometry) -> Option<Position> {
    match geom {
        Geometry::Point(p) => Some(*p),
        Geometry::MultiPoint(points) | Geometry::LineString(points) => vertex_average(points),
        Geometry::MultiLineString(lines) => {
            let all: Vec<Position> = lines.iter().flatten().copied().collect();
            vertex_average(&all)
        }
        Geometry::Polygon(rings) => ring_centroid(rings.first()?),
        Geometry::MultiPolygon(polys) => {
            // Area-weighted combination of the outer rings.
            let mut total_area = 0.0;
            let mut cx = 0.0;
            let mut cy = 0.0;
            for poly in polys {
                let ring = poly.first()?;
                let area = ring_area(Some(ring));
                let c = ring_centroid(ring)?;
                total_area += area;
                cx += c[0] * area;
                cy += c[1] * area;
            }
            if total_area > 0.0 {
                Some([cx / total_area, cy / total_area])
            } else {
                let all: Vec<Position> =
                    polys.iter().flatten().flatten().copied().collect();
                vertex_average(&all)
            }
        }
    }
}

fn middle_vertex(points: &[Position]) -> Option<Position> {
    if points.is_empty() {
        None
    } else {
        Some(points[points.len() / 2])
    }
}

fn vertex_average(points: &[Position]) -> Option<Position> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
    Some([sx / n, sy / n])
}

/// Shoelace area of a closed ring; 0.0 for missing or degenerate rings.
fn ring_area(ring: Option<&Vec<Position>>) -> f64 {
    let Some(ring) = ring else { return 0.0 };
    if ring.len() < 4 {
        return 0.0;
    }
    let mut sum = 0.0;
    for pair in ring.windows(2) {
        sum += pair[0][0] * pair[1][1] - pair[1][0] * pair[0][1];
    }
    (sum / 2.0).abs()
}

/// Area-weighted centroid of a single closed ring, by the shoelace
/// formula. Falls back to the vertex average for degenerate rings.
fn ring_centroid(ring: &[Position]) -> Option<Position> {
    if ring.len() < 4 {
        return vertex_average(ring);
    }
    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for pair in ring.windows(2) {
        let cross = pair[0][0] * pair[1][1] - pair[1][0] * pair[0][1];
        area2 += cross;
        cx += (pair[0][0] + pair[1][0]) * cross;
        cy += (pair[0][1] + pair[1][1]) * cross;
    }
    if area2.abs() < f64::EPSILON {
        return vertex_average(ring);
    }
    Some([cx / (3.0 * area2), cy / (3.0 * area2)])
}

fn path_length(points: &[Position]) -> f64 {
    points
        .windows(2)
        .map(|pair| {
            ((pair[1][0] - pair[0][0]).powi(2) + (pair[1][1] - pair[0][1]).powi(2)).sqrt()
        })
        .sum()
}

/// Point-on-surface analogue: intersects the horizontal line through the
/// outer ring's centroid latitude with every ring edge, then takes the
/// midpoint of the widest inside span (even-odd rule).
fn interior_point(rings: &[Vec<Position>]) -> Option<Position> {
    let outer = rings.first()?;
    let scan_y = ring_centroid(outer)?[1];

    let mut crossings: Vec<f64> = Vec::new();
    for ring in rings {
        if ring.len() < 2 {
            continue;
        }
        for pair in ring.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            // Half-open on the upper endpoint so shared vertices count once.
            if (a[1] <= scan_y && b[1] > scan_y) || (b[1] <= scan_y && a[1] > scan_y) {
                let t = (scan_y - a[1]) / (b[1] - a[1]);
                crossings.push(a[0] + t * (b[0] - a[0]));
            }
        }
    }

    if crossings.len() < 2 {
        return None;
    }
    crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut best: Option<(f64, f64)> = None;
    for span in crossings.chunks(2) {
        if span.len() < 2 {
            break;
        }
        let width = span[1] - span[0];
        if best.map(|(w, _)| width > w).unwrap_or(true) {
            best = Some((width, (span[0] + span[1]) / 2.0));
        }
    }
    best.map(|(_, x)| [x, scan_y])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Position> {
        vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]]
    }

    #[test]
    fn test_point_passthrough() {
        assert_eq!(
            representative_point(&Geometry::Point([3.0, 4.0])),
            Some([3.0, 4.0])
        );
    }

    #[test]
    fn test_line_middle_vertex() {
        let line = Geometry::LineString(vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]]);
        assert_eq!(representative_point(&line), Some([1.0, 1.0]));
    }

    #[test]
    fn test_square_interior_point_is_center() {
        let geom = Geometry::Polygon(vec![square()]);
        let p = representative_point(&geom).unwrap();
        assert!((p[0] - 2.0).abs() < 1e-9);
        assert!((p[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_square_centroid() {
        let geom = Geometry::Polygon(vec![square()]);
        let c = centroid(&geom).unwrap();
        assert!((c[0] - 2.0).abs() < 1e-9);
        assert!((c[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_concave_polygon_point_falls_inside() {
        // U shape whose centroid sits in the notch, outside the polygon.
        let ring = vec![
            [0.0, 0.0],
            [6.0, 0.0],
            [6.0, 6.0],
            [4.0, 6.0],
            [4.0, 2.0],
            [2.0, 2.0],
            [2.0, 6.0],
            [0.0, 6.0],
            [0.0, 0.0],
        ];
        let p = representative_point(&Geometry::Polygon(vec![ring.clone()])).unwrap();
        // The point must be inside one of the two arms or the base, never
        // in the open notch between x=2 and x=4 above y=2.
        let in_notch = p[0] > 2.0 && p[0] < 4.0 && p[1] > 2.0;
        assert!(!in_notch, "representative point {:?} fell in the notch", p);
    }

    #[test]
    fn test_polygon_with_hole_avoids_hole() {
        let outer = square();
        let hole = vec![[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0], [1.0, 1.0]];
        let p = representative_point(&Geometry::Polygon(vec![outer, hole])).unwrap();
        let in_hole = p[0] > 1.0 && p[0] < 3.0 && p[1] > 1.0 && p[1] < 3.0;
        assert!(!in_hole, "representative point {:?} fell in the hole", p);
    }

    #[test]
    fn test_multipolygon_uses_largest() {
        let small = vec![vec![
            [10.0, 10.0],
            [11.0, 10.0],
            [11.0, 11.0],
            [10.0, 11.0],
            [10.0, 10.0],
        ]];
        let large = vec![square()];
        let p = representative_point(&Geometry::MultiPolygon(vec![small, large])).unwrap();
        assert!(p[0] >= 0.0 && p[0] <= 4.0);
        assert!(p[1] >= 0.0 && p[1] <= 4.0);
    }

    #[test]
    fn test_empty_geometries() {
        assert_eq!(representative_point(&Geometry::MultiPoint(vec![])), None);
        assert_eq!(representative_point(&Geometry::Polygon(vec![])), None);
        assert_eq!(centroid(&Geometry::LineString(vec![])), None);
    }

    #[test]
    fn test_multiline_uses_longest() {
        let geom = Geometry::MultiLineString(vec![
            vec![[0.0, 0.0], [0.1, 0.0]],
            vec![[5.0, 5.0], [6.0, 5.0], [7.0, 5.0]],
        ]);
        assert_eq!(representative_point(&geom), Some([6.0, 5.0]));
    }
}
