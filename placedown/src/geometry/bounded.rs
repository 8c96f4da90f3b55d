//! Bounded-size WKT encoding.
//!
//! Table exports carry a `geowkt` column with a hard character budget.
//! Point-like geometries always encode in full; complex geometries walk a
//! three-tier policy: full WKT, then simplified WKT, then a representative
//! point. Nothing here ever fails the record — the worst case is a bare
//! point or an empty string.

use crate::geometry::{representative_point, simplify, wkt, Geometry};

/// Encodes a geometry as WKT within `max_len` characters.
///
/// Tier 1: full WKT if it fits (and always for points/multipoints).
/// Tier 2: simplify at `tolerance` and re-encode if that fits.
/// Tier 3: representative point.
/// Degradation: bare `POINT(lon lat)` from the primary coordinate if even
/// the fallbacks are unavailable, else empty.
pub fn encode_bounded(geom: &Geometry, max_len: usize, tolerance: f64) -> String {
    let full = wkt::encode(geom);
    if geom.is_simple() || full.len() <= max_len {
        return full;
    }

    if let Some(simplified) = simplify(geom, tolerance) {
        let reduced = wkt::encode(&simplified);
        if reduced.len() <= max_len {
            return reduced;
        }
    }

    if let Some(point) = representative_point(geom) {
        return wkt::encode_point(&point);
    }

    match geom.primary_coordinate() {
        Some([lon, lat]) => format!("POINT({} {})", lon, lat),
        None => String::new(),
    }
}
