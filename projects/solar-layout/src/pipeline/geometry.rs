use geo::orient::{Direction, Orient};
use geo::{Area, BooleanOps, Contains, Rotate};
use geo_buffer::buffer_polygon;
use geo_types::{Coord, LineString, MultiPolygon, Point as GeoPoint, Polygon, Rect};

/// Margin applied to containment tests so panels never touch the region boundary.
pub const CONTAINMENT_MARGIN_PX: f64 = 1e-6;

/// Convert contour coordinates to a geo_types Polygon
pub fn to_geo_polygon(points: &[Coord<f64>]) -> Polygon<f64> {
    Polygon::new(LineString::from(points.to_vec()), vec![])
}

/// Helper to buffer a polygon (positive distance expands, negative contracts)
pub fn buffer_poly(poly: &Polygon<f64>, distance: f64) -> MultiPolygon<f64> {
    if distance == 0.0 {
        return MultiPolygon(vec![poly.clone()]);
    }
    let oriented = poly.orient(Direction::Default);
    let buffered = buffer_polygon(&oriented, distance);
    MultiPolygon(
        buffered
            .0
            .into_iter()
            .filter(|p| p.unsigned_area() > f64::EPSILON)
            .collect(),
    )
}

/// Contracts every part of a region inward by `distance` (>= 0).
pub fn shrink_region(region: &MultiPolygon<f64>, distance: f64) -> MultiPolygon<f64> {
    MultiPolygon(
        region
            .0
            .iter()
            .flat_map(|part| buffer_poly(part, -distance.abs()).0)
            .collect(),
    )
}

/// Union of an arbitrary set of polygons
pub fn union_all(polys: &[Polygon<f64>]) -> MultiPolygon<f64> {
    polys.iter().fold(MultiPolygon(vec![]), |acc, poly| {
        acc.union(&MultiPolygon(vec![poly.clone()]))
    })
}

/// Rotates a region about `center` by `angle_deg` (counter-clockwise in the x-right/y-up sense)
pub fn rotate_region(region: &MultiPolygon<f64>, angle_deg: f64, center: Coord<f64>) -> MultiPolygon<f64> {
    if angle_deg == 0.0 {
        return region.clone();
    }
    region.rotate_around_point(angle_deg, GeoPoint::from(center))
}

pub fn rotate_polygon(poly: &Polygon<f64>, angle_deg: f64, center: Coord<f64>) -> Polygon<f64> {
    if angle_deg == 0.0 {
        return poly.clone();
    }
    poly.rotate_around_point(angle_deg, GeoPoint::from(center))
}

pub fn region_area(region: &MultiPolygon<f64>) -> f64 {
    region.0.iter().map(|p| p.unsigned_area()).sum()
}

/// Normalizes an angle in degrees to [0, 180)
pub fn normalize_angle(angle_deg: f64) -> f64 {
    let a = angle_deg.rem_euclid(180.0);
    if a >= 180.0 {
        0.0
    } else {
        a
    }
}

/// Axis-aligned panel rectangle with its top-left corner at (x, y)
pub fn panel_rect(x: f64, y: f64, w: f64, h: f64) -> Rect<f64> {
    Rect::new(Coord { x, y }, Coord { x: x + w, y: y + h })
}

/// True if `rect` lies inside `part` with at least `CONTAINMENT_MARGIN_PX` to spare.
pub fn contains_rect(part: &Polygon<f64>, rect: &Rect<f64>) -> bool {
    let m = CONTAINMENT_MARGIN_PX;
    let grown = Rect::new(
        Coord {
            x: rect.min().x - m,
            y: rect.min().y - m,
        },
        Coord {
            x: rect.max().x + m,
            y: rect.max().y + m,
        },
    );
    let poly = grown.to_polygon();

    // Cheap corner test before the full relate-based check
    if !poly
        .exterior()
        .coords()
        .all(|c| part.contains(c))
    {
        return false;
    }
    part.contains(&poly)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, side: f64) -> Polygon<f64> {
        panel_rect(x0, y0, side, side).to_polygon()
    }

    #[test]
    fn normalize_wraps_into_half_turn() {
        assert_eq!(normalize_angle(190.0), 10.0);
        assert_eq!(normalize_angle(-5.0), 175.0);
        assert_eq!(normalize_angle(180.0), 0.0);
        assert_eq!(normalize_angle(0.0), 0.0);
    }

    #[test]
    fn shrink_contracts_square() {
        let region = MultiPolygon(vec![square(0.0, 0.0, 100.0)]);
        let shrunk = shrink_region(&region, 10.0);
        assert!((region_area(&shrunk) - 80.0 * 80.0).abs() < 1e-3);
    }

    #[test]
    fn rotate_quarter_turn_preserves_area() {
        let region = MultiPolygon(vec![square(10.0, 10.0, 20.0)]);
        let rotated = rotate_region(&region, 90.0, Coord { x: 0.0, y: 0.0 });
        assert!((region_area(&rotated) - 400.0).abs() < 1e-6);
        let back = rotate_region(&rotated, -90.0, Coord { x: 0.0, y: 0.0 });
        assert!((region_area(&back.intersection(&region)) - 400.0).abs() < 1e-3);
    }

    #[test]
    fn union_merges_overlapping_squares() {
        let merged = union_all(&[square(0.0, 0.0, 10.0), square(5.0, 0.0, 10.0)]);
        assert!((region_area(&merged) - 150.0).abs() < 1e-6);
    }

    #[test]
    fn contains_rect_rejects_touching_boundary() {
        let part = square(0.0, 0.0, 10.0);
        assert!(contains_rect(&part, &panel_rect(1.0, 1.0, 4.0, 4.0)));
        assert!(!contains_rect(&part, &panel_rect(0.0, 0.0, 4.0, 4.0)));
        assert!(!contains_rect(&part, &panel_rect(8.0, 8.0, 4.0, 4.0)));
    }
}
