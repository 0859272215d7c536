use crate::pipeline::geometry::{normalize_angle, to_geo_polygon};
use crate::pipeline::types::RoofOutline;
use geo::{EuclideanLength, MinimumRotatedRect, Simplify};
use geo_types::{Coord, LineString, MultiPoint, Point as GeoPoint};

/// Simplification tolerance as a fraction of the contour perimeter.
const SIMPLIFY_FRACTION: f64 = 0.01;

/// Simplifies a closed contour at `SIMPLIFY_FRACTION` of its perimeter.
/// Falls back to the raw points if fewer than 3 vertices survive.
pub fn simplify_contour(contour: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut ring: Vec<Coord<f64>> = contour.to_vec();
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    let closed = LineString::from(ring);
    let epsilon = SIMPLIFY_FRACTION * closed.euclidean_length();
    let simplified = closed.simplify(&epsilon);

    // A closed ring repeats its first vertex
    let vertices = simplified.0.len().saturating_sub(1);
    if vertices >= 3 {
        simplified.0[..vertices].to_vec()
    } else {
        contour.to_vec()
    }
}

/// Long-axis angle in [0, 180) and side lengths of the minimum-area bounding rectangle.
pub fn principal_axis(contour: &[Coord<f64>]) -> (f64, f64, f64) {
    let points: MultiPoint<f64> = contour.iter().map(|c| GeoPoint::from(*c)).collect();
    let Some(rect) = points.minimum_rotated_rect() else {
        return (0.0, 0.0, 0.0);
    };
    let corners: Vec<Coord<f64>> = rect.exterior().coords().copied().collect();
    if corners.len() < 3 {
        return (0.0, 0.0, 0.0);
    }

    let a = corners[1] - corners[0];
    let b = corners[2] - corners[1];
    let len_a = a.x.hypot(a.y);
    let len_b = b.x.hypot(b.y);
    let (long, long_len, short_len) = if len_a >= len_b {
        (a, len_a, len_b)
    } else {
        (b, len_b, len_a)
    };
    if long_len <= f64::EPSILON {
        return (0.0, long_len, short_len);
    }

    let angle = normalize_angle(long.y.atan2(long.x).to_degrees());
    (angle, long_len, short_len)
}

/// Builds the roof polygon and its orientation from the external contour.
pub fn build_outline(contour: &[Coord<f64>]) -> RoofOutline {
    let vertices = simplify_contour(contour);
    let (principal_axis_deg, long_side_px, short_side_px) = principal_axis(contour);
    RoofOutline {
        polygon: to_geo_polygon(&vertices),
        principal_axis_deg,
        long_side_px,
        short_side_px,
    }
}

/// Real-world roof length and width from area and bounding-rectangle aspect ratio.
pub fn estimate_dimensions(area_m2: f64, aspect_ratio: f64) -> (f64, f64) {
    let r = if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
        aspect_ratio
    } else {
        1.0
    };
    let length = (area_m2 * r).sqrt();
    let width = if length > 0.0 { area_m2 / length } else { 0.0 };
    (length, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    /// Dense boundary of an axis-aligned rectangle, like a traced contour.
    fn traced_rect(x0: f64, y0: f64, w: f64, h: f64) -> Vec<Coord<f64>> {
        let mut pts = Vec::new();
        for i in 0..w as i32 {
            pts.push(Coord { x: x0 + i as f64, y: y0 });
        }
        for i in 0..h as i32 {
            pts.push(Coord { x: x0 + w, y: y0 + i as f64 });
        }
        for i in 0..w as i32 {
            pts.push(Coord { x: x0 + w - i as f64, y: y0 + h });
        }
        for i in 0..h as i32 {
            pts.push(Coord { x: x0, y: y0 + h - i as f64 });
        }
        pts
    }

    #[test]
    fn rectangle_simplifies_to_corners() {
        let contour = traced_rect(10.0, 10.0, 120.0, 80.0);
        let simplified = simplify_contour(&contour);
        assert_eq!(simplified.len(), 4);
        let poly = to_geo_polygon(&simplified);
        assert!((poly.unsigned_area() - 120.0 * 80.0).abs() < 1e-6);
    }

    #[test]
    fn collapsed_contour_keeps_raw_points() {
        let contour = vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 5.0, y: 0.0 }];
        assert_eq!(simplify_contour(&contour), contour);
    }

    #[test]
    fn horizontal_rectangle_axis_is_zero() {
        let (angle, long, short) = principal_axis(&traced_rect(0.0, 0.0, 120.0, 80.0));
        assert!(angle.abs() < 1e-6 || (angle - 180.0).abs() < 1e-6, "angle {}", angle);
        assert!((long - 120.0).abs() < 1e-6);
        assert!((short - 80.0).abs() < 1e-6);
    }

    #[test]
    fn vertical_rectangle_axis_is_ninety() {
        let (angle, _, _) = principal_axis(&traced_rect(0.0, 0.0, 40.0, 100.0));
        assert!((angle - 90.0).abs() < 1e-6, "angle {}", angle);
    }

    #[test]
    fn dimensions_follow_aspect_ratio() {
        let (l, w) = estimate_dimensions(120.0, 1.2);
        assert!((l - 12.0).abs() < 1e-9);
        assert!((w - 10.0).abs() < 1e-9);
        let (l, w) = estimate_dimensions(100.0, f64::NAN);
        assert_eq!((l, w), (10.0, 10.0));
    }
}
