use crate::pipeline::types::{PlacedPanel, Point};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point as IpPoint;

pub const PANEL_FILL: Rgb<u8> = Rgb([0, 0, 255]);
pub const PANEL_OUTLINE: Rgb<u8> = Rgb([40, 40, 40]);
/// Weight of the drawn layer when composited onto the source.
pub const OVERLAY_ALPHA: f32 = 0.32;

/// Pixel offsets giving the outline a 2 px stroke.
const STROKE_OFFSETS: [(f32, f32); 3] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];

fn integer_corners(corners: &[Point; 4]) -> Vec<IpPoint<i32>> {
    corners
        .iter()
        .map(|p| IpPoint::new(p.x.round() as i32, p.y.round() as i32))
        .collect()
}

/// Draws filled and outlined panels on a copy of `base` and blends it back at `OVERLAY_ALPHA`.
pub fn render_overlay(base: &RgbImage, panels: &[PlacedPanel]) -> RgbImage {
    let mut layer = base.clone();

    for panel in panels {
        let mut pts = integer_corners(&panel.corners);
        pts.dedup();
        if pts.len() >= 3 && pts.first() != pts.last() {
            draw_polygon_mut(&mut layer, &pts, PANEL_FILL);
        }

        for i in 0..panel.corners.len() {
            let a = panel.corners[i];
            let b = panel.corners[(i + 1) % panel.corners.len()];
            for (dx, dy) in STROKE_OFFSETS {
                draw_line_segment_mut(
                    &mut layer,
                    (a.x as f32 + dx, a.y as f32 + dy),
                    (b.x as f32 + dx, b.y as f32 + dy),
                    PANEL_OUTLINE,
                );
            }
        }
    }

    blend(base, &layer, OVERLAY_ALPHA)
}

/// `(1 - alpha) * base + alpha * layer`, per channel.
pub fn blend(base: &RgbImage, layer: &RgbImage, alpha: f32) -> RgbImage {
    let mut out = base.clone();
    for (dst, top) in out.pixels_mut().zip(layer.pixels()) {
        for c in 0..3 {
            let v = (1.0 - alpha) * dst.0[c] as f32 + alpha * top.0[c] as f32;
            dst.0[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Orientation;

    fn panel(x: f64, y: f64, w: f64, h: f64) -> PlacedPanel {
        PlacedPanel {
            corners: [
                Point::new(x, y),
                Point::new(x + w, y),
                Point::new(x + w, y + h),
                Point::new(x, y + h),
            ],
            orientation: Orientation::Portrait,
        }
    }

    #[test]
    fn no_panels_leaves_image_untouched() {
        let base = RgbImage::from_pixel(20, 20, Rgb([100, 150, 200]));
        assert_eq!(render_overlay(&base, &[]), base);
    }

    #[test]
    fn panel_interior_is_tinted_blue() {
        let base = RgbImage::from_pixel(40, 40, Rgb([200, 200, 200]));
        let out = render_overlay(&base, &[panel(10.0, 10.0, 20.0, 15.0)]);

        // 0.68 * 200 + 0.32 * fill
        assert_eq!(out.get_pixel(20, 18), &Rgb([136, 136, 218]));
        assert_eq!(out.get_pixel(2, 2), &Rgb([200, 200, 200]));
        // outline colour on the top edge
        assert_eq!(out.get_pixel(20, 10), &Rgb([149, 149, 149]));
    }

    #[test]
    fn degenerate_panel_is_skipped() {
        let base = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let out = render_overlay(&base, &[panel(5.0, 5.0, 0.0, 0.0)]);
        assert_eq!(out.dimensions(), (10, 10));
    }
}
