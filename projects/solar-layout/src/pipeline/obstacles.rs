//! Obstacle inference inside the roof mask.
//!
//! Three independent signals are combined: shadow-dark pixels, dense edge
//! texture, and strong intensity gradients (elevation or material changes).
//! The union is cleaned of specks, dilated by the obstacle clearance and
//! vectorized into polygons in the image frame.

use crate::config::{ObstacleMode, ObstacleThresholds};
use crate::pipeline::geometry::to_geo_polygon;
use crate::pipeline::mask::to_gray;
use crate::pipeline::polygon::simplify_contour;
use crate::pipeline::types::{RoofMask, ScaleFactor};
use geo::Area;
use geo_types::{Coord, LineString, Polygon};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::{box_filter, gaussian_blur_f32};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::morphology::dilate;
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::{debug, info};

const VALUE_BLUR_SIGMA: f32 = 1.1;
const GRAY_BLUR_SIGMA: f32 = 0.8;
const CANNY_LOW: f32 = 80.0;
const CANNY_HIGH: f32 = 160.0;
/// Side of the smallest obstacle kept, in metres.
const MIN_OBSTACLE_SIDE_M: f64 = 0.25;

/// Per-pixel signals shared by every threshold pass.
struct ObstacleSignals {
    width: u32,
    height: u32,
    roof: Vec<bool>,
    value: GrayImage,
    edges: GrayImage,
    gradient: Vec<f64>,
    roof_values: Vec<f64>,
    roof_gradients: Vec<f64>,
}

impl ObstacleSignals {
    fn compute(image: &RgbImage, mask: &RoofMask) -> Self {
        let (width, height) = image.dimensions();

        let value = GrayImage::from_fn(width, height, |x, y| {
            let p = image.get_pixel(x, y).0;
            Luma([p[0].max(p[1]).max(p[2])])
        });
        let value = gaussian_blur_f32(&value, VALUE_BLUR_SIGMA);
        let gray = gaussian_blur_f32(&to_gray(image), GRAY_BLUR_SIGMA);

        let roof: Vec<bool> = mask.image.pixels().map(|p| p.0[0] > 0).collect();

        let mut edges = canny(&value, CANNY_LOW, CANNY_HIGH);
        for (p, inside) in edges.pixels_mut().zip(&roof) {
            if !inside {
                p.0[0] = 0;
            }
        }

        let gx = horizontal_sobel(&gray);
        let gy = vertical_sobel(&gray);
        let gradient: Vec<f64> = gx
            .pixels()
            .zip(gy.pixels())
            .map(|(a, b)| (a.0[0] as f64).hypot(b.0[0] as f64))
            .collect();

        let roof_values = value
            .pixels()
            .zip(&roof)
            .filter(|(_, inside)| **inside)
            .map(|(p, _)| p.0[0] as f64)
            .collect();
        let roof_gradients = gradient
            .iter()
            .zip(&roof)
            .filter(|(_, inside)| **inside)
            .map(|(g, _)| *g)
            .collect();

        Self {
            width,
            height,
            roof,
            value,
            edges,
            gradient,
            roof_values,
            roof_gradients,
        }
    }

    /// Union of the three signal masks, restricted to the roof.
    fn flag(&self, t: &ObstacleThresholds) -> GrayImage {
        let dark_thr = quantile(&self.roof_values, t.dark_quantile);
        let grad_thr = quantile(&self.roof_gradients, t.gradient_quantile);
        let radius = t.edge_box / 2;
        let density = box_filter(&self.edges, radius, radius);

        let mut out = GrayImage::new(self.width, self.height);
        for (i, p) in out.pixels_mut().enumerate() {
            if !self.roof[i] {
                continue;
            }
            let x = i as u32 % self.width;
            let y = i as u32 / self.width;

            let dark = (self.value.get_pixel(x, y).0[0] as f64) < dark_thr;
            let dense = density.get_pixel(x, y).0[0] as f64 / 255.0 > t.edge_density_cutoff;
            let g = self.gradient[i];
            let steep = g > 0.0 && g >= grad_thr;

            if dark || dense || steep {
                p.0[0] = 255;
            }
        }
        out
    }
}

/// Linearly interpolated quantile of unsorted samples; +inf when there are none.
pub fn quantile(samples: &[f64], q: f64) -> f64 {
    if samples.is_empty() {
        return f64::INFINITY;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Drops 8-connected components smaller than `min_area_px`.
fn remove_specks(flags: &GrayImage, min_area_px: usize) -> GrayImage {
    let labels = connected_components(flags, Connectivity::Eight, Luma([0u8]));
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut areas = vec![0usize; max_label + 1];
    for p in labels.pixels() {
        areas[p.0[0] as usize] += 1;
    }

    let mut keep = GrayImage::new(flags.width(), flags.height());
    for (dst, label) in keep.pixels_mut().zip(labels.pixels()) {
        let l = label.0[0] as usize;
        if l != 0 && areas[l] >= min_area_px {
            dst.0[0] = 255;
        }
    }
    keep
}

fn contour_coords(contour: &Contour<i32>) -> Vec<Coord<f64>> {
    contour
        .points
        .iter()
        .map(|p| Coord {
            x: p.x as f64,
            y: p.y as f64,
        })
        .collect()
}

/// Simplified ring of a contour, `None` if below `min_area_px` or degenerate.
fn simplified_ring(pts: &[Coord<f64>], min_area_px: usize) -> Option<Vec<Coord<f64>>> {
    if to_geo_polygon(pts).unsigned_area() < min_area_px as f64 {
        return None;
    }
    let approx = simplify_contour(pts);
    (approx.len() >= 3).then_some(approx)
}

/// Every outer contour of a binary image as a simplified polygon, with its
/// direct hole contours kept as interiors. Outer contours nested inside a
/// hole become polygons of their own.
fn vectorize(binary: &GrayImage, min_area_px: usize) -> Vec<Polygon<f64>> {
    let contours = find_contours::<i32>(binary);
    let rings: Vec<Vec<Coord<f64>>> = contours.iter().map(contour_coords).collect();

    contours
        .iter()
        .enumerate()
        .filter(|(_, c)| c.border_type == BorderType::Outer)
        .filter_map(|(i, _)| {
            let exterior = simplified_ring(&rings[i], min_area_px)?;
            let holes = contours
                .iter()
                .enumerate()
                .filter(|(_, h)| h.border_type == BorderType::Hole && h.parent == Some(i))
                .filter_map(|(j, _)| simplified_ring(&rings[j], min_area_px))
                .map(LineString::from)
                .collect();
            Some(Polygon::new(LineString::from(exterior), holes))
        })
        .collect()
}

/// Dilation by a disc of `radius_px`, split into passes of at most 255 px.
fn dilate_by(image: &GrayImage, radius_px: u32) -> GrayImage {
    let mut out = image.clone();
    let mut remaining = radius_px;
    while remaining > 0 {
        let step = remaining.min(u8::MAX as u32);
        out = dilate(&out, Norm::L2, step as u8);
        remaining -= step;
    }
    out
}

fn detect_pass(
    signals: &ObstacleSignals,
    thresholds: &ObstacleThresholds,
    min_area_px: usize,
    dilate_px: u32,
) -> Vec<Polygon<f64>> {
    let flags = signals.flag(thresholds);
    let kept = remove_specks(&flags, min_area_px);
    let grown = dilate_by(&kept, dilate_px);
    vectorize(&grown, min_area_px)
}

/// Clearance-expanded obstacle polygons in the image frame.
///
/// Threshold passes follow `mode`; the first pass producing any obstacle wins.
pub fn detect_obstacles(
    image: &RgbImage,
    mask: &RoofMask,
    scale: &ScaleFactor,
    obstacle_clearance_m: f64,
    mode: ObstacleMode,
) -> Vec<Polygon<f64>> {
    let passes = mode.passes();
    if passes.is_empty() {
        return Vec::new();
    }

    let signals = ObstacleSignals::compute(image, mask);
    if signals.roof_values.is_empty() {
        return Vec::new();
    }

    let min_side_px = MIN_OBSTACLE_SIDE_M * scale.px_per_m();
    let min_area_px = ((min_side_px * min_side_px) as usize).max(1);
    let dilate_px = scale.to_px(obstacle_clearance_m).round().max(1.0) as u32;

    for (i, thresholds) in passes.iter().enumerate() {
        let polys = detect_pass(&signals, thresholds, min_area_px, dilate_px);
        debug!("Obstacle pass {} found {} polygon(s)", i, polys.len());
        if !polys.is_empty() {
            info!(
                "Detected {} obstacle region(s) (min area {} px, clearance {} px)",
                polys.len(),
                min_area_px,
                dilate_px
            );
            return polys;
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Contains};
    use image::Rgb;

    fn full_roof(w: u32, h: u32) -> RoofMask {
        RoofMask {
            image: GrayImage::from_pixel(w, h, Luma([255u8])),
            contour: vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: (w - 1) as f64, y: 0.0 },
                Coord {
                    x: (w - 1) as f64,
                    y: (h - 1) as f64,
                },
                Coord { x: 0.0, y: (h - 1) as f64 },
            ],
        }
    }

    fn scale() -> ScaleFactor {
        ScaleFactor {
            meters_per_pixel: 0.05,
        }
    }

    #[test]
    fn quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&v, 0.0), 1.0);
        assert_eq!(quantile(&v, 1.0), 5.0);
        assert_eq!(quantile(&v, 0.5), 3.0);
        assert!((quantile(&v, 0.35) - 2.4).abs() < 1e-12);
        assert!(quantile(&[], 0.5).is_infinite());
    }

    #[test]
    fn dark_block_becomes_obstacle() {
        let image = RgbImage::from_fn(200, 160, |x, y| {
            if (85..115).contains(&x) && (65..95).contains(&y) {
                Rgb([40, 40, 40])
            } else {
                Rgb([200, 200, 200])
            }
        });
        let obstacles =
            detect_obstacles(&image, &full_roof(200, 160), &scale(), 0.25, ObstacleMode::Auto);

        assert_eq!(obstacles.len(), 1);
        let poly = &obstacles[0];
        assert!(poly.contains(&Coord { x: 100.0, y: 80.0 }));
        assert!(poly.unsigned_area() >= 30.0 * 30.0);
        assert!(!poly.contains(&Coord { x: 10.0, y: 10.0 }));
    }

    #[test]
    fn flat_roof_has_no_obstacles() {
        let image = RgbImage::from_pixel(120, 100, Rgb([180, 180, 180]));
        let obstacles =
            detect_obstacles(&image, &full_roof(120, 100), &scale(), 0.25, ObstacleMode::Auto);
        assert!(obstacles.is_empty());
    }

    #[test]
    fn off_mode_skips_detection() {
        let image = RgbImage::from_fn(100, 100, |x, _| {
            if x < 50 {
                Rgb([20, 20, 20])
            } else {
                Rgb([220, 220, 220])
            }
        });
        let obstacles =
            detect_obstacles(&image, &full_roof(100, 100), &scale(), 0.25, ObstacleMode::Off);
        assert!(obstacles.is_empty());
    }

    #[test]
    fn specks_below_threshold_are_dropped() {
        let mut flags = GrayImage::new(50, 50);
        flags.put_pixel(5, 5, Luma([255u8]));
        for x in 20..30 {
            for y in 20..30 {
                flags.put_pixel(x, y, Luma([255u8]));
            }
        }
        let kept = remove_specks(&flags, 25);
        assert_eq!(kept.get_pixel(5, 5).0[0], 0);
        assert_eq!(kept.get_pixel(25, 25).0[0], 255);
    }

    fn band_image(size: u32, outer: (u32, u32), inner: (u32, u32)) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let in_outer = (outer.0..outer.1).contains(&x) && (outer.0..outer.1).contains(&y);
            let in_inner = (inner.0..inner.1).contains(&x) && (inner.0..inner.1).contains(&y);
            if in_outer && !in_inner {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }

    #[test]
    fn perimeter_band_keeps_its_interior_free() {
        let polys = vectorize(&band_image(100, (10, 90), (20, 80)), 25);

        assert_eq!(polys.len(), 1);
        let band = &polys[0];
        assert_eq!(band.interiors().len(), 1);
        assert!(band.contains(&Coord { x: 15.0, y: 50.0 }));
        assert!(!band.contains(&Coord { x: 50.0, y: 50.0 }));
        assert!(band.unsigned_area() < 0.5 * 80.0 * 80.0);
    }

    #[test]
    fn island_inside_band_is_its_own_polygon() {
        let mut binary = band_image(100, (10, 90), (20, 80));
        for y in 40..60 {
            for x in 40..60 {
                binary.put_pixel(x, y, Luma([255u8]));
            }
        }
        let polys = vectorize(&binary, 25);

        assert_eq!(polys.len(), 2);
        let island = polys
            .iter()
            .find(|p| p.contains(&Coord { x: 50.0, y: 50.0 }))
            .expect("island polygon");
        assert!(island.interiors().is_empty());
        assert!(!island.contains(&Coord { x: 30.0, y: 30.0 }));
    }

    #[test]
    fn wide_clearance_dilates_past_one_pass() {
        let mut seed = GrayImage::new(640, 8);
        seed.put_pixel(0, 4, Luma([255u8]));
        let grown = dilate_by(&seed, 300);

        assert_eq!(grown.get_pixel(300, 4).0[0], 255);
        assert_eq!(grown.get_pixel(301, 4).0[0], 0);
    }
}
