use crate::error::LayoutError;
use crate::pipeline::geometry::to_geo_polygon;
use crate::pipeline::types::RoofMask;
use geo::Area;
use geo_types::Coord;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;
use imageproc::point::Point as IpPoint;
use tracing::debug;

/// Longest image side processed by the pipeline.
pub const MAX_SIDE_PX: u32 = 1024;

const BLUR_SIGMA: f32 = 0.8;
/// Two passes of a 5x5 square closing.
const CLOSE_RADIUS: u8 = 4;

/// Downscales so the longer side is at most `MAX_SIDE_PX`, preserving aspect ratio.
pub fn resize_for_processing(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if longest <= MAX_SIDE_PX {
        return image.clone();
    }
    let s = MAX_SIDE_PX as f64 / longest as f64;
    let nw = ((w as f64 * s) as u32).max(1);
    let nh = ((h as f64 * s) as u32).max(1);
    debug!("Resizing input from {}x{} to {}x{}", w, h, nw, nh);
    imageops::resize(image, nw, nh, FilterType::Triangle)
}

pub fn to_gray(image: &RgbImage) -> GrayImage {
    imageops::grayscale(image)
}

/// Segments the dominant rooftop region into a filled mask and its external contour.
pub fn extract_roof_mask(gray: &GrayImage) -> Result<RoofMask, LayoutError> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return Err(LayoutError::NoRoofDetected);
    }

    let blurred = gaussian_blur_f32(gray, BLUR_SIGMA);

    // A flat image has no separable foreground
    let (lo, hi) = blurred
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if lo == hi {
        return Err(LayoutError::NoRoofDetected);
    }

    let level = otsu_level(&blurred);
    let mut binary = GrayImage::from_fn(w, h, |x, y| {
        if blurred.get_pixel(x, y).0[0] > level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    let mean = binary.pixels().map(|p| p.0[0] as f64).sum::<f64>() / (w as f64 * h as f64);
    if mean < 127.0 {
        for p in binary.pixels_mut() {
            p.0[0] = 255 - p.0[0];
        }
    }

    let closed = close(&binary, Norm::LInf, CLOSE_RADIUS);
    let contour = largest_external_contour(&closed).ok_or(LayoutError::NoRoofDetected)?;

    let mut filled = GrayImage::new(w, h);
    fill_contour(&mut filled, &contour);

    Ok(RoofMask {
        image: filled,
        contour,
    })
}

/// Largest-area outer contour with no parent.
pub fn largest_external_contour(binary: &GrayImage) -> Option<Vec<Coord<f64>>> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            c.points
                .iter()
                .map(|p| Coord {
                    x: p.x as f64,
                    y: p.y as f64,
                })
                .collect::<Vec<_>>()
        })
        .filter(|pts| !pts.is_empty())
        .map(|pts| (to_geo_polygon(&pts).unsigned_area(), pts))
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, pts)| pts)
}

/// Paints the contour and its interior with 255.
pub fn fill_contour(canvas: &mut GrayImage, contour: &[Coord<f64>]) {
    let mut pts: Vec<IpPoint<i32>> = contour
        .iter()
        .map(|c| IpPoint::new(c.x.round() as i32, c.y.round() as i32))
        .collect();
    pts.dedup();
    while pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }

    match pts.len() {
        0 => {}
        1 | 2 => {
            for p in &pts {
                if p.x >= 0 && p.y >= 0 && (p.x as u32) < canvas.width() && (p.y as u32) < canvas.height() {
                    canvas.put_pixel(p.x as u32, p.y as u32, Luma([255u8]));
                }
            }
        }
        _ => draw_polygon_mut(canvas, &pts, Luma([255u8])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_image(w: u32, h: u32, x0: u32, y0: u32, rw: u32, rh: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if x >= x0 && x < x0 + rw && y >= y0 && y < y0 + rh {
                Luma([210u8])
            } else {
                Luma([30u8])
            }
        })
    }

    #[test]
    fn bright_rectangle_becomes_mask() {
        let gray = rect_image(200, 160, 20, 20, 160, 120);
        let mask = extract_roof_mask(&gray).unwrap();
        let count = mask.pixel_count() as f64;
        let expected = 160.0 * 120.0;
        assert!(
            (count - expected).abs() / expected < 0.05,
            "mask pixels {} vs expected {}",
            count,
            expected
        );
        assert!(mask.contains(100, 80));
        assert!(!mask.contains(5, 5));
    }

    #[test]
    fn blank_image_has_no_roof() {
        let gray = GrayImage::from_pixel(64, 64, Luma([128u8]));
        assert_eq!(
            extract_roof_mask(&gray).unwrap_err(),
            LayoutError::NoRoofDetected
        );
    }

    #[test]
    fn minority_dark_roof_is_inverted() {
        // Dark roof occupying most of the frame on a bright border
        let gray = GrayImage::from_fn(200, 160, |x, y| {
            if (15..185).contains(&x) && (15..145).contains(&y) {
                Luma([40u8])
            } else {
                Luma([230u8])
            }
        });
        let mask = extract_roof_mask(&gray).unwrap();
        assert!(mask.contains(100, 80));
        assert!(!mask.contains(2, 2));
    }

    #[test]
    fn largest_blob_wins() {
        let binary = GrayImage::from_fn(200, 100, |x, y| {
            let small = (10..40).contains(&x) && (10..40).contains(&y);
            let large = (80..180).contains(&x) && (20..90).contains(&y);
            if small || large {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        let contour = largest_external_contour(&binary).unwrap();
        assert!(contour.iter().all(|c| c.x >= 79.0 && c.y >= 19.0));
    }

    #[test]
    fn large_inputs_are_capped() {
        let img = RgbImage::new(2048, 1024);
        let resized = resize_for_processing(&img);
        assert_eq!(resized.dimensions(), (1024, 512));

        let small = RgbImage::new(300, 200);
        assert_eq!(resize_for_processing(&small).dimensions(), (300, 200));
    }
}
