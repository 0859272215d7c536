use geo::Area;
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use image::{GrayImage, RgbImage};
use serde::Serialize;
use std::fmt;

pub use crate::pipeline::report::LayoutStats;
pub use crate::run_artifacts::Point;

/// Binary rooftop segmentation in the frame of the resized image.
#[derive(Debug, Clone)]
pub struct RoofMask {
    /// 255 on the roof, 0 elsewhere.
    pub image: GrayImage,
    /// External boundary of the roof region, in pixel coordinates.
    pub contour: Vec<Coord<f64>>,
}

impl RoofMask {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> usize {
        self.image.pixels().filter(|p| p.0[0] > 0).count()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y).0[0] > 0
    }

    /// Rotation pivot shared by every candidate angle.
    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: self.width() as f64 / 2.0,
            y: self.height() as f64 / 2.0,
        }
    }
}

/// Vector roof boundary plus its principal-axis orientation.
#[derive(Debug, Clone)]
pub struct RoofOutline {
    pub polygon: Polygon<f64>,
    /// Long-axis angle of the minimum-area bounding rectangle, in [0, 180).
    pub principal_axis_deg: f64,
    pub long_side_px: f64,
    pub short_side_px: f64,
}

impl RoofOutline {
    /// `long / short` of the minimum-area bounding rectangle, 1.0 when degenerate.
    pub fn aspect_ratio(&self) -> f64 {
        if self.long_side_px > 0.0 && self.short_side_px > 0.0 {
            self.long_side_px / self.short_side_px.max(1e-6)
        } else {
            1.0
        }
    }
}

/// Pixel to metric conversion, constant for a run.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
    pub meters_per_pixel: f64,
}

impl ScaleFactor {
    pub fn px_per_m(&self) -> f64 {
        1.0 / self.meters_per_pixel
    }

    pub fn to_px(&self, meters: f64) -> f64 {
        meters * self.px_per_m()
    }

    pub fn area_to_m2(&self, area_px: f64) -> f64 {
        area_px * self.meters_per_pixel * self.meters_per_pixel
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Panel length runs across the packing axis.
    Portrait,
    /// Panel length runs along the packing axis.
    Landscape,
}

/// One accepted panel rectangle in the original image frame.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlacedPanel {
    pub corners: [Point; 4],
    pub orientation: Orientation,
}

impl PlacedPanel {
    pub fn to_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self
            .corners
            .iter()
            .map(|p| Coord { x: p.x, y: p.y })
            .collect();
        Polygon::new(LineString::from(coords), vec![])
    }
}

/// Packable area for one candidate angle, possibly split into several parts.
#[derive(Debug, Clone, Default)]
pub struct UsableRegion {
    pub parts: Vec<Polygon<f64>>,
}

impl UsableRegion {
    pub fn from_multi(mp: MultiPolygon<f64>) -> Self {
        Self {
            parts: mp
                .0
                .into_iter()
                .filter(|p| p.unsigned_area() > f64::EPSILON)
                .collect(),
        }
    }

    pub fn area(&self) -> f64 {
        self.parts.iter().map(|p| p.unsigned_area()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn to_multi(&self) -> MultiPolygon<f64> {
        MultiPolygon(self.parts.clone())
    }
}

/// Relaxation and fallback events recorded during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutWarning {
    /// Obstacle clearance shrunk by the given percentage to recover usable area.
    ObstaclesRelaxed { shrink_pct: u32 },
    /// Even a fully shrunk obstacle mask left too little area.
    ObstaclesRelaxationExhausted,
    ObstaclesDisabled,
    PackingFallback,
    NoPanelsPlaced,
}

impl fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutWarning::ObstaclesRelaxed { shrink_pct } => write!(
                f,
                "Obstacle mask relaxed (clearance shrunk by {}%) to retain sufficient usable area.",
                shrink_pct
            ),
            LayoutWarning::ObstaclesRelaxationExhausted => write!(
                f,
                "Obstacle mask relaxed fully but usable area stayed below 12% of the roof."
            ),
            LayoutWarning::ObstaclesDisabled => {
                write!(f, "Obstacle mask disabled (covered nearly whole roof).")
            }
            LayoutWarning::PackingFallback => write!(
                f,
                "Packing fallback: reduced spacing and boundary ring for a minimal fit."
            ),
            LayoutWarning::NoPanelsPlaced => {
                write!(f, "No panel fits on the detected roof, even after fallback.")
            }
        }
    }
}

/// Final output of a layout run.
#[derive(Debug, Clone)]
pub struct LayoutResult {
    pub panels: Vec<PlacedPanel>,
    /// Processed image with panels composited on top.
    pub overlay: RgbImage,
    pub mask: GrayImage,
    pub stats: LayoutStats,
}

impl LayoutResult {
    pub fn warnings(&self) -> &[String] {
        &self.stats.warnings
    }
}
