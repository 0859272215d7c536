// Run artifact struct definitions
//
// This module contains the struct definitions for artifacts that are persisted
// as JSON files within a run's output directory.

use crate::pipeline::report::LayoutStats;
use crate::pipeline::types::PlacedPanel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A 2D point in pixel coordinates of the processed image
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Metadata describing a single layout run (metadata.json)
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunMetadata {
    pub source_image: String,
    pub created_at: DateTime<Utc>,
    pub run_id: String,
    pub roof_area_m2: f64,
    #[serde(skip)]
    pub output_dir: PathBuf,
}

/// Panels and statistics of a finished run (layout.json)
#[derive(Serialize, Debug, Clone)]
pub struct LayoutArtifact<'a> {
    pub image_width: u32,
    pub image_height: u32,
    pub panels: &'a [PlacedPanel],
    pub stats: &'a LayoutStats,
}

/// One row of a batch manifest CSV
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ManifestRow {
    pub image: PathBuf,
    pub area_m2: f64,
    #[serde(default)]
    pub length_m: Option<f64>,
    #[serde(default)]
    pub width_m: Option<f64>,
}
