use crate::error::LayoutError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const MIN_FILL_PCT: f64 = 30.0;
pub const MAX_FILL_PCT: f64 = 90.0;

/// One entry of the fixed panel catalog.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct PanelSpec {
    pub name: &'static str,
    pub length_m: f64,
    pub width_m: f64,
    pub rated_watts: u32,
}

impl PanelSpec {
    pub fn area_m2(&self) -> f64 {
        self.length_m * self.width_m
    }
}

pub const PANEL_CATALOG: [PanelSpec; 4] = [
    PanelSpec {
        name: "tiny",
        length_m: 1.70,
        width_m: 1.00,
        rated_watts: 340,
    },
    PanelSpec {
        name: "small",
        length_m: 2.00,
        width_m: 1.00,
        rated_watts: 400,
    },
    PanelSpec {
        name: "medium",
        length_m: 2.278,
        width_m: 1.134,
        rated_watts: 520,
    },
    PanelSpec {
        name: "large",
        length_m: 2.384,
        width_m: 1.303,
        rated_watts: 620,
    },
];

/// Looks up a catalog entry by its key.
pub fn panel_spec(name: &str) -> Result<PanelSpec, LayoutError> {
    PANEL_CATALOG
        .iter()
        .find(|spec| spec.name == name)
        .copied()
        .ok_or_else(|| LayoutError::UnknownPanelSize(name.to_string()))
}

/// Threshold set used by one obstacle detection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleThresholds {
    /// Brightness quantile (inside the roof) below which pixels count as shadow.
    pub dark_quantile: f64,
    /// Side of the box window used to average edge pixels.
    pub edge_box: u32,
    /// Edge density above which a pixel is flagged.
    pub edge_density_cutoff: f64,
    /// Gradient magnitude quantile at or above which a pixel is flagged.
    pub gradient_quantile: f64,
}

impl ObstacleThresholds {
    pub const AUTO: Self = Self {
        dark_quantile: 0.35,
        edge_box: 7,
        edge_density_cutoff: 0.12,
        gradient_quantile: 0.82,
    };

    /// Conservative set: flags fewer pixels than `AUTO`.
    pub const LIGHT: Self = Self {
        dark_quantile: 0.30,
        edge_box: 5,
        edge_density_cutoff: 0.18,
        gradient_quantile: 0.88,
    };
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleMode {
    /// Default thresholds, falling back to the light set when nothing is found
    #[default]
    Auto,
    /// Conservative thresholds only
    Light,
    /// No obstacle detection
    Off,
}

impl ObstacleMode {
    /// Threshold sets to try in order; the first one yielding obstacles wins.
    pub fn passes(self) -> &'static [ObstacleThresholds] {
        match self {
            ObstacleMode::Auto => &[ObstacleThresholds::AUTO, ObstacleThresholds::LIGHT],
            ObstacleMode::Light => &[ObstacleThresholds::LIGHT],
            ObstacleMode::Off => &[],
        }
    }
}

/// Area the fill percentage is measured against.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FillReference {
    #[default]
    Usable,
    Roof,
}

/// Caller-supplied configuration for one layout run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LayoutParams {
    pub panel_size: String,
    pub fill_pct: f64,
    pub spacing_m: f64,
    pub edge_clearance_m: f64,
    /// Parapet/setback ring; the effective boundary clearance is the max of this and `edge_clearance_m`.
    pub min_boundary_clearance_m: f64,
    pub obstacle_clearance_m: f64,
    pub obstacle_mode: ObstacleMode,
    pub angle_deg: Option<f64>,
    pub fill_relative_to: FillReference,
    /// Fraction of one panel's area the packer may exceed the target by.
    pub overshoot_tolerance_frac: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            panel_size: "medium".to_string(),
            fill_pct: 50.0,
            spacing_m: 0.12,
            edge_clearance_m: 0.25,
            min_boundary_clearance_m: 0.50,
            obstacle_clearance_m: 0.25,
            obstacle_mode: ObstacleMode::Auto,
            angle_deg: None,
            fill_relative_to: FillReference::Usable,
            overshoot_tolerance_frac: 0.20,
        }
    }
}

impl LayoutParams {
    /// Checks every parameter and resolves the panel catalog entry.
    pub fn validate(&self) -> Result<PanelSpec, LayoutError> {
        if !(MIN_FILL_PCT..=MAX_FILL_PCT).contains(&self.fill_pct) {
            return Err(LayoutError::InvalidFillPercentage(self.fill_pct));
        }
        let spec = panel_spec(&self.panel_size)?;

        let distances = [
            ("spacing_m", self.spacing_m),
            ("edge_clearance_m", self.edge_clearance_m),
            ("min_boundary_clearance_m", self.min_boundary_clearance_m),
            ("obstacle_clearance_m", self.obstacle_clearance_m),
            ("overshoot_tolerance_frac", self.overshoot_tolerance_frac),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidParameter { name, value });
            }
        }
        if let Some(angle) = self.angle_deg {
            if !angle.is_finite() {
                return Err(LayoutError::InvalidParameter {
                    name: "angle_deg",
                    value: angle,
                });
            }
        }

        Ok(spec)
    }

    /// Width of the parapet/setback ring kept free along the roof boundary.
    pub fn boundary_clearance_m(&self) -> f64 {
        self.edge_clearance_m.max(self.min_boundary_clearance_m)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read params: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse params: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads layout parameters from a TOML file; missing keys take their defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<LayoutParams, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let params: LayoutParams = toml::from_str(&contents)?;
    Ok(params)
}
