use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use solar_layout::config::{load_from_path, FillReference, LayoutParams, ObstacleMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Lay out solar panels on a rooftop photo", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lay out panels for a single image
    Layout(LayoutArgs),
    /// Lay out panels for every row of a CSV manifest
    Batch(BatchArgs),
}

#[derive(ClapArgs, Debug)]
pub struct LayoutArgs {
    /// Rooftop image
    #[arg(long)]
    pub image: PathBuf,

    /// Real-world roof area in square metres
    #[arg(long)]
    pub area_m2: f64,

    /// Real-world roof length in metres (estimated when omitted)
    #[arg(long)]
    pub length_m: Option<f64>,

    /// Real-world roof width in metres (estimated when omitted)
    #[arg(long)]
    pub width_m: Option<f64>,

    #[command(flatten)]
    pub params: ParamArgs,

    /// Root directory for output artifacts
    #[arg(long, env = "SOLAR_LAYOUT_OUTPUT_ROOT")]
    pub output_root: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct BatchArgs {
    /// CSV with columns image,area_m2,length_m,width_m
    #[arg(long)]
    pub manifest: PathBuf,

    #[command(flatten)]
    pub params: ParamArgs,

    /// Root directory for output artifacts
    #[arg(long, env = "SOLAR_LAYOUT_OUTPUT_ROOT")]
    pub output_root: PathBuf,
}

/// Layout parameters: an optional TOML file, then individual overrides.
#[derive(ClapArgs, Debug, Default)]
pub struct ParamArgs {
    /// TOML file with layout parameters
    #[arg(long = "params")]
    pub params_file: Option<PathBuf>,

    /// Panel catalog key: tiny, small, medium or large
    #[arg(long)]
    pub panel_size: Option<String>,

    /// Target coverage in percent (30-90)
    #[arg(long)]
    pub fill_pct: Option<f64>,

    #[arg(long)]
    pub spacing_m: Option<f64>,

    #[arg(long)]
    pub edge_clearance_m: Option<f64>,

    #[arg(long)]
    pub min_boundary_clearance_m: Option<f64>,

    #[arg(long)]
    pub obstacle_clearance_m: Option<f64>,

    #[arg(long, value_enum)]
    pub obstacle_mode: Option<ObstacleMode>,

    /// Packing angle override in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub angle_deg: Option<f64>,

    #[arg(long, value_enum)]
    pub fill_relative_to: Option<FillReference>,

    #[arg(long)]
    pub overshoot_tolerance_frac: Option<f64>,
}

impl ParamArgs {
    /// Loads the TOML file (or defaults) and applies every flag given.
    pub fn resolve(&self) -> Result<LayoutParams> {
        let mut params = match &self.params_file {
            Some(path) => load_from_path(path)
                .with_context(|| format!("Failed to load params from {}", path.display()))?,
            None => LayoutParams::default(),
        };

        if let Some(v) = &self.panel_size {
            params.panel_size = v.clone();
        }
        if let Some(v) = self.fill_pct {
            params.fill_pct = v;
        }
        if let Some(v) = self.spacing_m {
            params.spacing_m = v;
        }
        if let Some(v) = self.edge_clearance_m {
            params.edge_clearance_m = v;
        }
        if let Some(v) = self.min_boundary_clearance_m {
            params.min_boundary_clearance_m = v;
        }
        if let Some(v) = self.obstacle_clearance_m {
            params.obstacle_clearance_m = v;
        }
        if let Some(v) = self.obstacle_mode {
            params.obstacle_mode = v;
        }
        if self.angle_deg.is_some() {
            params.angle_deg = self.angle_deg;
        }
        if let Some(v) = self.fill_relative_to {
            params.fill_relative_to = v;
        }
        if let Some(v) = self.overshoot_tolerance_frac {
            params.overshoot_tolerance_frac = v;
        }

        Ok(params)
    }
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "solar-layout",
            "layout",
            "--image",
            "roof.png",
            "--area-m2",
            "120",
            "--fill-pct",
            "70",
            "--obstacle-mode",
            "off",
            "--angle-deg",
            "-15",
            "--output-root",
            "out",
        ])
        .unwrap();

        let Command::Layout(layout) = args.command else {
            panic!("expected layout subcommand");
        };
        let params = layout.params.resolve().unwrap();
        assert_eq!(params.fill_pct, 70.0);
        assert_eq!(params.obstacle_mode, ObstacleMode::Off);
        assert_eq!(params.angle_deg, Some(-15.0));
        assert_eq!(params.panel_size, "medium");
        assert_eq!(layout.area_m2, 120.0);
    }

    #[test]
    fn batch_requires_manifest() {
        assert!(Args::try_parse_from(["solar-layout", "batch", "--output-root", "out"]).is_err());
    }
}
