use crate::config::{FillReference, LayoutParams, ObstacleMode, PanelSpec};
use crate::pipeline::search::SearchOutcome;
use crate::pipeline::types::{Orientation, ScaleFactor};
use serde::Serialize;

/// Statistics and diagnostics of one layout run (serialized into layout.json).
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LayoutStats {
    pub panel_size: String,
    /// Panel footprint as placed, (along packing x, along packing y) in metres.
    pub panel_dims_m: (f64, f64),
    pub panel_orientation: Orientation,
    pub watt_nom_per_panel: u32,
    pub panels_count: usize,
    pub panel_area_each_m2: f64,
    /// Total footprint of all placed panels.
    pub panel_area_m2: f64,

    pub roof_area_m2_input: f64,
    pub roof_area_m2_from_mask: f64,
    pub usable_area_m2: f64,

    pub fill_relative_to: FillReference,
    pub fill_target_pct: f64,
    pub target_area_m2_effective: f64,
    pub fill_achieved_pct_of_roof: f64,
    pub fill_achieved_pct_of_usable: f64,

    pub capacity_estimated_kwp: f64,
    pub m_per_px: f64,
    pub estimated_roof_lw_m: (f64, f64),
    pub angle_used_deg: f64,

    pub spacing_m: f64,
    pub edge_clearance_m: f64,
    pub min_boundary_clearance_m: f64,
    pub obstacle_clearance_m: f64,
    pub obstacle_mode: ObstacleMode,
    /// Spacing and boundary ring actually used; differ from the configured values after fallback.
    pub spacing_effective_m: f64,
    pub boundary_clearance_effective_m: f64,
    pub overshoot_tolerance_frac: f64,
    pub fallback_used: bool,

    pub warnings: Vec<String>,
}

/// Everything the report needs besides the search outcome.
#[derive(Debug, Clone, Copy)]
pub struct RunFacts<'a> {
    pub params: &'a LayoutParams,
    pub panel: &'a PanelSpec,
    pub scale: ScaleFactor,
    pub roof_area_m2: f64,
    pub roof_area_px: f64,
    pub roof_lw_m: (f64, f64),
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (value * f).round() / f
}

pub fn build_stats(facts: &RunFacts<'_>, outcome: &SearchOutcome) -> LayoutStats {
    let best = &outcome.best;
    let scale = facts.scale;
    let panel = facts.panel;
    let n = best.panels.len();

    let panel_dims_m = match best.orientation {
        Orientation::Portrait => (panel.width_m, panel.length_m),
        Orientation::Landscape => (panel.length_m, panel.width_m),
    };
    let panel_area_m2 = panel.area_m2() * n as f64;

    let roof_area_m2_from_mask = scale.area_to_m2(facts.roof_area_px);
    let usable_area_m2 = scale.area_to_m2(best.usable_area_px);
    let target_area_m2 = scale.area_to_m2(best.target_area_px);

    let pct_of_roof = 100.0 * panel_area_m2 / roof_area_m2_from_mask.max(1e-9);
    let pct_of_usable = 100.0 * panel_area_m2 / usable_area_m2.max(1e-9);
    let capacity_kwp = panel.rated_watts as f64 * n as f64 / 1000.0;

    let params = facts.params;
    LayoutStats {
        panel_size: panel.name.to_string(),
        panel_dims_m: (round_to(panel_dims_m.0, 3), round_to(panel_dims_m.1, 3)),
        panel_orientation: best.orientation,
        watt_nom_per_panel: panel.rated_watts,
        panels_count: n,
        panel_area_each_m2: round_to(panel.area_m2(), 3),
        panel_area_m2: round_to(panel_area_m2, 3),
        roof_area_m2_input: round_to(facts.roof_area_m2, 3),
        roof_area_m2_from_mask: round_to(roof_area_m2_from_mask, 3),
        usable_area_m2: round_to(usable_area_m2, 3),
        fill_relative_to: params.fill_relative_to,
        fill_target_pct: params.fill_pct,
        target_area_m2_effective: round_to(target_area_m2, 3),
        fill_achieved_pct_of_roof: round_to(pct_of_roof, 2),
        fill_achieved_pct_of_usable: round_to(pct_of_usable, 2),
        capacity_estimated_kwp: round_to(capacity_kwp, 3),
        m_per_px: scale.meters_per_pixel,
        estimated_roof_lw_m: (round_to(facts.roof_lw_m.0, 3), round_to(facts.roof_lw_m.1, 3)),
        angle_used_deg: round_to(best.angle_deg, 2),
        spacing_m: params.spacing_m,
        edge_clearance_m: params.edge_clearance_m,
        min_boundary_clearance_m: params.min_boundary_clearance_m,
        obstacle_clearance_m: params.obstacle_clearance_m,
        obstacle_mode: params.obstacle_mode,
        spacing_effective_m: round_to(outcome.spacing_px * scale.meters_per_pixel, 3),
        boundary_clearance_effective_m: round_to(
            outcome.boundary_clearance_px * scale.meters_per_pixel,
            3,
        ),
        overshoot_tolerance_frac: params.overshoot_tolerance_frac,
        fallback_used: outcome.fallback_used,
        warnings: outcome.warnings.iter().map(|w| w.to_string()).collect(),
    }
}
