//! Multi-angle search over packing frames.
//!
//! Every candidate angle is evaluated independently as
//! rotate -> buffer -> subtract obstacles (with relaxation) -> pack -> score,
//! then a sequential fold picks the angle whose placed area is closest to
//! its target. If no angle places a single panel, one relaxed fallback run
//! is made at the roof's principal axis.

use crate::config::FillReference;
use crate::pipeline::geometry::{
    buffer_poly, normalize_angle, region_area, rotate_polygon, rotate_region,
    shrink_region,
};
use crate::pipeline::packing::{pack_best_orientation, FillBudget};
use crate::pipeline::types::{LayoutWarning, Orientation, PlacedPanel, Point, UsableRegion};
use geo::BooleanOps;
use geo_types::{Coord, MultiPolygon, Polygon, Rect};
use tracing::{debug, info, warn};

/// Minimum share of the pre-subtraction area the usable region must keep.
pub const MIN_USABLE_FRACTION: f64 = 0.12;
/// Remaining obstacle-buffer fractions tried, in order, when subtraction leaves too little.
pub const RELAXATION_LADDER: [f64; 4] = [0.75, 0.5, 0.25, 0.0];
/// Offsets applied around each base angle.
const ANGLE_VARIANTS: [f64; 4] = [0.0, 90.0, 5.0, -5.0];

const FALLBACK_MIN_RING_M: f64 = 0.30;
const FALLBACK_RING_FACTOR: f64 = 0.8;
const FALLBACK_MIN_SPACING_M: f64 = 0.02;
const FALLBACK_SPACING_FACTOR: f64 = 0.75;

/// Inputs shared by every candidate angle, all lengths in pixels.
#[derive(Debug, Clone)]
pub struct SearchContext<'a> {
    /// Roof polygon in the image frame.
    pub roof: &'a Polygon<f64>,
    /// Obstacle union in the image frame, `None` when obstacles are off or absent.
    pub obstacles: Option<&'a MultiPolygon<f64>>,
    pub center: Coord<f64>,
    pub px_per_m: f64,
    pub roof_area_px: f64,
    pub panel_length_px: f64,
    pub panel_width_px: f64,
    pub spacing_px: f64,
    pub boundary_clearance_px: f64,
    pub obstacle_clearance_px: f64,
    /// Fill target as a fraction (0..1).
    pub fill_frac: f64,
    pub fill_reference: FillReference,
    pub overshoot_tolerance_frac: f64,
    /// When false the packer ignores the target and saturates the region.
    pub cap_to_target: bool,
}

/// Result of packing one candidate angle.
#[derive(Debug, Clone)]
pub struct AngleEvaluation {
    pub angle_deg: f64,
    /// Panels in the image frame.
    pub panels: Vec<PlacedPanel>,
    pub orientation: Orientation,
    /// Region the panels were packed into, in the image frame.
    pub usable: UsableRegion,
    pub usable_area_px: f64,
    pub placed_area_px: f64,
    pub target_area_px: f64,
    pub warnings: Vec<LayoutWarning>,
}

impl AngleEvaluation {
    fn empty(angle_deg: f64, warnings: Vec<LayoutWarning>) -> Self {
        Self {
            angle_deg,
            panels: Vec::new(),
            orientation: Orientation::Portrait,
            usable: UsableRegion::default(),
            usable_area_px: 0.0,
            placed_area_px: 0.0,
            target_area_px: 0.0,
            warnings,
        }
    }

    /// `|placed - target|`; `None` when the angle had no usable region at all.
    pub fn score(&self) -> Option<f64> {
        if self.usable.is_empty() {
            None
        } else {
            Some((self.placed_area_px - self.target_area_px).abs())
        }
    }
}

/// User angle (if any) and principal axis, each with its +90/+5/-5 variants, in [0, 180).
/// Duplicates are dropped, keeping the first occurrence.
pub fn candidate_angles(user_angle_deg: Option<f64>, principal_axis_deg: f64) -> Vec<f64> {
    let bases = user_angle_deg.into_iter().chain(std::iter::once(principal_axis_deg));
    let mut angles: Vec<f64> = Vec::new();
    for base in bases {
        for variant in ANGLE_VARIANTS {
            let a = normalize_angle(base + variant);
            if !angles.iter().any(|seen| (seen - a).abs() < 1e-9) {
                angles.push(a);
            }
        }
    }
    angles
}

/// Subtracts obstacles shrunk by `(1 - remaining_fraction)` of their clearance.
pub fn relax_obstacles(
    region: &MultiPolygon<f64>,
    obstacles: &MultiPolygon<f64>,
    obstacle_clearance_px: f64,
    remaining_fraction: f64,
) -> (UsableRegion, LayoutWarning) {
    let shrink = obstacle_clearance_px * (1.0 - remaining_fraction);
    let shrunk = if shrink > 0.0 {
        shrink_region(obstacles, shrink)
    } else {
        obstacles.clone()
    };
    let usable = UsableRegion::from_multi(region.difference(&shrunk));
    let shrink_pct = ((1.0 - remaining_fraction) * 100.0).round() as u32;
    (usable, LayoutWarning::ObstaclesRelaxed { shrink_pct })
}

/// Region minus obstacles, walking the relaxation ladder when too little remains.
pub fn subtract_obstacles(
    region: &MultiPolygon<f64>,
    obstacles: &MultiPolygon<f64>,
    obstacle_clearance_px: f64,
) -> (UsableRegion, Vec<LayoutWarning>) {
    let min_area = MIN_USABLE_FRACTION * region_area(region);
    let sufficient = |u: &UsableRegion| !u.is_empty() && u.area() >= min_area;

    let usable = UsableRegion::from_multi(region.difference(obstacles));
    if sufficient(&usable) {
        return (usable, Vec::new());
    }

    for remaining in RELAXATION_LADDER {
        let (candidate, warning) =
            relax_obstacles(region, obstacles, obstacle_clearance_px, remaining);
        if sufficient(&candidate) {
            return (candidate, vec![warning]);
        }
    }

    (
        UsableRegion::from_multi(region.clone()),
        vec![
            LayoutWarning::ObstaclesRelaxationExhausted,
            LayoutWarning::ObstaclesDisabled,
        ],
    )
}

fn rect_to_panel(rect: &Rect<f64>, angle_deg: f64, center: Coord<f64>, orientation: Orientation) -> PlacedPanel {
    let rotated = rotate_polygon(&rect.to_polygon(), angle_deg, center);
    let ring = &rotated.exterior().0;
    PlacedPanel {
        corners: [0, 1, 2, 3].map(|i| Point::new(ring[i].x, ring[i].y)),
        orientation,
    }
}

/// Packs the roof in the frame rotated by `-angle_deg`.
pub fn evaluate_angle(ctx: &SearchContext<'_>, angle_deg: f64) -> AngleEvaluation {
    let rotated = rotate_polygon(ctx.roof, -angle_deg, ctx.center);
    let eroded = buffer_poly(&rotated, -ctx.boundary_clearance_px);
    if region_area(&eroded) <= f64::EPSILON {
        debug!("Angle {:.2}: boundary ring consumes the whole roof", angle_deg);
        return AngleEvaluation::empty(angle_deg, Vec::new());
    }

    let (usable, warnings) = match ctx.obstacles {
        Some(obstacles) => {
            let rotated_obstacles = rotate_region(obstacles, -angle_deg, ctx.center);
            subtract_obstacles(&eroded, &rotated_obstacles, ctx.obstacle_clearance_px)
        }
        None => (UsableRegion::from_multi(eroded), Vec::new()),
    };
    if usable.is_empty() {
        return AngleEvaluation::empty(angle_deg, warnings);
    }

    let usable_area_px = usable.area();
    let reference_area = match ctx.fill_reference {
        FillReference::Usable => usable_area_px,
        FillReference::Roof if ctx.roof_area_px > 0.0 => ctx.roof_area_px,
        FillReference::Roof => usable_area_px,
    };
    let target_area_px = ctx.fill_frac * reference_area;

    let budget = if ctx.cap_to_target {
        FillBudget {
            target: Some(target_area_px),
            overshoot_tolerance: ctx.overshoot_tolerance_frac
                * ctx.panel_length_px
                * ctx.panel_width_px,
        }
    } else {
        FillBudget::unlimited()
    };

    let outcome = pack_best_orientation(
        &usable,
        ctx.panel_length_px,
        ctx.panel_width_px,
        ctx.spacing_px,
        &budget,
    );
    let panels = outcome
        .rects
        .iter()
        .map(|r| rect_to_panel(r, angle_deg, ctx.center, outcome.orientation))
        .collect::<Vec<_>>();

    debug!(
        "Angle {:.2}: usable {:.0} px², target {:.0} px², placed {:.0} px² ({} panels, {:?})",
        angle_deg,
        usable_area_px,
        target_area_px,
        outcome.placed_area,
        panels.len(),
        outcome.orientation
    );

    let usable_image_frame = UsableRegion::from_multi(rotate_region(
        &usable.to_multi(),
        angle_deg,
        ctx.center,
    ));

    AngleEvaluation {
        angle_deg,
        panels,
        orientation: outcome.orientation,
        usable: usable_image_frame,
        usable_area_px,
        placed_area_px: outcome.placed_area,
        target_area_px,
        warnings,
    }
}

/// Evaluates every angle on its own scoped thread; output order matches `angles`.
pub fn evaluate_all(ctx: &SearchContext<'_>, angles: &[f64]) -> Vec<AngleEvaluation> {
    if angles.len() <= 1 {
        return angles.iter().map(|&a| evaluate_angle(ctx, a)).collect();
    }

    let joined = crossbeam::thread::scope(|s| {
        let handles: Vec<_> = angles
            .iter()
            .map(|&a| s.spawn(move |_| evaluate_angle(ctx, a)))
            .collect();
        handles.into_iter().map(|h| h.join()).collect::<Vec<_>>()
    });

    match joined {
        Ok(results) => results
            .into_iter()
            .map(|r| r.unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect(),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Best-of reduction: smallest score wins, first seen wins ties, unscored angles never win.
/// Warnings are concatenated in candidate order with duplicates removed.
pub fn select_best(evaluations: Vec<AngleEvaluation>) -> (Option<AngleEvaluation>, Vec<LayoutWarning>) {
    evaluations.into_iter().fold((None, Vec::new()), |(best, mut warnings), eval| {
        for w in &eval.warnings {
            if !warnings.contains(w) {
                warnings.push(*w);
            }
        }
        let best = match (best, eval.score()) {
            (None, _) => Some(eval),
            (Some(current), Some(score)) => match current.score() {
                Some(best_score) if best_score <= score => Some(current),
                _ => Some(eval),
            },
            (Some(current), None) => Some(current),
        };
        (best, warnings)
    })
}

/// Winning placement plus the clearances that were actually in force.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: AngleEvaluation,
    pub warnings: Vec<LayoutWarning>,
    pub boundary_clearance_px: f64,
    pub spacing_px: f64,
    pub fallback_used: bool,
}

/// Runs the candidate search and, if it places nothing, the last-resort fallback.
pub fn search_layout(ctx: &SearchContext<'_>, angles: &[f64], principal_axis_deg: f64) -> SearchOutcome {
    let evaluations = evaluate_all(ctx, angles);
    let (best, mut warnings) = select_best(evaluations);
    for w in &warnings {
        warn!("{}", w);
    }

    if let Some(best) = best.filter(|b| !b.panels.is_empty()) {
        info!(
            "Best angle {:.2}: {} panels, placed {:.0} px² for target {:.0} px²",
            best.angle_deg,
            best.panels.len(),
            best.placed_area_px,
            best.target_area_px
        );
        return SearchOutcome {
            best,
            warnings,
            boundary_clearance_px: ctx.boundary_clearance_px,
            spacing_px: ctx.spacing_px,
            fallback_used: false,
        };
    }

    let fallback_ctx = SearchContext {
        obstacles: None,
        boundary_clearance_px: (FALLBACK_MIN_RING_M * ctx.px_per_m)
            .max(FALLBACK_RING_FACTOR * ctx.boundary_clearance_px),
        spacing_px: (FALLBACK_MIN_SPACING_M * ctx.px_per_m)
            .max(FALLBACK_SPACING_FACTOR * ctx.spacing_px),
        cap_to_target: false,
        ..ctx.clone()
    };
    warn!("{}", LayoutWarning::PackingFallback);
    warnings.push(LayoutWarning::PackingFallback);

    let fallback = evaluate_angle(&fallback_ctx, principal_axis_deg);
    for w in &fallback.warnings {
        if !warnings.contains(w) {
            warnings.push(*w);
        }
    }
    if fallback.panels.is_empty() {
        warn!("{}", LayoutWarning::NoPanelsPlaced);
        warnings.push(LayoutWarning::NoPanelsPlaced);
    } else {
        info!("Fallback placed {} panels", fallback.panels.len());
    }

    SearchOutcome {
        best: fallback,
        warnings,
        boundary_clearance_px: fallback_ctx.boundary_clearance_px,
        spacing_px: fallback_ctx.spacing_px,
        fallback_used: true,
    }
}
