// Layout orchestrator: runs the full pipeline for one image
//
// validate -> resize -> mask -> outline -> scale -> obstacles ->
// angle search -> overlay + statistics.

use crate::config::LayoutParams;
use crate::error::LayoutError;
use crate::estimator::RoofAreaEstimator;
use crate::pipeline::geometry::union_all;
use crate::pipeline::mask::{extract_roof_mask, resize_for_processing, to_gray};
use crate::pipeline::obstacles::detect_obstacles;
use crate::pipeline::polygon::{build_outline, estimate_dimensions};
use crate::pipeline::render::render_overlay;
use crate::pipeline::report::{build_stats, RunFacts};
use crate::pipeline::scale::calibrate_mask;
use crate::pipeline::search::{candidate_angles, search_layout, SearchContext};
use crate::pipeline::types::LayoutResult;
use image::RgbImage;
use tracing::info;

/// Places panels on the roof shown in `image`, given its real-world area.
///
/// Parameters are validated before any image work, so configuration errors
/// surface immediately. `roof_length_m`/`roof_width_m` are only reported;
/// whichever is missing is estimated from the roof's aspect ratio.
pub fn layout_panels(
    image: &RgbImage,
    roof_area_m2: f64,
    roof_length_m: Option<f64>,
    roof_width_m: Option<f64>,
    params: &LayoutParams,
) -> Result<LayoutResult, LayoutError> {
    let panel = params.validate()?;

    let processed = resize_for_processing(image);
    info!(
        "Processing {}x{} image (input {}x{})",
        processed.width(),
        processed.height(),
        image.width(),
        image.height()
    );

    let mask = extract_roof_mask(&to_gray(&processed))?;
    let outline = build_outline(&mask.contour);
    let scale = calibrate_mask(roof_area_m2, &mask)?;
    let roof_area_px = mask.pixel_count() as f64;
    info!(
        "Roof extracted: {} px, {} vertices, axis {:.2}°, {:.4} m/px",
        roof_area_px,
        outline.polygon.exterior().0.len().saturating_sub(1),
        outline.principal_axis_deg,
        scale.meters_per_pixel
    );

    // Supplied values win; only the missing side is estimated
    let estimated = estimate_dimensions(roof_area_m2, outline.aspect_ratio());
    let roof_lw_m = (
        roof_length_m.unwrap_or(estimated.0),
        roof_width_m.unwrap_or(estimated.1),
    );

    let obstacle_polys = detect_obstacles(
        &processed,
        &mask,
        &scale,
        params.obstacle_clearance_m,
        params.obstacle_mode,
    );
    let obstacle_union = union_all(&obstacle_polys);
    let obstacles = (!obstacle_union.0.is_empty()).then_some(&obstacle_union);

    let ctx = SearchContext {
        roof: &outline.polygon,
        obstacles,
        center: mask.center(),
        px_per_m: scale.px_per_m(),
        roof_area_px,
        panel_length_px: scale.to_px(panel.length_m),
        panel_width_px: scale.to_px(panel.width_m),
        spacing_px: scale.to_px(params.spacing_m),
        boundary_clearance_px: scale.to_px(params.boundary_clearance_m()),
        obstacle_clearance_px: scale.to_px(params.obstacle_clearance_m),
        fill_frac: params.fill_pct / 100.0,
        fill_reference: params.fill_relative_to,
        overshoot_tolerance_frac: params.overshoot_tolerance_frac,
        cap_to_target: true,
    };
    let angles = candidate_angles(params.angle_deg, outline.principal_axis_deg);
    let outcome = search_layout(&ctx, &angles, outline.principal_axis_deg);

    let overlay = render_overlay(&processed, &outcome.best.panels);
    let stats = build_stats(
        &RunFacts {
            params,
            panel: &panel,
            scale,
            roof_area_m2,
            roof_area_px,
            roof_lw_m,
        },
        &outcome,
    );
    info!(
        "Placed {} {} panels at {:.2}°: {:.2}% of usable area, {:.3} kWp",
        stats.panels_count,
        stats.panel_size,
        stats.angle_used_deg,
        stats.fill_achieved_pct_of_usable,
        stats.capacity_estimated_kwp
    );

    Ok(LayoutResult {
        panels: outcome.best.panels,
        overlay,
        mask: mask.image,
        stats,
    })
}

/// Same as [`layout_panels`], asking `estimator` for the real-world roof area.
pub fn layout_with_estimator(
    image: &RgbImage,
    estimator: &dyn RoofAreaEstimator,
    roof_length_m: Option<f64>,
    roof_width_m: Option<f64>,
    params: &LayoutParams,
) -> Result<LayoutResult, LayoutError> {
    params.validate()?;
    let area = estimator.roof_area_m2(image)?;
    layout_panels(image, area, roof_length_m, roof_width_m, params)
}
