use crate::pipeline::geometry::{contains_rect, panel_rect};
use crate::pipeline::types::{Orientation, UsableRegion};
use geo::BoundingRect;
use geo_types::{Polygon, Rect};

/// Panel footprint and spacing in pixels of the packing frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// Extent along x.
    pub panel_w: f64,
    /// Extent along y.
    pub panel_h: f64,
    pub spacing: f64,
}

impl GridSpec {
    pub fn step_x(&self) -> f64 {
        self.panel_w + self.spacing
    }

    pub fn step_y(&self) -> f64 {
        self.panel_h + self.spacing
    }

    pub fn panel_area(&self) -> f64 {
        self.panel_w * self.panel_h
    }

    /// Phase offsets tried for every grid: none, half-step x, half-step y, both.
    pub fn offsets(&self) -> [(f64, f64); 4] {
        let hx = 0.5 * self.step_x();
        let hy = 0.5 * self.step_y();
        [(0.0, 0.0), (hx, 0.0), (0.0, hy), (hx, hy)]
    }
}

/// Area budget for one packing call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillBudget {
    /// Target placed area; `None` packs to saturation.
    pub target: Option<f64>,
    /// Area the target may be exceeded by.
    pub overshoot_tolerance: f64,
}

impl FillBudget {
    pub fn unlimited() -> Self {
        Self {
            target: None,
            overshoot_tolerance: 0.0,
        }
    }

    fn cap(&self) -> Option<f64> {
        self.target.filter(|t| *t > 0.0)
    }
}

/// Packs a centered grid fully inside one polygon, keeping the best phase offset.
pub fn pack_part(part: &Polygon<f64>, grid: &GridSpec, budget: &FillBudget) -> Vec<Rect<f64>> {
    let Some(bounds) = part.bounding_rect() else {
        return Vec::new();
    };
    let (w, h) = (grid.panel_w, grid.panel_h);
    if w <= 0.0 || h <= 0.0 {
        return Vec::new();
    }

    let avail_w = bounds.width().max(0.0);
    let avail_h = bounds.height().max(0.0);
    let cols = if avail_w >= w {
        1 + ((avail_w - w) / grid.step_x()).floor() as usize
    } else {
        0
    };
    let rows = if avail_h >= h {
        1 + ((avail_h - h) / grid.step_y()).floor() as usize
    } else {
        0
    };
    if cols == 0 || rows == 0 {
        return Vec::new();
    }

    let used_w = cols as f64 * w + (cols - 1) as f64 * grid.spacing;
    let used_h = rows as f64 * h + (rows - 1) as f64 * grid.spacing;
    let base_x = bounds.min().x + (avail_w - used_w) / 2.0;
    let base_y = bounds.min().y + (avail_h - used_h) / 2.0;

    let panel_area = grid.panel_area();
    let cap = budget.cap();
    let mut best: Vec<Rect<f64>> = Vec::new();
    let mut best_area = 0.0;

    for (ox, oy) in grid.offsets() {
        let mut placed = Vec::new();
        let mut covered = 0.0;

        'rows: for r in 0..rows {
            let y = base_y + oy + r as f64 * grid.step_y();
            for c in 0..cols {
                if let Some(target) = cap {
                    let next = covered + panel_area;
                    if next > target && next - target > budget.overshoot_tolerance {
                        // Every later cell overshoots by the same amount
                        break 'rows;
                    }
                }

                let x = base_x + ox + c as f64 * grid.step_x();
                let rect = panel_rect(x, y, w, h);
                if contains_rect(part, &rect) {
                    placed.push(rect);
                    covered += panel_area;
                    if cap.is_some_and(|t| covered >= t) {
                        break 'rows;
                    }
                }
            }
        }

        if covered > best_area {
            best = placed;
            best_area = covered;
        }
    }
    best
}

/// Packs each part in order, carrying the remaining target budget across parts.
pub fn pack_region(region: &UsableRegion, grid: &GridSpec, budget: &FillBudget) -> Vec<Rect<f64>> {
    let mut placed_all = Vec::new();
    let mut remaining = budget.target;

    for part in &region.parts {
        let part_budget = FillBudget {
            target: remaining,
            ..*budget
        };
        let placed = pack_part(part, grid, &part_budget);
        let area = placed.len() as f64 * grid.panel_area();
        placed_all.extend(placed);

        if let Some(r) = remaining.as_mut() {
            *r -= area;
            if *r <= 0.0 {
                break;
            }
        }
    }
    placed_all
}

/// Winning orientation of one packing frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PackOutcome {
    pub rects: Vec<Rect<f64>>,
    pub orientation: Orientation,
    pub placed_area: f64,
}

/// Packs portrait (width along x) and landscape (length along x) independently
/// and keeps the one covering more area; ties go to portrait.
pub fn pack_best_orientation(
    region: &UsableRegion,
    length_px: f64,
    width_px: f64,
    spacing_px: f64,
    budget: &FillBudget,
) -> PackOutcome {
    let portrait = GridSpec {
        panel_w: width_px,
        panel_h: length_px,
        spacing: spacing_px,
    };
    let landscape = GridSpec {
        panel_w: length_px,
        panel_h: width_px,
        spacing: spacing_px,
    };

    let p = pack_region(region, &portrait, budget);
    let l = pack_region(region, &landscape, budget);
    let panel_area = length_px * width_px;
    let p_area = p.len() as f64 * panel_area;
    let l_area = l.len() as f64 * panel_area;

    if l_area > p_area {
        PackOutcome {
            rects: l,
            orientation: Orientation::Landscape,
            placed_area: l_area,
        }
    } else {
        PackOutcome {
            rects: p,
            orientation: Orientation::Portrait,
            placed_area: p_area,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, BooleanOps};

    fn region(parts: Vec<Polygon<f64>>) -> UsableRegion {
        UsableRegion { parts }
    }

    fn square(x0: f64, y0: f64, side: f64) -> Polygon<f64> {
        panel_rect(x0, y0, side, side).to_polygon()
    }

    fn grid(w: f64, h: f64, spacing: f64) -> GridSpec {
        GridSpec {
            panel_w: w,
            panel_h: h,
            spacing,
        }
    }

    fn budget(target: f64, tol: f64) -> FillBudget {
        FillBudget {
            target: Some(target),
            overshoot_tolerance: tol,
        }
    }

    fn assert_disjoint(rects: &[Rect<f64>]) {
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                let overlap = a.to_polygon().intersection(&b.to_polygon()).unsigned_area();
                assert!(overlap < 1e-9, "panels {:?} and {:?} overlap", a, b);
            }
        }
    }

    #[test]
    fn saturates_square_without_target() {
        let placed = pack_part(&square(0.0, 0.0, 105.0), &grid(10.0, 20.0, 0.0), &FillBudget::unlimited());
        assert_eq!(placed.len(), 50);
        assert_disjoint(&placed);
    }

    #[test]
    fn spacing_reduces_capacity() {
        let placed = pack_part(&square(0.0, 0.0, 105.0), &grid(10.0, 20.0, 2.0), &FillBudget::unlimited());
        // cols = 1 + floor(95 / 12) = 8, rows = 1 + floor(85 / 22) = 4
        assert_eq!(placed.len(), 32);
        assert_disjoint(&placed);
    }

    #[test]
    fn stops_when_target_reached() {
        let placed = pack_part(&square(0.0, 0.0, 105.0), &grid(10.0, 20.0, 0.0), &budget(3000.0, 40.0));
        assert_eq!(placed.len(), 15);
    }

    #[test]
    fn overshoot_beyond_tolerance_is_refused() {
        let placed = pack_part(&square(0.0, 0.0, 105.0), &grid(10.0, 20.0, 0.0), &budget(3050.0, 40.0));
        assert_eq!(placed.len(), 15);
    }

    #[test]
    fn overshoot_within_tolerance_is_accepted() {
        let placed = pack_part(&square(0.0, 0.0, 105.0), &grid(10.0, 20.0, 0.0), &budget(3050.0, 200.0));
        assert_eq!(placed.len(), 16);
    }

    #[test]
    fn too_small_part_gets_nothing() {
        let placed = pack_part(&square(0.0, 0.0, 8.0), &grid(10.0, 20.0, 0.0), &FillBudget::unlimited());
        assert!(placed.is_empty());
    }

    #[test]
    fn budget_carries_across_parts() {
        let r = region(vec![square(0.0, 0.0, 105.0), square(200.0, 0.0, 105.0)]);
        let placed = pack_region(&r, &grid(10.0, 20.0, 0.0), &budget(12_000.0, 0.0));
        assert_eq!(placed.len(), 60);
        let in_second = placed.iter().filter(|p| p.min().x >= 200.0).count();
        assert_eq!(in_second, 10);
    }

    #[test]
    fn exhausted_budget_skips_later_parts() {
        let r = region(vec![square(0.0, 0.0, 105.0), square(200.0, 0.0, 105.0)]);
        let placed = pack_region(&r, &grid(10.0, 20.0, 0.0), &budget(2000.0, 0.0));
        assert_eq!(placed.len(), 10);
        assert!(placed.iter().all(|p| p.max().x <= 105.0));
    }

    #[test]
    fn wide_strip_prefers_landscape() {
        let strip = panel_rect(0.0, 0.0, 205.0, 35.0).to_polygon();
        let outcome = pack_best_orientation(&region(vec![strip]), 20.0, 10.0, 0.0, &FillBudget::unlimited());
        assert_eq!(outcome.orientation, Orientation::Landscape);
        assert_eq!(outcome.rects.len(), 30);
        assert!((outcome.placed_area - 30.0 * 200.0).abs() < 1e-9);
    }

    #[test]
    fn placements_avoid_holes() {
        let hole = panel_rect(40.0, 40.0, 25.0, 25.0);
        let part = square(0.0, 0.0, 105.0).difference(&hole.to_polygon());
        let r = region(part.0);
        let placed = pack_region(&r, &grid(10.0, 20.0, 0.0), &FillBudget::unlimited());
        assert!(!placed.is_empty());
        for p in &placed {
            let overlap = p.to_polygon().intersection(&hole.to_polygon()).unsigned_area();
            assert!(overlap < 1e-9);
        }
        assert_disjoint(&placed);
    }
}
