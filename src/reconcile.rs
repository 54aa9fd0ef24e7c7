//! Coordinate reconciliation: raw DocTags boxes → page-pixel boxes.
//!
//! Models report boxes in one of two conventions and never say which:
//!
//! * a fixed 0–500 grid independent of the page size, or
//! * raw pixel coordinates at an unknown scale (often the resolution the
//!   model internally resized the page to).
//!
//! [`reconcile_with`] picks one mapping per page, in this order:
//!
//! 1. no zones, or every `x2` and `y2` is zero → [`ScaleStrategy::Identity`];
//! 2. every coordinate fits in the grid → [`ScaleStrategy::NormalizedGrid`];
//! 3. an explicit scale was configured → [`ScaleStrategy::ManualScale`];
//! 4. the caller opted into auto-adjust → [`ScaleStrategy::HeuristicScale`];
//! 5. otherwise → [`ScaleStrategy::Identity`].
//!
//! The grid test wins over everything else, so a page whose pixel boxes
//! happen to stay below 500 is treated as grid output. That ambiguity is
//! inherent to the input and is not second-guessed here.

use crate::zone::{BBox, ReconciledZone, Zone};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ── Options ──────────────────────────────────────────────────────────────────

/// Calibration constants for [`reconcile_with`].
///
/// The defaults reproduce the behaviour the tool has always had; they are
/// fields rather than constants so that other models can be calibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Side of the normalised coordinate grid. Default: 500.
    pub grid_size: u32,

    /// Guess a per-axis scale when coordinates exceed the grid. Default: false.
    pub auto_adjust: bool,

    /// Beyond this size ratio the heuristic scale is used unclamped. Default: 5.
    pub aggressive_ratio: f64,

    /// Lower bound on the heuristic scale when coordinates undershoot the
    /// page. Default: 0.5.
    pub upscale_floor: f64,

    /// Upper bound on the heuristic scale when coordinates overshoot the
    /// page. Default: 1.0.
    pub downscale_ceiling: f64,

    /// Explicit `(x, y)` scale; takes precedence over `auto_adjust`.
    pub manual_scale: Option<(f64, f64)>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            grid_size: 500,
            auto_adjust: false,
            aggressive_ratio: 5.0,
            upscale_floor: 0.5,
            downscale_ceiling: 1.0,
            manual_scale: None,
        }
    }
}

// ── Result ───────────────────────────────────────────────────────────────────

/// Which mapping was applied to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleStrategy {
    NormalizedGrid,
    HeuristicScale,
    ManualScale,
    Identity,
}

impl ScaleStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleStrategy::NormalizedGrid => "normalized_grid",
            ScaleStrategy::HeuristicScale => "heuristic_scale",
            ScaleStrategy::ManualScale => "manual_scale",
            ScaleStrategy::Identity => "identity",
        }
    }
}

impl std::fmt::Display for ScaleStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`reconcile`]: zones in input order plus the mapping used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub zones: Vec<ReconciledZone>,
    pub strategy: ScaleStrategy,
    /// Effective horizontal factor (`W / grid` for the grid strategy).
    pub x_scale: f64,
    /// Effective vertical factor (`H / grid` for the grid strategy).
    pub y_scale: f64,
    pub page_width: u32,
    pub page_height: u32,
    /// Largest raw `x2` among the input zones (0 when empty).
    pub max_x: u32,
    /// Largest raw `y2` among the input zones (0 when empty).
    pub max_y: u32,
}

impl ReconciliationResult {
    /// The mapping was guessed and may well be wrong.
    ///
    /// Callers surface this so the user can try a manual scale or the
    /// offline scale fix.
    pub fn is_uncertain(&self) -> bool {
        self.strategy == ScaleStrategy::HeuristicScale
    }

    pub fn reconciled_boxes(&self) -> impl Iterator<Item = BBox> + '_ {
        self.zones.iter().map(|z| z.bbox)
    }
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Reconcile with the default [`ReconcileOptions`].
pub fn reconcile(zones: &[Zone], page_width: u32, page_height: u32) -> ReconciliationResult {
    reconcile_with(zones, page_width, page_height, &ReconcileOptions::default())
}

/// Map every zone's raw box onto a `page_width × page_height` raster.
///
/// Never fails. Reconciled coordinates are non-negative but are **not**
/// clamped to the page: overlay and crop apply their own policy.
pub fn reconcile_with(
    zones: &[Zone],
    page_width: u32,
    page_height: u32,
    options: &ReconcileOptions,
) -> ReconciliationResult {
    let max_x = zones.iter().map(|z| z.bbox.x2).max().unwrap_or(0);
    let max_y = zones.iter().map(|z| z.bbox.y2).max().unwrap_or(0);

    let result = |strategy, x_scale, y_scale, zones| ReconciliationResult {
        zones,
        strategy,
        x_scale,
        y_scale,
        page_width,
        page_height,
        max_x,
        max_y,
    };

    if zones.is_empty() {
        return result(ScaleStrategy::Identity, 1.0, 1.0, Vec::new());
    }

    // Nothing to measure a scale against.
    if max_x == 0 && max_y == 0 {
        debug!("Every zone ends at (0,0); coordinates used as page pixels");
        return result(ScaleStrategy::Identity, 1.0, 1.0, map_zones(zones, |b| b));
    }

    let grid = options.grid_size;
    if grid > 0 && max_x <= grid && max_y <= grid {
        debug!(
            "Normalized grid detected (max {}x{} <= {}), mapping onto {}x{}",
            max_x, max_y, grid, page_width, page_height
        );
        let mapped = map_zones(zones, |b| {
            BBox::new(
                grid_to_pixels(b.x1, page_width, grid),
                grid_to_pixels(b.y1, page_height, grid),
                grid_to_pixels(b.x2, page_width, grid),
                grid_to_pixels(b.y2, page_height, grid),
            )
        });
        return result(
            ScaleStrategy::NormalizedGrid,
            page_width as f64 / grid as f64,
            page_height as f64 / grid as f64,
            mapped,
        );
    }

    if let Some((sx, sy)) = options.manual_scale {
        debug!("Applying manual scale x={:.3}, y={:.3}", sx, sy);
        let mapped = map_zones(zones, |b| scale_box(b, sx, sy));
        return result(ScaleStrategy::ManualScale, sx, sy, mapped);
    }

    if options.auto_adjust {
        let sx = heuristic_scale(page_width, max_x, options);
        let sy = heuristic_scale(page_height, max_y, options);
        warn!(
            "Coordinates exceed the {} grid (max {}x{} on a {}x{} page); guessed scale x={:.3}, y={:.3}",
            grid, max_x, max_y, page_width, page_height, sx, sy
        );
        let mapped = map_zones(zones, |b| scale_box(b, sx, sy));
        return result(ScaleStrategy::HeuristicScale, sx, sy, mapped);
    }

    debug!("Coordinates used as page pixels");
    let mapped = map_zones(zones, |b| b);
    result(ScaleStrategy::Identity, 1.0, 1.0, mapped)
}

// ── Mapping helpers ──────────────────────────────────────────────────────────

fn map_zones(zones: &[Zone], f: impl Fn(BBox) -> BBox) -> Vec<ReconciledZone> {
    zones
        .iter()
        .map(|z| ReconciledZone {
            zone: z.clone(),
            bbox: f(z.bbox),
        })
        .collect()
}

/// `floor(v * size / grid)` in integer arithmetic.
fn grid_to_pixels(v: u32, size: u32, grid: u32) -> u32 {
    (v as u64 * size as u64 / grid as u64) as u32
}

fn scale_coord(v: u32, factor: f64) -> u32 {
    let scaled = (v as f64 * factor).trunc();
    if scaled <= 0.0 {
        0
    } else if scaled >= u32::MAX as f64 {
        u32::MAX
    } else {
        scaled as u32
    }
}

fn scale_box(b: BBox, sx: f64, sy: f64) -> BBox {
    BBox::new(
        scale_coord(b.x1, sx),
        scale_coord(b.y1, sy),
        scale_coord(b.x2, sx),
        scale_coord(b.y2, sy),
    )
}

/// Per-axis scale guess for coordinates that exceed the grid.
fn heuristic_scale(size: u32, max: u32, options: &ReconcileOptions) -> f64 {
    if max == 0 {
        return 1.0;
    }
    let (size, max) = (size as f64, max as f64);
    let ratio = size / max;

    let clamped = if max > size {
        ratio.min(options.downscale_ceiling)
    } else {
        ratio.max(options.upscale_floor)
    };

    if max > size * options.aggressive_ratio || max < size / options.aggressive_ratio {
        ratio
    } else {
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn z(x1: u32, y1: u32, x2: u32, y2: u32) -> Zone {
        Zone::new("text", BBox::new(x1, y1, x2, y2), "")
    }

    fn adjusting(zones: &[Zone], w: u32, h: u32) -> ReconciliationResult {
        let opts = ReconcileOptions {
            auto_adjust: true,
            ..Default::default()
        };
        reconcile_with(zones, w, h, &opts)
    }

    #[test]
    fn hello_on_1000_square_page() {
        let zones = vec![Zone::new("text", BBox::new(10, 10, 100, 50), "Hello")];
        let r = reconcile(&zones, 1000, 1000);
        assert_eq!(r.strategy, ScaleStrategy::NormalizedGrid);
        assert_eq!(r.zones[0].bbox, BBox::new(20, 20, 200, 100));
        assert_eq!(r.zones[0].raw_bbox(), BBox::new(10, 10, 100, 50));
        assert_eq!(r.zones[0].text(), "Hello");
    }

    #[test]
    fn grid_identity_at_500() {
        let zones = vec![z(0, 0, 500, 500), z(17, 33, 401, 250)];
        let r = reconcile(&zones, 500, 500);
        assert_eq!(r.strategy, ScaleStrategy::NormalizedGrid);
        for rz in &r.zones {
            assert_eq!(rz.bbox, rz.raw_bbox());
        }
        assert_eq!((r.x_scale, r.y_scale), (1.0, 1.0));
    }

    #[test]
    fn grid_truncates() {
        let r = reconcile(&[z(1, 1, 3, 3)], 333, 999);
        // 1*333/500 = 0.666, 3*333/500 = 1.998, 1*999/500 = 1.998, 3*999/500 = 5.994
        assert_eq!(r.zones[0].bbox, BBox::new(0, 1, 1, 5));
    }

    #[test]
    fn grid_is_monotonic_in_page_size() {
        let zones = vec![z(123, 77, 456, 499)];
        let mut prev = BBox::default();
        for size in (100..3000).step_by(37) {
            let b = reconcile(&zones, size, size).zones[0].bbox;
            assert!(b.x1 >= prev.x1 && b.y1 >= prev.y1 && b.x2 >= prev.x2 && b.y2 >= prev.y2);
            prev = b;
        }
    }

    #[test]
    fn doubling_the_page_doubles_grid_coordinates() {
        let zones = vec![z(123, 77, 456, 499), z(1, 2, 3, 4), z(0, 0, 500, 500)];
        for (w, h) in [(333, 999), (595, 842), (1000, 1000), (1237, 1601)] {
            let small = reconcile(&zones, w, h);
            let large = reconcile(&zones, 2 * w, 2 * h);
            for (a, b) in small.reconciled_boxes().zip(large.reconciled_boxes()) {
                for (v1, v2) in [(a.x1, b.x1), (a.y1, b.y1), (a.x2, b.x2), (a.y2, b.y2)] {
                    assert!(
                        (v2 as i64 - 2 * v1 as i64).abs() <= 1,
                        "{v2} is not 2 x {v1} on {w}x{h}"
                    );
                }
            }
        }
    }

    #[test]
    fn empty_is_identity() {
        let r = reconcile(&[], 800, 600);
        assert_eq!(r.strategy, ScaleStrategy::Identity);
        assert!(r.zones.is_empty());
        assert_eq!((r.max_x, r.max_y), (0, 0));
    }

    #[test]
    fn all_zero_corners_fall_back_to_identity() {
        let r = adjusting(&[z(50, 40, 0, 0), z(7, 9, 0, 0)], 1000, 1000);
        assert_eq!(r.strategy, ScaleStrategy::Identity);
        assert_eq!((r.x_scale, r.y_scale), (1.0, 1.0));
        assert_eq!(r.zones[0].bbox, BBox::new(50, 40, 0, 0));
        assert_eq!(r.zones[1].bbox, BBox::new(7, 9, 0, 0));
    }

    #[test]
    fn zero_max_x_does_not_divide_by_zero() {
        // max_y exceeds the grid, max_x is zero.
        let r = adjusting(&[z(0, 100, 0, 900)], 800, 600);
        assert_eq!(r.strategy, ScaleStrategy::HeuristicScale);
        assert_eq!(r.x_scale, 1.0);
        assert!(r.x_scale.is_finite() && r.y_scale.is_finite());
        assert_eq!(r.zones[0].bbox.x2, 0);
    }

    #[test]
    fn heuristic_downscales_overshoot() {
        // 1200 on a 1000 wide page: 1000/1200 = 0.833, under the 1.0 ceiling.
        let r = adjusting(&[z(600, 0, 1200, 100)], 1000, 1000);
        assert_eq!(r.strategy, ScaleStrategy::HeuristicScale);
        assert!((r.x_scale - 1000.0 / 1200.0).abs() < 1e-12);
        assert_eq!(r.zones[0].bbox.x2, 1000);
        assert_eq!(r.zones[0].bbox.x1, 500);
        assert!(r.is_uncertain());
    }

    #[test]
    fn heuristic_upscale_respects_floor_and_aggressive_override() {
        // x: 600 on a 2000 page → 3.33 (within 5x, above floor).
        // y: 600 on a 4000 page → 600 < 4000/5 → aggressive 6.67.
        let r = adjusting(&[z(0, 0, 600, 600)], 2000, 4000);
        assert!((r.x_scale - 2000.0 / 600.0).abs() < 1e-12);
        assert!((r.y_scale - 4000.0 / 600.0).abs() < 1e-12);
        assert_eq!(r.zones[0].bbox, BBox::new(0, 0, 2000, 4000));
    }

    #[test]
    fn heuristic_aggressive_downscale() {
        // 8000 > 1000 * 5: unclamped ratio.
        let r = adjusting(&[z(0, 0, 8000, 100)], 1000, 1000);
        assert_eq!(r.x_scale, 0.125);
        assert_eq!(r.zones[0].bbox.x2, 1000);
    }

    #[test]
    fn manual_scale_beats_heuristic() {
        let opts = ReconcileOptions {
            manual_scale: Some((0.5, 2.0)),
            ..Default::default()
        };
        let r = reconcile_with(&[z(100, 100, 1000, 300)], 800, 800, &opts);
        assert_eq!(r.strategy, ScaleStrategy::ManualScale);
        assert_eq!(r.zones[0].bbox, BBox::new(50, 200, 500, 600));
        assert!(!r.is_uncertain());
    }

    #[test]
    fn manual_scale_does_not_override_grid() {
        let opts = ReconcileOptions {
            manual_scale: Some((3.0, 3.0)),
            ..Default::default()
        };
        let r = reconcile_with(&[z(10, 10, 100, 50)], 1000, 1000, &opts);
        assert_eq!(r.strategy, ScaleStrategy::NormalizedGrid);
    }

    #[test]
    fn heuristic_is_opt_in() {
        let r = reconcile(&[z(10, 10, 900, 700)], 1000, 1000);
        assert_eq!(r.strategy, ScaleStrategy::Identity);
        assert_eq!((r.x_scale, r.y_scale), (1.0, 1.0));
        assert_eq!(r.zones[0].bbox, BBox::new(10, 10, 900, 700));
        assert!(!r.is_uncertain());
    }

    #[test]
    fn reversed_box_is_preserved_not_fixed() {
        let r = reconcile(&[z(300, 10, 100, 50)], 1000, 1000);
        assert_eq!(r.zones[0].bbox, BBox::new(600, 20, 200, 100));
        assert!(r.zones[0].bbox.is_degenerate());
    }

    #[test]
    fn input_order_preserved() {
        let zones = vec![z(0, 400, 10, 410), z(0, 0, 10, 10)];
        let r = reconcile(&zones, 500, 500);
        assert_eq!(r.zones[0].raw_bbox().y1, 400);
        assert_eq!(r.zones[1].raw_bbox().y1, 0);
    }
}
