//! Offline coordinate repair for DocTags documents.
//!
//! When the reconciler's heuristics cannot recover the right geometry, a
//! user-supplied affine correction is applied directly to the text. This is
//! a find-and-replace over location quadruples, not a parse/serialise round
//! trip: every byte outside the rewritten markers is preserved exactly.
//!
//! [`suggest_factors`] is advisory only. It inspects the coordinate range and
//! proposes factors that would fit the zones onto a reference page; nothing
//! in the library applies it automatically.

use super::parser::loc_quad;
use crate::zone::BBox;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A4 page size in PostScript points.
pub const REFERENCE_PAGE: (f64, f64) = (595.0, 842.0);

/// Affine correction `v' = max(0, floor(v * factor) + offset)` per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineFix {
    pub x_factor: f64,
    pub y_factor: f64,
    pub x_offset: i64,
    pub y_offset: i64,
}

impl Default for AffineFix {
    /// The factors the manual correction workflow has historically defaulted to.
    fn default() -> Self {
        Self {
            x_factor: 0.7,
            y_factor: 0.7,
            x_offset: 0,
            y_offset: 0,
        }
    }
}

impl AffineFix {
    pub fn scale(x_factor: f64, y_factor: f64) -> Self {
        Self {
            x_factor,
            y_factor,
            x_offset: 0,
            y_offset: 0,
        }
    }

    fn map(value: u32, factor: f64, offset: i64) -> u32 {
        let scaled = (value as f64 * factor).floor() as i64;
        (scaled + offset).clamp(0, u32::MAX as i64) as u32
    }

    /// Apply the correction to one box.
    pub fn apply_to(&self, b: BBox) -> BBox {
        BBox::new(
            Self::map(b.x1, self.x_factor, self.x_offset),
            Self::map(b.y1, self.y_factor, self.y_offset),
            Self::map(b.x2, self.x_factor, self.x_offset),
            Self::map(b.y2, self.y_factor, self.y_offset),
        )
    }
}

/// Every location quadruple in the text, in order.
fn quads(text: &str) -> Vec<BBox> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(rel) = text[pos..].find("<loc_") {
        let start = pos + rel;
        match loc_quad(&text[start..]) {
            Some((bbox, len)) => {
                found.push(bbox);
                pos = start + len;
            }
            None => pos = start + 1,
        }
    }
    found
}

/// Rewrite every `<loc_A><loc_B><loc_C><loc_D>` quadruple with `fix`.
///
/// Isolated markers that are not part of a quadruple are left as they are.
pub fn apply_affine_fix(text: &str, fix: &AffineFix) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    let mut rewritten = 0usize;

    while let Some(rel) = text[pos..].find("<loc_") {
        let start = pos + rel;
        match loc_quad(&text[start..]) {
            Some((bbox, len)) => {
                out.push_str(&text[pos..start]);
                let b = fix.apply_to(bbox);
                out.push_str(&format!(
                    "<loc_{}><loc_{}><loc_{}><loc_{}>",
                    b.x1, b.y1, b.x2, b.y2
                ));
                rewritten += 1;
                pos = start + len;
            }
            None => {
                out.push_str(&text[pos..start + 1]);
                pos = start + 1;
            }
        }
    }
    out.push_str(&text[pos..]);

    debug!(
        "Rewrote {} location quadruples (x×{}, y×{}, +{}, +{})",
        rewritten, fix.x_factor, fix.y_factor, fix.x_offset, fix.y_offset
    );
    out
}

/// Summary of the coordinates found in a DocTags document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateStats {
    pub zone_count: usize,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub avg_width: f64,
    pub avg_height: f64,
    /// Zone sizes vary far more than expected for one coordinate system.
    pub high_variance: bool,
}

/// Compute [`CoordinateStats`]; `None` when the text has no quadruples.
pub fn coordinate_stats(text: &str) -> Option<CoordinateStats> {
    let boxes = quads(text);
    if boxes.is_empty() {
        return None;
    }

    let n = boxes.len() as f64;
    let widths: Vec<f64> = boxes.iter().map(|b| b.x1.abs_diff(b.x2) as f64).collect();
    let heights: Vec<f64> = boxes.iter().map(|b| b.y1.abs_diff(b.y2) as f64).collect();
    let avg_width = widths.iter().sum::<f64>() / n;
    let avg_height = heights.iter().sum::<f64>() / n;

    let std_dev = |values: &[f64], mean: f64| {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
    };
    let high_variance = std_dev(&widths, avg_width) > avg_width * 1.5
        || std_dev(&heights, avg_height) > avg_height * 1.5;

    Some(CoordinateStats {
        zone_count: boxes.len(),
        min_x: boxes.iter().map(|b| b.x1.min(b.x2)).min()?,
        min_y: boxes.iter().map(|b| b.y1.min(b.y2)).min()?,
        max_x: boxes.iter().map(|b| b.x1.max(b.x2)).max()?,
        max_y: boxes.iter().map(|b| b.y1.max(b.y2)).max()?,
        avg_width,
        avg_height,
        high_variance,
    })
}

/// What the coordinate range looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateRegime {
    /// Both maxima above 1000: typical of high-resolution pixel output.
    HighResolution,
    /// Both maxima below 300: probably a normalised grid.
    Normalized,
    /// Nothing stands out.
    Unremarkable,
}

/// Advisory correction factors for [`apply_affine_fix`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSuggestion {
    pub x_factor: f64,
    pub y_factor: f64,
    pub regime: CoordinateRegime,
    pub stats: CoordinateStats,
}

impl FactorSuggestion {
    pub fn as_fix(&self) -> AffineFix {
        AffineFix::scale(self.x_factor, self.y_factor)
    }
}

/// Suggest factors fitting the observed maxima onto [`REFERENCE_PAGE`].
///
/// A zero maximum yields a factor of `1.0` on that axis.
pub fn suggest_factors(text: &str) -> Option<FactorSuggestion> {
    let stats = coordinate_stats(text)?;
    let (ref_w, ref_h) = REFERENCE_PAGE;

    let fit = |reference: f64, max: u32| {
        if max > 0 {
            reference / max as f64
        } else {
            1.0
        }
    };

    let regime = if stats.max_x > 1000 && stats.max_y > 1000 {
        CoordinateRegime::HighResolution
    } else if stats.max_x < 300 && stats.max_y < 300 {
        CoordinateRegime::Normalized
    } else {
        CoordinateRegime::Unremarkable
    };

    Some(FactorSuggestion {
        x_factor: fit(ref_w, stats.max_x),
        y_factor: fit(ref_h, stats.max_y),
        regime,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_coordinates() {
        let out = apply_affine_fix(
            "<loc_100><loc_100><loc_200><loc_200>",
            &AffineFix::scale(0.5, 0.5),
        );
        assert_eq!(out, "<loc_50><loc_50><loc_100><loc_100>");
    }

    #[test]
    fn preserves_every_other_byte() {
        let doc = "<doctag>\n  <text><loc_10><loc_20><loc_30><loc_40>Ünïcödé <b>x</b></text>\n</doctag>\n";
        let out = apply_affine_fix(doc, &AffineFix::scale(2.0, 3.0));
        assert_eq!(
            out,
            "<doctag>\n  <text><loc_20><loc_60><loc_60><loc_120>Ünïcödé <b>x</b></text>\n</doctag>\n"
        );
    }

    #[test]
    fn identity_fix_is_byte_identical() {
        let doc = "<doctag><picture><loc_1><loc_2><loc_3><loc_4></picture></doctag>";
        assert_eq!(apply_affine_fix(doc, &AffineFix::scale(1.0, 1.0)), doc);
    }

    #[test]
    fn offsets_clamp_at_zero() {
        let fix = AffineFix {
            x_factor: 1.0,
            y_factor: 1.0,
            x_offset: -50,
            y_offset: 5,
        };
        let out = apply_affine_fix("<loc_10><loc_10><loc_100><loc_100>", &fix);
        assert_eq!(out, "<loc_0><loc_15><loc_50><loc_105>");
    }

    #[test]
    fn floors_fractional_results() {
        let out = apply_affine_fix("<loc_3><loc_3><loc_7><loc_7>", &AffineFix::scale(0.7, 0.7));
        assert_eq!(out, "<loc_2><loc_2><loc_4><loc_4>");
    }

    #[test]
    fn isolated_markers_untouched() {
        let doc = "<text><loc_1><loc_2><loc_3><loc_4>see <loc_9> here</text>";
        let out = apply_affine_fix(doc, &AffineFix::scale(10.0, 10.0));
        assert_eq!(out, "<text><loc_10><loc_20><loc_30><loc_40>see <loc_9> here</text>");
    }

    #[test]
    fn stats_over_quadruples() {
        let doc = "<loc_10><loc_20><loc_110><loc_70> <loc_200><loc_300><loc_100><loc_400>";
        let stats = coordinate_stats(doc).expect("stats");
        assert_eq!(stats.zone_count, 2);
        assert_eq!((stats.min_x, stats.max_x), (10, 200));
        assert_eq!((stats.min_y, stats.max_y), (20, 400));
        assert!((stats.avg_width - 100.0).abs() < f64::EPSILON);
        assert!((stats.avg_height - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_quadruples_no_suggestion() {
        assert!(suggest_factors("<doctag></doctag>").is_none());
    }

    #[test]
    fn suggestion_for_large_coordinates() {
        let s = suggest_factors("<loc_0><loc_0><loc_1190><loc_1684>").expect("suggestion");
        assert_eq!(s.regime, CoordinateRegime::HighResolution);
        assert!((s.x_factor - 0.5).abs() < 1e-9);
        assert!((s.y_factor - 0.5).abs() < 1e-9);
    }

    #[test]
    fn suggestion_for_small_coordinates() {
        let s = suggest_factors("<loc_0><loc_0><loc_119><loc_200>").expect("suggestion");
        assert_eq!(s.regime, CoordinateRegime::Normalized);
        assert!((s.x_factor - 5.0).abs() < 1e-9);
    }

    #[test]
    fn zero_maxima_suggest_identity() {
        let s = suggest_factors("<loc_0><loc_0><loc_0><loc_0>").expect("suggestion");
        assert_eq!((s.x_factor, s.y_factor), (1.0, 1.0));
    }
}
