//! Zone and bounding-box types shared by the parser, reconciler and renderer.
//!
//! A [`Zone`] is exactly what the model reported: its box is never mutated
//! after parsing. Reconciliation derives a second box and pairs it with the
//! untouched zone in a [`ReconciledZone`], so the same parse can be
//! reprocessed under different scale assumptions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Axis-aligned box `(x1, y1, x2, y2)` in integer units.
///
/// No ordering is guaranteed: malformed model output can report `x1 > x2`.
/// Use [`BBox::is_degenerate`] before drawing or cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BBox {
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Width, or 0 when `x1 >= x2`.
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    /// Height, or 0 when `y1 >= y2`.
    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// `true` when the box has no positive area.
    pub fn is_degenerate(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    /// `0 <= x1 < x2 <= width` and `0 <= y1 < y2 <= height`.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        !self.is_degenerate() && self.x2 <= width && self.y2 <= height
    }

    /// Clamp every edge into `[0, width] × [0, height]`.
    ///
    /// A box lying entirely outside the image collapses to a degenerate box.
    pub fn clamp_to(&self, width: u32, height: u32) -> BBox {
        BBox {
            x1: self.x1.min(width),
            y1: self.y1.min(height),
            x2: self.x2.min(width),
            y2: self.y2.min(height),
        }
    }

    /// Grow by `margin` on every side, clamped to the image bounds.
    pub fn expand(&self, margin: u32, width: u32, height: u32) -> BBox {
        BBox {
            x1: self.x1.saturating_sub(margin),
            y1: self.y1.saturating_sub(margin),
            x2: self.x2.saturating_add(margin).min(width),
            y2: self.y2.saturating_add(margin).min(height),
        }
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})-({},{})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// A region detected on a page, as reported in the DocTags source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Tag name (`text`, `picture`, `section_header_level_1`, …). Open set.
    pub kind: String,
    /// Raw box exactly as written in the `<loc_N>` markers.
    pub bbox: BBox,
    /// Inner text with any location markers stripped.
    pub text: String,
}

impl Zone {
    pub fn new(kind: impl Into<String>, bbox: BBox, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            bbox,
            text: text.into(),
        }
    }
}

/// Sort zones top-to-bottom, then left-to-right, using their raw boxes.
///
/// Stable, so zones sharing a top-left corner keep document order.
pub fn sort_reading_order(zones: &mut [Zone]) {
    zones.sort_by(reading_order);
}

fn reading_order(a: &Zone, b: &Zone) -> Ordering {
    (a.bbox.y1, a.bbox.x1).cmp(&(b.bbox.y1, b.bbox.x1))
}

/// A zone paired with its box in page-pixel space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledZone {
    /// The untouched parsed zone (raw box included).
    pub zone: Zone,
    /// Box mapped onto the page raster.
    pub bbox: BBox,
}

impl ReconciledZone {
    pub fn kind(&self) -> &str {
        &self.zone.kind
    }

    pub fn text(&self) -> &str {
        &self.zone.text
    }

    pub fn raw_bbox(&self) -> BBox {
        self.zone.bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_boxes() {
        assert!(BBox::new(10, 10, 10, 20).is_degenerate());
        assert!(BBox::new(30, 10, 20, 20).is_degenerate());
        assert!(BBox::new(0, 5, 10, 5).is_degenerate());
        assert!(!BBox::new(0, 0, 1, 1).is_degenerate());
    }

    #[test]
    fn width_saturates_on_reversed_box() {
        let b = BBox::new(50, 0, 20, 10);
        assert_eq!(b.width(), 0);
        assert_eq!(b.height(), 10);
    }

    #[test]
    fn fits_within_requires_positive_area() {
        assert!(BBox::new(0, 0, 100, 100).fits_within(100, 100));
        assert!(!BBox::new(0, 0, 101, 100).fits_within(100, 100));
        assert!(!BBox::new(5, 5, 5, 6).fits_within(100, 100));
    }

    #[test]
    fn clamp_collapses_box_outside_image() {
        let b = BBox::new(150, 150, 200, 200).clamp_to(100, 100);
        assert_eq!(b, BBox::new(100, 100, 100, 100));
        assert!(b.is_degenerate());
    }

    #[test]
    fn expand_is_clamped() {
        let b = BBox::new(5, 5, 95, 95).expand(10, 100, 100);
        assert_eq!(b, BBox::new(0, 0, 100, 100));
    }

    #[test]
    fn reading_order_sorts_by_top_then_left() {
        let mut zones = vec![
            Zone::new("text", BBox::new(200, 50, 300, 60), "b"),
            Zone::new("text", BBox::new(10, 50, 100, 60), "a"),
            Zone::new("page_header", BBox::new(10, 5, 100, 10), "h"),
        ];
        sort_reading_order(&mut zones);
        let order: Vec<&str> = zones.iter().map(|z| z.text.as_str()).collect();
        assert_eq!(order, vec!["h", "a", "b"]);
    }
}
