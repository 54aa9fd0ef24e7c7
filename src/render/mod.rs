//! Region rendering: overlays, crops and per-page reports.
//!
//! Everything here is synchronous and pure with respect to its inputs: the
//! caller's [`PageRaster`] is never modified, every call returns new images.

pub mod crop;
pub mod overlay;
pub mod palette;
pub mod report;

use image::{DynamicImage, GenericImageView};

pub use crop::{crop_regions, sanitize_caption, CropOptions, CropOutcome, CroppedRegion, KindFilter};
pub use overlay::{draw_overlay, placeholder_raster, OverlayOptions, OverlayOutcome};
pub use palette::Palette;
pub use report::{PageReport, ZoneReport};

/// One rendered page. Its pixel size is the ground truth for reconciliation.
#[derive(Debug, Clone)]
pub struct PageRaster {
    /// 1-based page number.
    pub page_num: usize,
    pub image: DynamicImage,
}

impl PageRaster {
    pub fn new(page_num: usize, image: DynamicImage) -> Self {
        Self { page_num, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
