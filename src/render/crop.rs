//! Region extraction: crop zones of selected kinds out of the page.

use super::PageRaster;
use crate::error::ZoneWarning;
use crate::zone::{BBox, ReconciledZone};
use image::imageops::FilterType;
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Which zone kinds to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindFilter {
    All,
    Only(Vec<String>),
}

impl KindFilter {
    pub fn only<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KindFilter::Only(kinds.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, kind: &str) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Only(kinds) => kinds.iter().any(|k| k == kind),
        }
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        KindFilter::only(["picture"])
    }
}

/// Options for [`crop_regions`].
#[derive(Debug, Clone)]
pub struct CropOptions {
    pub kinds: KindFilter,
    /// Crops wider than this are downscaled, keeping the aspect ratio. Default: 1200.
    pub max_width: u32,
    /// Extra pixels on every side, clamped to the page. Default: 0.
    pub margin: u32,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            kinds: KindFilter::default(),
            max_width: 1200,
            margin: 0,
        }
    }
}

/// One extracted region.
#[derive(Debug, Clone)]
pub struct CroppedRegion {
    /// 1-based position among the zones matching the filter, skipped ones included.
    pub ordinal: usize,
    /// Index into the zone list passed to [`crop_regions`].
    pub zone_index: usize,
    pub kind: String,
    pub caption: String,
    /// Box actually cut from the page (margin applied).
    pub bbox: BBox,
    pub image: DynamicImage,
    /// Suggested file name without extension, e.g. `picture_2_sales_by_region`.
    pub file_stem: String,
}

#[derive(Debug, Clone, Default)]
pub struct CropOutcome {
    pub crops: Vec<CroppedRegion>,
    pub warnings: Vec<ZoneWarning>,
}

/// Crop every zone whose kind matches `options.kinds`, in input order.
///
/// The box is grown by `options.margin` and clamped to the page. A zone
/// whose clamped box is degenerate (reversed, or lying entirely off the
/// page) is skipped with a warning; one that only overhangs the page is
/// cropped to its visible part.
pub fn crop_regions(
    raster: &PageRaster,
    zones: &[ReconciledZone],
    options: &CropOptions,
) -> CropOutcome {
    let (width, height) = raster.dimensions();
    let mut outcome = CropOutcome::default();
    let mut ordinal = 0;

    for (zone_index, rz) in zones.iter().enumerate() {
        if !options.kinds.matches(rz.kind()) {
            continue;
        }
        ordinal += 1;

        let raw = rz.bbox;
        if raw.is_degenerate() {
            warn!("Not extracting {} {}: degenerate box {}", rz.kind(), ordinal, raw);
            outcome.warnings.push(ZoneWarning::Degenerate {
                index: zone_index,
                kind: rz.kind().to_string(),
                bbox: raw,
            });
            continue;
        }

        let bbox = raw.expand(options.margin, width, height);
        if !bbox.fits_within(width, height) {
            warn!(
                "Not extracting {} {}: box {} outside the {}x{} page",
                rz.kind(),
                ordinal,
                bbox,
                width,
                height
            );
            outcome.warnings.push(ZoneWarning::OutOfBounds {
                index: zone_index,
                kind: rz.kind().to_string(),
                bbox: raw,
                width,
                height,
            });
            continue;
        }

        let cropped = raster
            .image
            .crop_imm(bbox.x1, bbox.y1, bbox.width(), bbox.height());
        let image = fit_width(cropped, options.max_width);
        debug!(
            "Extracted {} {} from {} → {}x{}",
            rz.kind(),
            ordinal,
            bbox,
            image.width(),
            image.height()
        );

        outcome.crops.push(CroppedRegion {
            ordinal,
            zone_index,
            kind: rz.kind().to_string(),
            caption: rz.text().to_string(),
            bbox,
            image,
            file_stem: file_stem(rz.kind(), ordinal, rz.text()),
        });
    }

    outcome
}

/// Downscale to `max_width` if wider; height is truncated, never below 1.
fn fit_width(img: DynamicImage, max_width: u32) -> DynamicImage {
    if max_width == 0 || img.width() <= max_width {
        return img;
    }
    let ratio = max_width as f64 / img.width() as f64;
    let new_height = ((img.height() as f64 * ratio) as u32).max(1);
    img.resize_exact(max_width, new_height, FilterType::Lanczos3)
}

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());

/// File-name-safe form of a caption: punctuation removed, first 30
/// characters, trimmed, spaces to underscores, lower case.
pub fn sanitize_caption(caption: &str) -> String {
    let cleaned = RE_UNSAFE.replace_all(caption, "");
    let head: String = cleaned.chars().take(30).collect();
    head.trim().replace(' ', "_").to_lowercase()
}

fn file_stem(kind: &str, ordinal: usize, caption: &str) -> String {
    let safe = sanitize_caption(caption);
    if safe.is_empty() {
        format!("{}_{}", kind, ordinal)
    } else {
        format!("{}_{}_{}", kind, ordinal, safe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::Zone;
    use image::{Rgb, RgbImage};

    fn page(w: u32, h: u32) -> PageRaster {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 0]));
        PageRaster::new(1, DynamicImage::ImageRgb8(img))
    }

    fn rz(kind: &str, b: BBox, text: &str) -> ReconciledZone {
        ReconciledZone {
            zone: Zone::new(kind, b, text),
            bbox: b,
        }
    }

    #[test]
    fn crops_pictures_only_by_default() {
        let zones = vec![
            rz("text", BBox::new(0, 0, 50, 50), "t"),
            rz("picture", BBox::new(10, 20, 60, 80), "Figure 1"),
        ];
        let out = crop_regions(&page(200, 200), &zones, &CropOptions::default());
        assert_eq!(out.crops.len(), 1);
        let c = &out.crops[0];
        assert_eq!((c.image.width(), c.image.height()), (50, 60));
        assert_eq!(c.ordinal, 1);
        assert_eq!(c.zone_index, 1);
        assert_eq!(c.file_stem, "picture_1_figure_1");
        assert_eq!(c.image.to_rgb8().get_pixel(0, 0), &Rgb([10, 20, 0]));
    }

    #[test]
    fn reversed_box_is_skipped_with_warning() {
        let zones = vec![
            rz("picture", BBox::new(80, 10, 20, 40), ""),
            rz("picture", BBox::new(10, 10, 40, 40), ""),
        ];
        let out = crop_regions(&page(100, 100), &zones, &CropOptions::default());
        assert_eq!(out.crops.len(), 1);
        assert_eq!(out.crops[0].ordinal, 2);
        assert_eq!(out.crops[0].file_stem, "picture_2");
        assert_eq!(out.warnings.len(), 1);
        assert!(matches!(out.warnings[0], ZoneWarning::Degenerate { index: 0, .. }));
    }

    #[test]
    fn overhanging_box_is_clamped() {
        let zones = vec![rz("picture", BBox::new(50, 50, 150, 90), "")];
        let out = crop_regions(&page(100, 100), &zones, &CropOptions::default());
        assert!(out.warnings.is_empty());
        assert_eq!(out.crops.len(), 1);
        assert_eq!(out.crops[0].bbox, BBox::new(50, 50, 100, 90));
        assert_eq!((out.crops[0].image.width(), out.crops[0].image.height()), (50, 40));
    }

    #[test]
    fn box_entirely_off_page_is_skipped() {
        let zones = vec![
            rz("picture", BBox::new(150, 10, 200, 50), ""),
            rz("picture", BBox::new(10, 120, 50, 160), ""),
        ];
        let out = crop_regions(&page(100, 100), &zones, &CropOptions::default());
        assert!(out.crops.is_empty());
        assert_eq!(out.warnings.len(), 2);
        assert!(matches!(out.warnings[0], ZoneWarning::OutOfBounds { index: 0, .. }));
        assert!(matches!(out.warnings[1], ZoneWarning::OutOfBounds { index: 1, .. }));
    }

    #[test]
    fn margin_is_clamped_to_page() {
        let zones = vec![rz("picture", BBox::new(5, 5, 95, 50), "")];
        let opts = CropOptions {
            margin: 10,
            ..Default::default()
        };
        let out = crop_regions(&page(100, 100), &zones, &opts);
        assert_eq!(out.crops[0].bbox, BBox::new(0, 0, 100, 60));
    }

    #[test]
    fn wide_crops_are_downscaled() {
        let zones = vec![rz("picture", BBox::new(0, 0, 300, 101), "")];
        let opts = CropOptions {
            max_width: 100,
            ..Default::default()
        };
        let out = crop_regions(&page(300, 200), &zones, &opts);
        let img = &out.crops[0].image;
        assert_eq!((img.width(), img.height()), (100, 33));
    }

    #[test]
    fn all_kinds_filter() {
        let zones = vec![
            rz("text", BBox::new(0, 0, 10, 10), ""),
            rz("table", BBox::new(0, 10, 10, 20), ""),
        ];
        let opts = CropOptions {
            kinds: KindFilter::All,
            ..Default::default()
        };
        let out = crop_regions(&page(50, 50), &zones, &opts);
        let stems: Vec<&str> = out.crops.iter().map(|c| c.file_stem.as_str()).collect();
        assert_eq!(stems, vec!["text_1", "table_2"]);
    }

    #[test]
    fn caption_sanitising() {
        assert_eq!(sanitize_caption("Fig. 3: Revenue (2023)"), "fig_3_revenue_2023");
        assert_eq!(sanitize_caption("  spaced  out "), "spaced__out");
        assert_eq!(
            sanitize_caption("A very long caption that keeps going and going"),
            "a_very_long_caption_that_keeps"
        );
        assert_eq!(sanitize_caption("!!!"), "");
    }
}
