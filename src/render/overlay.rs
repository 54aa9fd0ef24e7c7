//! Annotated page images.
//!
//! Each zone gets a coloured outline and a small label with its kind; the
//! page number sits in a badge in the top-left corner. Drawing happens on an
//! RGBA copy of the raster which is converted back to the raster's own pixel
//! format at the end.

use super::palette::Palette;
use super::PageRaster;
use crate::error::ZoneWarning;
use crate::zone::{BBox, ReconciledZone};
use ab_glyph::{FontRef, PxScale};
use image::{ColorType, DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

static FONT: Lazy<Option<FontRef<'static>>> = Lazy::new(|| {
    match FontRef::try_from_slice(include_bytes!("../../assets/DejaVuSansMono.ttf")) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Embedded label font failed to load, labels will be drawn without text: {}", e);
            None
        }
    }
});

const LABEL_HEIGHT: u32 = 20;
const LABEL_CHAR_WIDTH: u32 = 7;
const LABEL_PADDING: u32 = 6;
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Drawing options for [`draw_overlay`].
#[derive(Debug, Clone)]
pub struct OverlayOptions {
    pub palette: Palette,
    /// Outline width in pixels, drawn inwards. Default: 2.
    pub line_thickness: u32,
    /// Draw the kind label at each zone's top-left corner. Default: true.
    pub labels: bool,
    /// Draw the "Page N" badge. Default: true.
    pub page_badge: bool,
    /// Label font size in pixels. Default: 12.
    pub font_size: f32,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            line_thickness: 2,
            labels: true,
            page_badge: true,
            font_size: 12.0,
        }
    }
}

/// An annotated copy of the page plus the zones that could not be drawn.
#[derive(Debug, Clone)]
pub struct OverlayOutcome {
    pub image: DynamicImage,
    pub warnings: Vec<ZoneWarning>,
    /// Number of zones actually drawn.
    pub drawn: usize,
}

/// Draw `zones` over a copy of `raster`.
///
/// Degenerate boxes are skipped. Boxes partly outside the page are clamped;
/// boxes entirely outside are skipped. Both cases are reported as warnings
/// indexed by position in `zones`. The output is a pure function of the
/// inputs.
pub fn draw_overlay(
    raster: &PageRaster,
    zones: &[ReconciledZone],
    options: &OverlayOptions,
) -> OverlayOutcome {
    let mut image = raster.image.to_rgba8();
    let (width, height) = image.dimensions();
    let mut warnings = Vec::new();
    let mut drawn = 0;

    for (index, rz) in zones.iter().enumerate() {
        let bbox = rz.bbox;
        if bbox.is_degenerate() {
            warn!("Skipping zone {} ({}): degenerate box {}", index, rz.kind(), bbox);
            warnings.push(ZoneWarning::Degenerate {
                index,
                kind: rz.kind().to_string(),
                bbox,
            });
            continue;
        }

        let clamped = bbox.clamp_to(width, height);
        if clamped.is_degenerate() {
            warn!(
                "Skipping zone {} ({}): box {} is outside the {}x{} page",
                index,
                rz.kind(),
                bbox,
                width,
                height
            );
            warnings.push(ZoneWarning::OutOfBounds {
                index,
                kind: rz.kind().to_string(),
                bbox,
                width,
                height,
            });
            continue;
        }
        if clamped != bbox {
            debug!("Zone {} clamped from {} to {}", index, bbox, clamped);
        }

        let color = options.palette.color_for(rz.kind());
        draw_outline(&mut image, clamped, options.line_thickness, color);
        if options.labels {
            draw_label(&mut image, clamped, rz.kind(), color, options.font_size);
        }
        drawn += 1;
    }

    if options.page_badge {
        draw_page_badge(&mut image, raster.page_num, options.font_size);
    }

    debug!(
        "Overlay for page {}: {} zones drawn, {} skipped",
        raster.page_num,
        drawn,
        warnings.len()
    );
    OverlayOutcome {
        image: restore_color_type(image, raster.image.color()),
        warnings,
        drawn,
    }
}

fn draw_outline(image: &mut RgbaImage, b: BBox, thickness: u32, color: Rgba<u8>) {
    let (w, h) = (b.width(), b.height());
    for t in 0..thickness.max(1) {
        let inner_w = w.saturating_sub(2 * t);
        let inner_h = h.saturating_sub(2 * t);
        if inner_w == 0 || inner_h == 0 {
            break;
        }
        let rect = Rect::at((b.x1 + t) as i32, (b.y1 + t) as i32).of_size(inner_w, inner_h);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// White box with a coloured border and the kind in the zone colour.
///
/// Kept inside the page even for zones hugging the right or bottom edge.
fn draw_label(image: &mut RgbaImage, b: BBox, kind: &str, color: Rgba<u8>, font_size: f32) {
    let label_w = kind.chars().count() as u32 * LABEL_CHAR_WIDTH + LABEL_PADDING;
    let label_x = b.x1.min(image.width().saturating_sub(label_w)) as i32;
    let label_y = b.y1.min(image.height().saturating_sub(LABEL_HEIGHT)) as i32;

    let rect = Rect::at(label_x, label_y).of_size(label_w, LABEL_HEIGHT);
    draw_filled_rect_mut(image, rect, WHITE);
    draw_hollow_rect_mut(image, rect, color);

    if let Some(font) = FONT.as_ref() {
        draw_text_mut(
            image,
            color,
            label_x + 3,
            label_y + 3,
            PxScale::from(font_size),
            font,
            kind,
        );
    }
}

fn draw_page_badge(image: &mut RgbaImage, page_num: usize, font_size: f32) {
    let rect = Rect::at(10, 10).of_size(91, 31);
    draw_filled_rect_mut(image, rect, BLACK);
    draw_hollow_rect_mut(image, rect, WHITE);
    if let Some(font) = FONT.as_ref() {
        draw_text_mut(
            image,
            WHITE,
            15,
            15,
            PxScale::from(font_size + 2.0),
            font,
            &format!("Page {}", page_num),
        );
    }
}

fn restore_color_type(canvas: RgbaImage, color: ColorType) -> DynamicImage {
    let rgba = DynamicImage::ImageRgba8(canvas);
    match color {
        ColorType::L8 => DynamicImage::ImageLuma8(rgba.to_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(rgba.to_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(rgba.to_rgb8()),
        ColorType::L16 => DynamicImage::ImageLuma16(rgba.to_luma16()),
        ColorType::La16 => DynamicImage::ImageLumaA16(rgba.to_luma_alpha16()),
        ColorType::Rgb16 => DynamicImage::ImageRgb16(rgba.to_rgb16()),
        ColorType::Rgba16 => DynamicImage::ImageRgba16(rgba.to_rgba16()),
        ColorType::Rgb32F => DynamicImage::ImageRgb32F(rgba.to_rgb32f()),
        ColorType::Rgba32F => DynamicImage::ImageRgba32F(rgba.to_rgba32f()),
        _ => rgba,
    }
}

// ── Fallback image ───────────────────────────────────────────────────────────

const PLACEHOLDER_SIZE: (u32, u32) = (800, 600);

/// Stand-in raster for a page that could not be rendered: light grey with
/// a border, a shaded panel, the page number and "Preview Unavailable".
pub fn placeholder_raster(page_num: usize) -> PageRaster {
    let (w, h) = PLACEHOLDER_SIZE;
    let mut img = RgbImage::from_pixel(w, h, Rgb([250, 250, 250]));

    for t in 0..2 {
        let rect = Rect::at(10 + t, 10 + t).of_size(w - 20 - 2 * t as u32, h - 20 - 2 * t as u32);
        draw_hollow_rect_mut(&mut img, rect, Rgb([100, 100, 100]));
    }

    for y in 50..550u32 {
        let shade = (200.0 + (y - 50) as f32 * 0.1) as u8;
        draw_line_segment_mut(
            &mut img,
            (50.0, y as f32),
            (750.0, y as f32),
            Rgb([shade, shade, shade]),
        );
    }

    if let Some(font) = FONT.as_ref() {
        let centred = |img: &mut RgbImage, y: i32, size: f32, text: &str, grey: u8| {
            let scale = PxScale::from(size);
            let (tw, th) = text_size(scale, font, text);
            let x = w as i32 / 2 - tw as i32 / 2;
            draw_text_mut(img, Rgb([grey, grey, grey]), x, y - th as i32 / 2, scale, font, text);
        };
        centred(&mut img, 100, 32.0, &format!("Page {}", page_num), 50);
        centred(&mut img, 250, 24.0, "Preview Unavailable", 80);
    }

    PageRaster::new(page_num, DynamicImage::ImageRgb8(img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::Zone;
    use image::GenericImageView;

    fn raster(w: u32, h: u32) -> PageRaster {
        PageRaster::new(
            1,
            DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))),
        )
    }

    fn rz(kind: &str, b: BBox) -> ReconciledZone {
        ReconciledZone {
            zone: Zone::new(kind, b, ""),
            bbox: b,
        }
    }

    #[test]
    fn overlay_is_deterministic() {
        let page = raster(400, 300);
        let zones = vec![
            rz("text", BBox::new(50, 60, 300, 120)),
            rz("picture", BBox::new(20, 150, 380, 290)),
        ];
        let opts = OverlayOptions::default();
        let a = draw_overlay(&page, &zones, &opts);
        let b = draw_overlay(&page, &zones, &opts);
        assert_eq!(a.image.as_bytes(), b.image.as_bytes());
        assert_eq!(a.drawn, 2);
    }

    #[test]
    fn input_raster_untouched() {
        let page = raster(200, 200);
        let before = page.image.as_bytes().to_vec();
        let out = draw_overlay(&page, &[rz("text", BBox::new(20, 20, 180, 180))], &OverlayOptions::default());
        assert_eq!(page.image.as_bytes(), &before[..]);
        assert_ne!(out.image.as_bytes(), &before[..]);
    }

    #[test]
    fn keeps_pixel_format_and_size() {
        let page = raster(120, 80);
        let out = draw_overlay(&page, &[], &OverlayOptions::default());
        assert_eq!(out.image.color(), page.image.color());
        assert_eq!(out.image.dimensions(), (120, 80));
    }

    #[test]
    fn outline_uses_zone_colour() {
        let page = raster(200, 200);
        let opts = OverlayOptions {
            labels: false,
            page_badge: false,
            ..Default::default()
        };
        let out = draw_overlay(&page, &[rz("picture", BBox::new(50, 50, 150, 150))], &opts);
        let rgb = out.image.to_rgb8();
        assert_eq!(rgb.get_pixel(100, 50), &Rgb([76, 175, 80]));
        assert_eq!(rgb.get_pixel(100, 51), &Rgb([76, 175, 80]));
        assert_eq!(rgb.get_pixel(100, 52), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(100, 100), &Rgb([255, 255, 255]));
    }

    #[test]
    fn degenerate_and_outside_boxes_are_reported() {
        let page = raster(100, 100);
        let zones = vec![
            rz("text", BBox::new(60, 10, 20, 40)),
            rz("text", BBox::new(10, 10, 90, 90)),
            rz("picture", BBox::new(150, 150, 200, 200)),
        ];
        let out = draw_overlay(&page, &zones, &OverlayOptions::default());
        assert_eq!(out.drawn, 1);
        assert_eq!(out.warnings.len(), 2);
        assert!(matches!(out.warnings[0], ZoneWarning::Degenerate { index: 0, .. }));
        assert!(matches!(out.warnings[1], ZoneWarning::OutOfBounds { index: 2, .. }));
    }

    #[test]
    fn partly_outside_box_is_clamped() {
        let page = raster(100, 100);
        let opts = OverlayOptions {
            labels: false,
            page_badge: false,
            ..Default::default()
        };
        let out = draw_overlay(&page, &[rz("table", BBox::new(50, 50, 400, 400))], &opts);
        assert!(out.warnings.is_empty());
        let rgb = out.image.to_rgb8();
        assert_eq!(rgb.get_pixel(99, 75), &Rgb([156, 39, 176]));
    }

    #[test]
    fn label_near_bottom_edge_stays_on_page() {
        let page = PageRaster::new(
            1,
            DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([128, 128, 128]))),
        );
        let opts = OverlayOptions {
            page_badge: false,
            ..Default::default()
        };
        let out = draw_overlay(&page, &[rz("picture", BBox::new(100, 92, 180, 99))], &opts);
        let rgb = out.image.to_rgb8();
        let green = Rgb([76, 175, 80]);
        // The 20 px label is lifted to rows 80..100.
        assert_eq!(rgb.get_pixel(120, 80), &green);
        assert_eq!(rgb.get_pixel(100, 85), &green);
        assert_eq!(rgb.get_pixel(101, 81), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(120, 79), &Rgb([128, 128, 128]));
    }

    #[test]
    fn page_badge_is_black() {
        let out = draw_overlay(&raster(200, 100), &[], &OverlayOptions::default());
        let rgb = out.image.to_rgb8();
        assert_eq!(rgb.get_pixel(10, 10), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(12, 38), &Rgb([0, 0, 0]));
    }

    #[test]
    fn placeholder_has_fixed_size() {
        let p = placeholder_raster(7);
        assert_eq!(p.dimensions(), (800, 600));
        assert_eq!(p.page_num, 7);
        let rgb = p.image.to_rgb8();
        assert_eq!(rgb.get_pixel(2, 2), &Rgb([250, 250, 250]));
        assert_eq!(rgb.get_pixel(10, 300), &Rgb([100, 100, 100]));
    }
}
