//! Image encoding: page raster → base64 PNG wrapped in `ImageData`.
//!
//! PNG keeps rendered glyph edges intact, which matters more than payload
//! size when the model has to read fine print and emit coordinates.

use crate::error::PageError;
use crate::render::PageRaster;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a page raster as a base64 PNG ready for the VLM request.
///
/// `detail: "high"` asks tiling providers for the full image budget so small
/// labels and table cells stay legible.
pub fn encode_page(raster: &PageRaster) -> Result<ImageData, PageError> {
    let b64 = encode_png_base64(&raster.image).map_err(|e| PageError::RenderFailed {
        page: raster.page_num,
        detail: format!("PNG encoding failed: {}", e),
    })?;
    debug!("Page {}: encoded {} bytes base64", raster.page_num, b64.len());
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

fn encode_png_base64(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(STANDARD.encode(&buf))
}
