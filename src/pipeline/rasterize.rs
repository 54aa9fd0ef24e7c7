//! Page rasterisation: PDF pages through pdfium, image inputs decoded directly.
//!
//! pdfium wraps a C++ library with thread-local state and is not safe to
//! call from async contexts, so all work runs inside `spawn_blocking`.
//! `max_rendered_pixels` caps either dimension independently of the DPI,
//! keeping memory bounded on poster-sized pages.

use super::input::{InputKind, ResolvedInput};
use crate::config::PipelineConfig;
use crate::error::{DocTagsError, PageError};
use crate::output::DocumentInfo;
use crate::render::PageRaster;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A rendered page, or why it could not be rendered.
pub type RenderedPage = Result<PageRaster, PageError>;

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, DocTagsError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        if !path.is_empty() {
            return Pdfium::bind_to_library(Path::new(&path))
                .map(Pdfium::new)
                .map_err(|e| DocTagsError::PdfiumBindingFailed(format!("{}: {}", path, e)));
        }
    }
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| DocTagsError::PdfiumBindingFailed(e.to_string()))
}

/// Rasterise the selected pages of `input`.
///
/// Document-level failures (unreadable PDF, wrong password, nothing
/// selected) are fatal; a single page that fails to render is returned as a
/// [`PageError::RenderFailed`] so the other pages still go through.
pub async fn load_pages(
    input: &ResolvedInput,
    config: &PipelineConfig,
) -> Result<Vec<RenderedPage>, DocTagsError> {
    let path = input.path().to_path_buf();
    match input.kind() {
        InputKind::Pdf => {
            let dpi = config.dpi;
            let max_pixels = config.max_rendered_pixels;
            let password = config.password.clone();
            let selection = config.pages.clone();
            tokio::task::spawn_blocking(move || {
                render_pdf_blocking(&path, dpi, max_pixels, password.as_deref(), |total| {
                    selection.to_indices(total)
                })
            })
            .await
            .map_err(|e| DocTagsError::Internal(format!("Render task panicked: {}", e)))?
        }
        InputKind::Image => {
            if config.pages.to_indices(1).is_empty() {
                return Err(DocTagsError::PageOutOfRange { page: 0, total: 1 });
            }
            let raster = tokio::task::spawn_blocking(move || load_image_page(&path))
                .await
                .map_err(|e| DocTagsError::Internal(format!("Decode task panicked: {}", e)))??;
            Ok(vec![Ok(raster)])
        }
    }
}

/// Decode a PNG/JPEG scan as page 1.
pub fn load_image_page(path: &Path) -> Result<PageRaster, DocTagsError> {
    let image = image::open(path).map_err(|source| DocTagsError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        "Loaded image {} → {}x{} px",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(PageRaster::new(1, image))
}

/// Render one PDF page (1-based) synchronously.
///
/// Used by the CLI subcommands that work on a single page.
pub fn render_pdf_page(
    path: &Path,
    page_num: usize,
    config: &PipelineConfig,
) -> Result<PageRaster, DocTagsError> {
    let mut pages = render_pdf_blocking(
        path,
        config.dpi,
        config.max_rendered_pixels,
        config.password.as_deref(),
        |total| {
            if page_num >= 1 && page_num <= total {
                vec![page_num - 1]
            } else {
                Vec::new()
            }
        },
    )?;
    match pages.pop() {
        Some(Ok(raster)) => Ok(raster),
        Some(Err(e)) => Err(DocTagsError::RasterisationFailed {
            page: page_num,
            detail: e.to_string(),
        }),
        None => Err(DocTagsError::Internal("no page rendered".into())),
    }
}

fn open_error(path: &Path, password: Option<&str>, e: PdfiumError) -> DocTagsError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            DocTagsError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            DocTagsError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        DocTagsError::CorruptPdf {
            path: path.to_path_buf(),
            detail,
        }
    }
}

fn render_pdf_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    select: impl FnOnce(usize) -> Vec<usize>,
) -> Result<Vec<RenderedPage>, DocTagsError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| open_error(pdf_path, password, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let indices = select(total_pages);
    if indices.is_empty() {
        return Err(DocTagsError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(indices.len());
    for idx in indices {
        let page_num = idx + 1;
        let rendered = pages
            .get(idx as u16)
            .and_then(|page| {
                page.render_with_config(&render_config)
                    .map(|bitmap| bitmap.as_image())
            })
            .map_err(|e| PageError::RenderFailed {
                page: page_num,
                detail: format!("{:?}", e),
            });

        match rendered {
            Ok(image) => {
                debug!(
                    "Rendered page {} → {}x{} px",
                    page_num,
                    image.width(),
                    image.height()
                );
                results.push(Ok(PageRaster::new(page_num, image)));
            }
            Err(e) => {
                warn!("{}", e);
                results.push(Err(e));
            }
        }
    }

    Ok(results)
}

/// Page count and sizes without rendering anything.
pub async fn inspect_input(
    input: &ResolvedInput,
    password: Option<&str>,
) -> Result<DocumentInfo, DocTagsError> {
    let path: PathBuf = input.path().to_path_buf();
    match input.kind() {
        InputKind::Pdf => {
            let pwd = password.map(str::to_string);
            tokio::task::spawn_blocking(move || inspect_pdf_blocking(&path, pwd.as_deref()))
                .await
                .map_err(|e| DocTagsError::Internal(format!("Inspect task panicked: {}", e)))?
        }
        InputKind::Image => {
            let (w, h) = image::image_dimensions(&path).map_err(|source| {
                DocTagsError::ImageDecode {
                    path: path.clone(),
                    source,
                }
            })?;
            Ok(DocumentInfo {
                kind: "image".into(),
                page_count: 1,
                page_sizes: vec![(w as f32, h as f32)],
                ..Default::default()
            })
        }
    }
}

fn inspect_pdf_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentInfo, DocTagsError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| open_error(pdf_path, password, e))?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    let page_sizes = document
        .pages()
        .iter()
        .map(|p| (p.width().value, p.height().value))
        .collect::<Vec<_>>();

    Ok(DocumentInfo {
        kind: "pdf".into(),
        page_count: page_sizes.len(),
        page_sizes,
        title: get_meta(PdfDocumentMetadataTagType::Title),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        pdf_version: Some(format!("{:?}", document.version())),
    })
}
