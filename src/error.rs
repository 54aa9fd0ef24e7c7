//! Error types for the doctags-zones library.
//!
//! Three levels of failure, from most to least severe:
//!
//! * [`DocTagsError`]: **Fatal**: the operation cannot proceed at all
//!   (no `<doctag>` wrapper, missing input file, pdfium unavailable).
//!   Returned as `Err(DocTagsError)` from parsing and the pipeline entry points.
//!
//! * [`PageError`]: **Non-fatal, per page**: one page failed (render glitch,
//!   VLM error, unparseable output) while the other pages are fine. Stored in
//!   [`crate::output::PageAnalysis`].
//!
//! * [`ZoneWarning`]: **Non-fatal, per zone**: a single zone has an unusable
//!   box after reconciliation. The renderer skips it and carries on.

use crate::zone::BBox;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doctags-zones library.
#[derive(Debug, Error)]
pub enum DocTagsError {
    // ── DocTags errors ────────────────────────────────────────────────────
    /// The DocTags text is empty or whitespace only.
    #[error("DocTags document is empty")]
    EmptyDocument,

    /// No `<doctag>` … `</doctag>` wrapper was found.
    #[error("No <doctag> wrapper found in DocTags document")]
    MalformedDocument,

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The file is neither a PDF nor a supported raster image.
    #[error("Unsupported input '{path}': expected a PDF, PNG or JPEG file\nFirst bytes: {magic:?}")]
    UnsupportedInput { path: PathBuf, magic: [u8; 4] },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── PDF / raster errors ───────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the binary."
    )]
    PdfiumBindingFailed(String),

    /// A raster image input could not be decoded or encoded.
    #[error("Image error for '{path}': {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page failed; there is nothing to report.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// LLM call failed after retries.
    #[error("Page {page}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// LLM call timed out.
    #[error("Page {page}: LLM call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The model answered, but not with a DocTags document.
    #[error("Page {page}: model output is not DocTags: {detail}")]
    Unparseable { page: usize, detail: String },
}

impl PageError {
    /// 1-based page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::LlmFailed { page, .. }
            | PageError::Timeout { page, .. }
            | PageError::Unparseable { page, .. } => *page,
        }
    }
}

/// A single zone that could not be drawn or cropped.
///
/// Reported alongside render output; never aborts the page.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneWarning {
    /// The box has no positive area (`x1 >= x2` or `y1 >= y2`).
    #[error("zone {index} ({kind}) has a degenerate box {bbox}")]
    Degenerate {
        index: usize,
        kind: String,
        bbox: BBox,
    },

    /// The box lies outside the page raster.
    #[error("zone {index} ({kind}) box {bbox} is outside the {width}x{height} page")]
    OutOfBounds {
        index: usize,
        kind: String,
        bbox: BBox,
        width: u32,
        height: u32,
    },
}

impl ZoneWarning {
    /// Index of the offending zone in the list passed to the renderer.
    pub fn index(&self) -> usize {
        match self {
            ZoneWarning::Degenerate { index, .. } | ZoneWarning::OutOfBounds { index, .. } => {
                *index
            }
        }
    }
}
