//! Output types returned by the analysis pipeline.

use crate::error::PageError;
use crate::reconcile::ReconciliationResult;
use crate::render::{CroppedRegion, PageReport};
use crate::zone::ReconciledZone;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Everything derived from one page raster and its DocTags.
#[derive(Debug, Clone)]
pub struct PageArtifacts {
    /// DocTags parse failure, if any. The page then has zero zones and a
    /// blank overlay.
    pub parse_error: Option<String>,
    pub reconciliation: ReconciliationResult,
    /// Annotated page image.
    pub overlay: DynamicImage,
    pub crops: Vec<CroppedRegion>,
    pub report: PageReport,
    pub markdown: String,
}

impl PageArtifacts {
    pub fn zones(&self) -> &[ReconciledZone] {
        &self.reconciliation.zones
    }

    pub fn uncertain_geometry(&self) -> bool {
        self.reconciliation.is_uncertain()
    }
}

/// Result of analysing one page.
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    /// 1-based page number.
    pub page_num: usize,
    /// DocTags as returned by the model (after response cleanup). Empty when
    /// the model was never reached.
    pub doctags: String,
    /// `None` when rendering or the VLM call failed.
    pub artifacts: Option<PageArtifacts>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u8,
    pub error: Option<PageError>,
}

impl PageAnalysis {
    pub(crate) fn failed(page_num: usize, error: PageError) -> Self {
        Self {
            page_num,
            doctags: String::new(),
            artifacts: None,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: Some(error),
        }
    }

    pub fn zone_count(&self) -> usize {
        self.artifacts.as_ref().map_or(0, |a| a.zones().len())
    }
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages that produced artifacts.
    pub processed_pages: usize,
    /// Pages that failed to render or to get a VLM answer.
    pub failed_pages: usize,
    /// Processed pages whose DocTags could not be parsed.
    pub unparseable_pages: usize,
    /// Processed pages reconciled with a guessed scale.
    pub uncertain_pages: usize,
    pub total_zones: usize,
    pub total_crops: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub llm_duration_ms: u64,
}

/// Output of [`crate::analyze::analyze`]: one entry per selected page, in page order.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    /// Input file stem, used to name artifacts.
    pub source_stem: String,
    pub pages: Vec<PageAnalysis>,
    pub stats: AnalysisStats,
}

/// What [`crate::analyze::inspect`] reports about a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// `"pdf"` or `"image"`.
    pub kind: String,
    pub page_count: usize,
    /// Page sizes in PostScript points for PDFs, pixels for images.
    pub page_sizes: Vec<(f32, f32)>,
    pub title: Option<String>,
    pub producer: Option<String>,
    pub pdf_version: Option<String>,
}
