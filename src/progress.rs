//! Progress events for page analysis.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`]. Pages are
//! processed concurrently, so implementations must be `Send + Sync` and
//! protect shared state themselves.
//!
//! # Example
//!
//! ```rust
//! use doctags_zones::{AnalysisProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ZoneCounter(AtomicUsize);
//!
//! impl AnalysisProgressCallback for ZoneCounter {
//!     fn on_page_complete(&self, _page: usize, _total: usize, zones: usize) {
//!         self.0.fetch_add(zones, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(ZoneCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page. Every method is a no-op
/// by default.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Once, after page selection, before any VLM call.
    fn on_analysis_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Just before the VLM request for a page is sent.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// A page produced DocTags and was reconciled.
    ///
    /// `zone_count` is the number of zones parsed (0 for a blank page).
    fn on_page_complete(&self, page_num: usize, total_pages: usize, zone_count: usize) {
        let _ = (page_num, total_pages, zone_count);
    }

    /// A page failed after all retries.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Once, after every page has been attempted.
    fn on_analysis_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
