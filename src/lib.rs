//! # doctags-zones
//!
//! Turn DocTags page descriptions into boxes on the page: parse the zones a
//! vision-language model emits, reconcile their coordinates with the real
//! page raster, then draw overlays, cut out regions and export Markdown.
//!
//! ## Why reconciliation?
//!
//! DocTags-native models emit `<loc_N>` values on a 0–500 grid, but general
//! VLMs asked for DocTags often answer in raw pixels or PDF points of some
//! page size they imagined. [`reconcile`] picks one mapping per page, reports
//! which, and flags guessed geometry as uncertain rather than silently
//! producing wrong boxes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image / URL
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Rasterise  pdfium (spawn_blocking) or image decode
//!  ├─ 3. VLM        concurrent DocTags requests with retry
//!  ├─ 4. Parse      <doctag> text → zones in reading order
//!  ├─ 5. Reconcile  grid / heuristic / manual scale → page pixels
//!  └─ 6. Render     overlay PNG, region crops, JSON report, Markdown
//! ```
//!
//! Steps 4–6 are synchronous pure functions and work without a model, on
//! DocTags you already have:
//!
//! ```rust
//! use doctags_zones::{parse, reconcile, ScaleStrategy};
//!
//! let zones = parse("<doctag><text><loc_10><loc_10><loc_100><loc_50>Hello</text></doctag>")?;
//! let result = reconcile(&zones, 1000, 1000);
//! assert_eq!(result.strategy, ScaleStrategy::NormalizedGrid);
//! assert_eq!(result.zones[0].bbox.x2, 200);
//! # Ok::<(), doctags_zones::DocTagsError>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doctags` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod doctags;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod reconcile;
pub mod render;
pub mod zone;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_sync, inspect, process_page, write_crops, write_page_artifacts};
pub use config::{PageSelection, PipelineConfig, PipelineConfigBuilder};
pub use doctags::{
    apply_affine_fix, coordinate_stats, parse, suggest_factors, to_markdown, AffineFix,
    CoordinateRegime, CoordinateStats, FactorSuggestion,
};
pub use error::{DocTagsError, PageError, ZoneWarning};
pub use output::{AnalysisOutput, AnalysisStats, DocumentInfo, PageAnalysis, PageArtifacts};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reconcile::{reconcile, reconcile_with, ReconcileOptions, ReconciliationResult, ScaleStrategy};
pub use render::{
    crop_regions, draw_overlay, placeholder_raster, CropOptions, CroppedRegion, KindFilter,
    OverlayOptions, PageRaster, PageReport, Palette,
};
pub use zone::{sort_reading_order, BBox, ReconciledZone, Zone};
