//! Configuration for the page-analysis pipeline.
//!
//! Every knob lives in [`PipelineConfig`], built via [`PipelineConfigBuilder`].
//! The pure stages (parse, reconcile, render) take their own option structs;
//! the config simply carries one of each so a whole run is described by a
//! single value.

use crate::error::DocTagsError;
use crate::progress::ProgressCallback;
use crate::prompts::DEFAULT_DOCTAGS_PROMPT;
use crate::reconcile::ReconcileOptions;
use crate::render::{CropOptions, KindFilter, OverlayOptions};
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for [`crate::analyze::analyze`] and friends.
///
/// # Example
/// ```rust
/// use doctags_zones::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(150)
///     .concurrency(2)
///     .model("granite-docling")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Rendering DPI for PDF pages. Range: 72–600. Default: 200.
    ///
    /// DocTags models are trained on renders around 200 DPI; coordinates
    /// reconcile against whatever size is actually produced.
    pub dpi: u32,

    /// Cap on either rendered dimension in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Pages to analyse. Default: all.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Coordinate reconciliation constants.
    pub reconcile: ReconcileOptions,

    /// Overlay drawing options.
    pub overlay: OverlayOptions,

    /// Region extraction options.
    pub crop: CropOptions,

    /// Number of concurrent VLM calls. Default: 4.
    pub concurrency: usize,

    /// Model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0; DocTags output must be reproducible.
    pub temperature: f32,

    /// Maximum generated tokens per page. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a failed VLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-VLM-call timeout in seconds. Default: 300.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Instruction sent with every page image.
    pub prompt: String,

    /// Receives per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 4000,
            pages: PageSelection::default(),
            password: None,
            reconcile: ReconcileOptions::default(),
            overlay: OverlayOptions::default(),
            crop: CropOptions::default(),
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 300,
            download_timeout_secs: 120,
            prompt: DEFAULT_DOCTAGS_PROMPT.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("reconcile", &self.reconcile)
            .field("crop", &self.crop)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`]. Setters clamp; [`build`](Self::build) validates.
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn reconcile(mut self, options: ReconcileOptions) -> Self {
        self.config.reconcile = options;
        self
    }

    /// Toggle the heuristic scale guess for coordinates outside the grid.
    pub fn auto_adjust(mut self, enabled: bool) -> Self {
        self.config.reconcile.auto_adjust = enabled;
        self
    }

    pub fn manual_scale(mut self, x: f64, y: f64) -> Self {
        self.config.reconcile.manual_scale = Some((x, y));
        self
    }

    pub fn grid_size(mut self, size: u32) -> Self {
        self.config.reconcile.grid_size = size;
        self
    }

    pub fn overlay(mut self, options: OverlayOptions) -> Self {
        self.config.overlay = options;
        self
    }

    pub fn crop_kinds(mut self, kinds: KindFilter) -> Self {
        self.config.crop.kinds = kinds;
        self
    }

    pub fn crop_max_width(mut self, px: u32) -> Self {
        self.config.crop.max_width = px.max(1);
        self
    }

    pub fn crop_margin(mut self, px: u32) -> Self {
        self.config.crop.margin = px;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = prompt.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DocTagsError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(DocTagsError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(DocTagsError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.reconcile.grid_size == 0 {
            return Err(DocTagsError::InvalidConfig("Grid size must be ≥ 1".into()));
        }
        if let Some((x, y)) = c.reconcile.manual_scale {
            if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
                return Err(DocTagsError::InvalidConfig(format!(
                    "Manual scale must be positive, got x={}, y={}",
                    x, y
                )));
            }
        }
        if c.reconcile.aggressive_ratio <= 1.0 {
            return Err(DocTagsError::InvalidConfig(format!(
                "Aggressive ratio must be > 1, got {}",
                c.reconcile.aggressive_ratio
            )));
        }
        if c.prompt.trim().is_empty() {
            return Err(DocTagsError::InvalidConfig("Prompt must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Page selection ───────────────────────────────────────────────────────────

/// Which pages of a PDF to analyse. Image inputs always have one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Parse the CLI forms `all`, `3`, `2-5` and `1,4,9`.
    pub fn parse(s: &str) -> Result<Self, DocTagsError> {
        let s = s.trim();
        let bad = || DocTagsError::InvalidConfig(format!("Invalid page selection '{}'", s));
        if s.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }
        if let Some((a, b)) = s.split_once('-') {
            let start = a.trim().parse().map_err(|_| bad())?;
            let end = b.trim().parse().map_err(|_| bad())?;
            return Ok(PageSelection::Range(start, end));
        }
        if s.contains(',') {
            let pages = s
                .split(',')
                .map(|p| p.trim().parse::<usize>().map_err(|_| bad()))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }
        s.parse().map(PageSelection::Single).map_err(|_| bad())
    }
}
