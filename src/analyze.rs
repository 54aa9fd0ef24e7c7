//! Document analysis entry points.
//!
//! [`analyze`] drives the whole pipeline: resolve the input, rasterise the
//! selected pages, ask the VLM for DocTags concurrently, then turn each
//! answer into zones, an overlay, crops, a JSON report and Markdown via
//! [`process_page`]. Every page is reported, failed ones included; only
//! document-level problems abort the run.

use crate::config::PipelineConfig;
use crate::doctags::{parse, to_markdown};
use crate::error::{DocTagsError, PageError};
use crate::output::{AnalysisOutput, AnalysisStats, DocumentInfo, PageAnalysis, PageArtifacts};
use crate::pipeline::{encode, input, llm, rasterize};
use crate::reconcile::reconcile_with;
use crate::render::{crop_regions, draw_overlay, placeholder_raster, PageRaster, PageReport};
use crate::zone::sort_reading_order;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Analyse a PDF, image, or URL.
///
/// # Returns
/// `Ok(AnalysisOutput)` as long as at least one page produced DocTags, even
/// if others failed (see `output.stats.failed_pages`). Pages whose DocTags
/// cannot be parsed still count as processed: they get zero zones and a
/// blank overlay.
///
/// # Errors
/// Fatal problems only: unreadable or unsupported input, no provider, an
/// empty page selection, or every page failing.
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<AnalysisOutput, DocTagsError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let source_stem = resolved.stem();

    // ── Step 2: Get/create provider ──────────────────────────────────────
    let provider = resolve_provider(config).await?;

    // ── Step 3: Rasterise pages ──────────────────────────────────────────
    let render_start = Instant::now();
    let rendered = rasterize::load_pages(&resolved, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    let selected = rendered.len();
    info!("Rasterised {} pages in {}ms", selected, render_duration_ms);

    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_start(selected);
    }

    // ── Step 4: Encode; render failures are reported per page ────────────
    let mut pages: Vec<PageAnalysis> = Vec::with_capacity(selected);
    let mut ready = Vec::with_capacity(selected);
    for page in rendered {
        match page.and_then(|raster| encode::encode_page(&raster).map(|img| (raster, img))) {
            Ok(pair) => ready.push(pair),
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(e.page(), selected, &e.to_string());
                }
                pages.push(PageAnalysis::failed(e.page(), e));
            }
        }
    }

    // ── Step 5: VLM calls, bounded concurrency ───────────────────────────
    let llm_start = Instant::now();
    let replies: Vec<_> = stream::iter(ready.into_iter().map(|(raster, image_data)| {
        let provider = Arc::clone(&provider);
        async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(raster.page_num, selected);
            }
            let reply =
                llm::request_doctags(&provider, raster.page_num, image_data, config).await;
            (raster, reply)
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // ── Step 6: Zones, overlay, crops, report ────────────────────────────
    for (raster, reply) in replies {
        let page_num = raster.page_num;
        match reply {
            Ok(reply) => {
                let artifacts = process_page(&raster, &reply.doctags, config, &source_stem);
                let error = artifacts.parse_error.as_ref().map(|detail| PageError::Unparseable {
                    page: page_num,
                    detail: detail.clone(),
                });
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_complete(page_num, selected, artifacts.zones().len());
                }
                pages.push(PageAnalysis {
                    page_num,
                    doctags: reply.doctags,
                    artifacts: Some(artifacts),
                    input_tokens: reply.input_tokens,
                    output_tokens: reply.output_tokens,
                    duration_ms: reply.duration_ms,
                    retries: reply.retries,
                    error,
                });
            }
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(page_num, selected, &e.to_string());
                }
                pages.push(PageAnalysis::failed(page_num, e));
            }
        }
    }

    pages.sort_by_key(|p| p.page_num);

    // ── Step 7: Stats ────────────────────────────────────────────────────
    let processed = pages.iter().filter(|p| p.artifacts.is_some()).count();
    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(DocTagsError::AllPagesFailed {
            total: pages.len(),
            first_error,
        });
    }

    let artifacts = || pages.iter().filter_map(|p| p.artifacts.as_ref());
    let stats = AnalysisStats {
        total_pages: selected,
        processed_pages: processed,
        failed_pages: selected - processed,
        unparseable_pages: artifacts().filter(|a| a.parse_error.is_some()).count(),
        uncertain_pages: artifacts().filter(|a| a.uncertain_geometry()).count(),
        total_zones: artifacts().map(|a| a.zones().len()).sum(),
        total_crops: artifacts().map(|a| a.crops.len()).sum(),
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        llm_duration_ms,
    };

    info!(
        "Analysis complete: {}/{} pages, {} zones, {}ms total",
        processed, selected, stats.total_zones, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_complete(selected, processed);
    }

    Ok(AnalysisOutput {
        source_stem,
        pages,
        stats,
    })
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<AnalysisOutput, DocTagsError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocTagsError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, config))
}

/// Page count and dimensions without rendering or calling a model.
///
/// `download_timeout_secs` bounds the fetch when `input_str` is a URL.
pub async fn inspect(
    input_str: impl AsRef<str>,
    password: Option<&str>,
    download_timeout_secs: u64,
) -> Result<DocumentInfo, DocTagsError> {
    let resolved = input::resolve_input(input_str.as_ref(), download_timeout_secs).await?;
    rasterize::inspect_input(&resolved, password).await
}

/// Turn one page raster and its DocTags into every derived artifact.
///
/// Zones are sorted into reading order before reconciliation, so zone
/// indices in the report, the warnings and the crops all agree. Text that
/// does not parse yields zero zones (and therefore a blank overlay) with
/// `parse_error` set; this function never fails.
pub fn process_page(
    raster: &PageRaster,
    doctags: &str,
    config: &PipelineConfig,
    title_fallback: &str,
) -> PageArtifacts {
    let page_num = raster.page_num;
    let (mut zones, parse_error) = match parse(doctags) {
        Ok(zones) => (zones, None),
        Err(e) => {
            warn!("Page {}: DocTags not parseable: {}", page_num, e);
            (Vec::new(), Some(e.to_string()))
        }
    };
    sort_reading_order(&mut zones);

    let (width, height) = raster.dimensions();
    let reconciliation = reconcile_with(&zones, width, height, &config.reconcile);
    if reconciliation.is_uncertain() {
        warn!(
            "Page {}: geometry uncertain ({} scale {:.3}×{:.3})",
            page_num, reconciliation.strategy, reconciliation.x_scale, reconciliation.y_scale
        );
    }

    let overlay = draw_overlay(raster, &reconciliation.zones, &config.overlay);
    let cropped = crop_regions(raster, &reconciliation.zones, &config.crop);
    debug!(
        "Page {}: {} zones, {} drawn, {} cropped",
        page_num,
        reconciliation.zones.len(),
        overlay.drawn,
        cropped.crops.len()
    );

    let mut warnings = overlay.warnings;
    for w in cropped.warnings {
        if !warnings.contains(&w) {
            warnings.push(w);
        }
    }
    warnings.sort_by_key(|w| w.index());

    let report = PageReport::new(page_num, &reconciliation, warnings);
    let markdown = to_markdown(&zones, title_fallback);

    PageArtifacts {
        parse_error,
        reconciliation,
        overlay: overlay.image,
        crops: cropped.crops,
        report,
        markdown,
    }
}

/// Write one page's artifacts under `dir` and return the paths written.
///
/// Layout:
/// ```text
/// page_N.doctags.txt
/// page_N.overlay.png
/// page_N.json
/// page_N.md
/// pictures/page_N/<kind>_<n>[_<caption>].png (+ .txt caption)
/// ```
/// A page without artifacts gets only the placeholder overlay, plus the
/// DocTags file when the model answered.
pub fn write_page_artifacts(dir: &Path, page: &PageAnalysis) -> Result<Vec<PathBuf>, DocTagsError> {
    create_dir(dir)?;
    let n = page.page_num;
    let mut written = Vec::new();

    if !page.doctags.is_empty() {
        let path = dir.join(format!("page_{}.doctags.txt", n));
        write_text(&path, &page.doctags)?;
        written.push(path);
    }

    let overlay_path = dir.join(format!("page_{}.overlay.png", n));
    let Some(ref artifacts) = page.artifacts else {
        save_png(&overlay_path, &placeholder_raster(n).image)?;
        written.push(overlay_path);
        return Ok(written);
    };

    save_png(&overlay_path, &artifacts.overlay)?;
    written.push(overlay_path);

    let json_path = dir.join(format!("page_{}.json", n));
    let json = artifacts
        .report
        .to_json()
        .map_err(|e| DocTagsError::Internal(format!("Report serialisation failed: {}", e)))?;
    write_text(&json_path, &json)?;
    written.push(json_path);

    let md_path = dir.join(format!("page_{}.md", n));
    write_text(&md_path, &artifacts.markdown)?;
    written.push(md_path);

    if !artifacts.crops.is_empty() {
        let crop_dir = dir.join("pictures").join(format!("page_{}", n));
        written.extend(write_crops(&crop_dir, &artifacts.crops)?);
    }

    Ok(written)
}

/// Write cropped regions as PNGs, each non-empty caption to a `.txt` beside it.
pub fn write_crops(
    dir: &Path,
    crops: &[crate::render::CroppedRegion],
) -> Result<Vec<PathBuf>, DocTagsError> {
    create_dir(dir)?;
    let mut written = Vec::with_capacity(crops.len());
    for crop in crops {
        let png = dir.join(format!("{}.png", crop.file_stem));
        save_png(&png, &crop.image)?;
        written.push(png);
        if !crop.caption.trim().is_empty() {
            let txt = dir.join(format!("{}.txt", crop.file_stem));
            write_text(&txt, &crop.caption)?;
            written.push(txt);
        }
    }
    Ok(written)
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn create_dir(dir: &Path) -> Result<(), DocTagsError> {
    std::fs::create_dir_all(dir).map_err(|source| DocTagsError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_text(path: &Path, text: &str) -> Result<(), DocTagsError> {
    std::fs::write(path, text).map_err(|source| DocTagsError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

fn save_png(path: &Path, image: &image::DynamicImage) -> Result<(), DocTagsError> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| DocTagsError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocTagsError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocTagsError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the VLM provider, from most-specific to least-specific:
///
/// 1. a pre-built provider in `config.provider`
/// 2. `config.provider_name` with `config.model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set
/// 4. `ProviderFactory::from_env` auto-detection
async fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, DocTagsError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocTagsError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No VLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Used with a named provider when no model is given.
const DEFAULT_MODEL: &str = "gpt-4.1-mini";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::ScaleStrategy;
    use image::{DynamicImage, Rgb, RgbImage};

    fn white_page(page_num: usize, w: u32, h: u32) -> PageRaster {
        PageRaster::new(
            page_num,
            DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))),
        )
    }

    const PAGE: &str = "<doctag>\
        <section_header_level_1><loc_10><loc_10><loc_400><loc_40>Results</section_header_level_1>\
        <text><loc_10><loc_60><loc_400><loc_120>Body text.</text>\
        <picture><loc_50><loc_150><loc_250><loc_300>Figure 1</picture>\
        </doctag>";

    #[test]
    fn process_page_full_flow() {
        let raster = white_page(2, 1000, 1000);
        let artifacts = process_page(&raster, PAGE, &PipelineConfig::default(), "doc");

        assert!(artifacts.parse_error.is_none());
        assert_eq!(artifacts.reconciliation.strategy, ScaleStrategy::NormalizedGrid);
        assert_eq!(artifacts.zones().len(), 3);
        assert_eq!(artifacts.crops.len(), 1);
        assert_eq!(artifacts.crops[0].bbox.x1, 100);
        assert_eq!(artifacts.report.page_num, 2);
        assert!(artifacts.markdown.starts_with("# Results"));
        assert_eq!(artifacts.overlay.width(), 1000);
    }

    #[test]
    fn unparseable_doctags_give_blank_overlay() {
        let raster = white_page(1, 200, 200);
        let artifacts = process_page(&raster, "I cannot read this page.", &PipelineConfig::default(), "doc");

        assert!(artifacts.parse_error.is_some());
        assert!(artifacts.zones().is_empty());
        assert!(artifacts.crops.is_empty());
        assert_eq!(artifacts.reconciliation.strategy, ScaleStrategy::Identity);
    }

    #[test]
    fn writes_expected_layout() {
        let raster = white_page(4, 1000, 1000);
        let config = PipelineConfig::default();
        let page = PageAnalysis {
            page_num: 4,
            doctags: PAGE.to_string(),
            artifacts: Some(process_page(&raster, PAGE, &config, "doc")),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: None,
        };

        let dir = tempfile::tempdir().expect("tempdir");
        let written = write_page_artifacts(dir.path(), &page).expect("write");

        for name in ["page_4.doctags.txt", "page_4.overlay.png", "page_4.json", "page_4.md"] {
            assert!(dir.path().join(name).exists(), "missing {}", name);
        }
        let pic_dir = dir.path().join("pictures").join("page_4");
        assert!(pic_dir.join("picture_1_figure_1.png").exists());
        assert_eq!(
            std::fs::read_to_string(pic_dir.join("picture_1_figure_1.txt")).expect("caption"),
            "Figure 1"
        );
        assert_eq!(written.len(), 6);
    }

    #[test]
    fn failed_page_gets_placeholder() {
        let page = PageAnalysis::failed(
            7,
            PageError::RenderFailed {
                page: 7,
                detail: "boom".into(),
            },
        );
        let dir = tempfile::tempdir().expect("tempdir");
        let written = write_page_artifacts(dir.path(), &page).expect("write");

        assert_eq!(written, vec![dir.path().join("page_7.overlay.png")]);
        let img = image::open(&written[0]).expect("decode");
        assert_eq!((img.width(), img.height()), (800, 600));
    }
}
