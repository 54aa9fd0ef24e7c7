//! CLI binary for doctags-zones.
//!
//! A thin shim over the library crate: each subcommand maps its flags to a
//! `PipelineConfig` (or an `AffineFix`) and writes artifacts to disk.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use doctags_zones::pipeline::input::{resolve_input, InputKind};
use doctags_zones::pipeline::rasterize::{load_image_page, render_pdf_page};
use doctags_zones::{
    analyze, apply_affine_fix, coordinate_stats, inspect, process_page, suggest_factors,
    write_crops, write_page_artifacts, AffineFix, AnalysisProgressCallback, KindFilter,
    PageRaster, PageSelection, PipelineConfig, PipelineConfigBuilder, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per page. Pages complete out of
/// order, so start times are tracked per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rasterising…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Analysing");
        self.bar.reset_eta();
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, zone_count: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{zone_count:>4} zones")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_analysis_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} pages analysed", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages analysed  ({} failed)",
                yellow("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full pipeline: VLM → DocTags → overlays, crops, reports, Markdown
  doctags analyze paper.pdf --pages 1-3 -o out/

  # Draw zones from an existing DocTags file over page 2 of a PDF
  doctags visualize --doctags page2.doctags.txt --input paper.pdf --page 2 -o page2.png

  # Same, for coordinates in raw pixels: let the heuristic guess the scale
  doctags visualize --doctags page2.doctags.txt --input paper.pdf --page 2 --adjust

  # Cut out pictures and tables
  doctags extract --doctags page2.doctags.txt --input paper.pdf --page 2 --kind picture --kind table

  # Rewrite coordinates in a DocTags file
  doctags fix-scaling --doctags page2.doctags.txt -o fixed.doctags.txt -x 0.7 -y 0.7
  doctags fix-scaling --doctags page2.doctags.txt -o fixed.doctags.txt --suggest

  # Page count and sizes (no API key needed)
  doctags inspect paper.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium; the system library is used otherwise
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Locate DocTags zones on page images, draw them, and cut them out.
#[derive(Parser, Debug)]
#[command(
    name = "doctags",
    version,
    about = "Parse DocTags, reconcile zone coordinates with page rasters, and render them",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCTAGS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCTAGS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a VLM for DocTags and write every artifact per page.
    Analyze(AnalyzeArgs),
    /// Draw the zones of a DocTags file over a page.
    Visualize(VisualizeArgs),
    /// Crop zones of selected kinds out of a page.
    Extract(ExtractArgs),
    /// Rewrite every box in a DocTags file with an affine correction.
    FixScaling(FixScalingArgs),
    /// Print page count and page sizes.
    Inspect(InspectArgs),
}

/// Where the page raster comes from.
#[derive(Args, Debug)]
struct PageSource {
    /// PDF or PNG/JPEG page image (local path or URL).
    #[arg(short, long, env = "DOCTAGS_INPUT")]
    input: String,

    /// Page number in the PDF (starts at 1).
    #[arg(long, env = "DOCTAGS_PAGE", default_value_t = 1)]
    page: usize,

    /// Rendering DPI (72–600).
    #[arg(long, env = "DOCTAGS_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCTAGS_PASSWORD")]
    password: Option<String>,
}

/// How raw coordinates are mapped onto the page.
#[derive(Args, Debug)]
struct GeometryArgs {
    /// Guess a scale when coordinates exceed the grid.
    #[arg(long, env = "DOCTAGS_ADJUST")]
    adjust: bool,

    /// Scale factor for both axes.
    #[arg(long, env = "DOCTAGS_SCALE")]
    scale: Option<f64>,

    /// X-axis scale factor (overrides --scale).
    #[arg(long, env = "DOCTAGS_SCALE_X")]
    scale_x: Option<f64>,

    /// Y-axis scale factor (overrides --scale).
    #[arg(long, env = "DOCTAGS_SCALE_Y")]
    scale_y: Option<f64>,

    /// Size of the normalised coordinate grid.
    #[arg(long, env = "DOCTAGS_GRID", default_value_t = 500)]
    grid: u32,
}

impl GeometryArgs {
    fn apply(&self, mut builder: PipelineConfigBuilder) -> PipelineConfigBuilder {
        builder = builder.auto_adjust(self.adjust).grid_size(self.grid);
        if self.scale.is_some() || self.scale_x.is_some() || self.scale_y.is_some() {
            let base = self.scale.unwrap_or(1.0);
            builder = builder.manual_scale(self.scale_x.unwrap_or(base), self.scale_y.unwrap_or(base));
        }
        builder
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Local PDF/image path or HTTP/HTTPS URL.
    input: String,

    /// Directory for the per-page artifacts.
    #[arg(short, long, env = "DOCTAGS_OUTPUT", default_value = "doctags-out")]
    output: PathBuf,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "DOCTAGS_PAGES", default_value = "all")]
    pages: String,

    /// VLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// VLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Instruction sent with each page image.
    #[arg(short, long, env = "DOCTAGS_PROMPT")]
    prompt: Option<String>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "DOCTAGS_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCTAGS_PASSWORD")]
    password: Option<String>,

    /// Number of concurrent VLM calls.
    #[arg(short, long, env = "DOCTAGS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Max output tokens per page.
    #[arg(long, env = "DOCTAGS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "DOCTAGS_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per page on VLM failure.
    #[arg(long, env = "DOCTAGS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-attempt VLM timeout in seconds.
    #[arg(long, env = "DOCTAGS_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCTAGS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Do not guess a scale for coordinates outside the grid.
    #[arg(long, env = "DOCTAGS_NO_ADJUST")]
    no_adjust: bool,

    /// Zone kinds to crop (repeatable).
    #[arg(long = "kind", env = "DOCTAGS_KINDS", value_delimiter = ',', default_value = "picture")]
    kinds: Vec<String>,

    /// Maximum width of cropped images in pixels.
    #[arg(long, env = "DOCTAGS_MAX_WIDTH", default_value_t = 1200)]
    max_width: u32,

    /// Print run statistics as JSON on stdout.
    #[arg(long, env = "DOCTAGS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCTAGS_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct VisualizeArgs {
    /// DocTags file to draw.
    #[arg(short, long, env = "DOCTAGS_FILE")]
    doctags: PathBuf,

    #[command(flatten)]
    source: PageSource,

    #[command(flatten)]
    geometry: GeometryArgs,

    /// Annotated PNG to write; a JSON report is written beside it.
    #[arg(short, long, default_value = "visualization.png")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// DocTags file naming the regions.
    #[arg(short, long, env = "DOCTAGS_FILE")]
    doctags: PathBuf,

    #[command(flatten)]
    source: PageSource,

    #[command(flatten)]
    geometry: GeometryArgs,

    /// Zone kinds to crop (repeatable, or `all`).
    #[arg(long = "kind", value_delimiter = ',', default_value = "picture")]
    kinds: Vec<String>,

    /// Maximum width of output images in pixels.
    #[arg(long, env = "DOCTAGS_MAX_WIDTH", default_value_t = 1200)]
    max_width: u32,

    /// Margin added around each region in pixels.
    #[arg(long, env = "DOCTAGS_MARGIN", default_value_t = 0)]
    margin: u32,

    /// Output directory.
    #[arg(short, long, default_value = "pictures")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct FixScalingArgs {
    /// DocTags file to correct.
    #[arg(short, long)]
    doctags: PathBuf,

    /// Where to write the corrected DocTags.
    #[arg(short, long)]
    output: PathBuf,

    /// X-axis factor.
    #[arg(short = 'x', long, default_value_t = 0.7)]
    x_factor: f64,

    /// Y-axis factor.
    #[arg(short = 'y', long, default_value_t = 0.7)]
    y_factor: f64,

    /// X-axis offset in coordinate units.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    x_offset: i64,

    /// Y-axis offset in coordinate units.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    y_offset: i64,

    /// Print coordinate statistics and use the suggested factors.
    #[arg(long)]
    suggest: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local PDF/image path or HTTP/HTTPS URL.
    input: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCTAGS_PASSWORD")]
    password: Option<String>,

    /// Download timeout for URL inputs, in seconds.
    #[arg(long, env = "DOCTAGS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Analyze(args) => run_analyze(args, cli.quiet).await,
        Command::Visualize(args) => run_visualize(args, cli.quiet).await,
        Command::Extract(args) => run_extract(args, cli.quiet).await,
        Command::FixScaling(args) => run_fix_scaling(args, cli.quiet),
        Command::Inspect(args) => run_inspect(args).await,
    }
}

// ── Subcommands ──────────────────────────────────────────────────────────────

async fn run_analyze(args: AnalyzeArgs, quiet: bool) -> Result<()> {
    let show_progress = !quiet && !args.no_progress && !args.json;
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };

    let pages = PageSelection::parse(&args.pages).context("Invalid --pages")?;
    let mut builder = PipelineConfig::builder()
        .dpi(args.dpi)
        .pages(pages)
        .concurrency(args.concurrency)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout)
        .auto_adjust(!args.no_adjust)
        .crop_kinds(kind_filter(&args.kinds))
        .crop_max_width(args.max_width);
    if let Some(model) = args.model {
        builder = builder.model(model);
    }
    if let Some(provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(prompt) = args.prompt {
        builder = builder.prompt(prompt);
    }
    if let Some(password) = args.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let output = analyze(&args.input, &config)
        .await
        .context("Analysis failed")?;

    let dir = args.output.join(&output.source_stem);
    let mut written = 0;
    for page in &output.pages {
        written += write_page_artifacts(&dir, page)
            .with_context(|| format!("Failed to write artifacts for page {}", page.page_num))?
            .len();
        if let Some(ref artifacts) = page.artifacts {
            for w in &artifacts.report.warnings {
                tracing::warn!("Page {}: {}", page.page_num, w);
            }
        }
    }

    let summary = serde_json::to_string_pretty(&output.stats).context("Failed to serialise stats")?;
    std::fs::write(dir.join("summary.json"), &summary)
        .with_context(|| format!("Failed to write summary to {}", dir.display()))?;

    if args.json {
        println!("{summary}");
    } else if !quiet {
        let s = &output.stats;
        eprintln!(
            "{}  {}/{} pages  {} zones  {} crops  {}ms  →  {}",
            if s.failed_pages == 0 { green("✔") } else { yellow("⚠") },
            s.processed_pages,
            s.total_pages,
            s.total_zones,
            s.total_crops,
            s.total_duration_ms,
            bold(&dir.display().to_string()),
        );
        eprintln!(
            "   {} files  {} tokens in  /  {} tokens out",
            dim(&written.to_string()),
            dim(&s.total_input_tokens.to_string()),
            dim(&s.total_output_tokens.to_string()),
        );
        if s.uncertain_pages > 0 {
            eprintln!(
                "   {} pages reconciled with a guessed scale",
                yellow(&s.uncertain_pages.to_string())
            );
        }
    }
    Ok(())
}

async fn run_visualize(args: VisualizeArgs, quiet: bool) -> Result<()> {
    let doctags = read_doctags(&args.doctags)?;
    let config = args
        .geometry
        .apply(PipelineConfig::builder().dpi(args.source.dpi))
        .build()
        .context("Invalid configuration")?;
    let raster = load_raster(&args.source, &config).await?;

    let artifacts = process_page(&raster, &doctags, &config, &file_stem(&args.doctags));
    if let Some(ref e) = artifacts.parse_error {
        tracing::warn!("{}: {}; drawing an empty overlay", args.doctags.display(), e);
    }

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    artifacts
        .overlay
        .save_with_format(&args.output, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    let report_path = args.output.with_extension("json");
    std::fs::write(&report_path, artifacts.report.to_json()?)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    if !quiet {
        let r = &artifacts.report;
        eprintln!(
            "{}  {} zones  {}  scale {:.3}×{:.3}{}  →  {}",
            green("✔"),
            r.zones.len(),
            r.strategy,
            r.x_scale,
            r.y_scale,
            if r.uncertain_geometry { yellow("  (guessed)") } else { String::new() },
            bold(&args.output.display().to_string()),
        );
        for w in &r.warnings {
            eprintln!("   {} {}", yellow("!"), w);
        }
    }
    Ok(())
}

async fn run_extract(args: ExtractArgs, quiet: bool) -> Result<()> {
    let doctags = read_doctags(&args.doctags)?;
    let builder = PipelineConfig::builder()
        .dpi(args.source.dpi)
        .crop_kinds(kind_filter(&args.kinds))
        .crop_max_width(args.max_width)
        .crop_margin(args.margin);
    let config = args
        .geometry
        .apply(builder)
        .build()
        .context("Invalid configuration")?;
    let raster = load_raster(&args.source, &config).await?;

    let artifacts = process_page(&raster, &doctags, &config, &file_stem(&args.doctags));
    if let Some(ref e) = artifacts.parse_error {
        bail!("{}: {}", args.doctags.display(), e);
    }

    let written = write_crops(&args.output, &artifacts.crops)
        .with_context(|| format!("Failed to write crops to {}", args.output.display()))?;

    if !quiet {
        for crop in &artifacts.crops {
            eprintln!(
                "  {} {:<32} {}",
                green("✓"),
                crop.file_stem,
                dim(&format!("{}x{}", crop.image.width(), crop.image.height()))
            );
        }
        for w in &artifacts.report.warnings {
            eprintln!("  {} {}", yellow("!"), w);
        }
        eprintln!(
            "{}  {} regions  {} files  →  {}",
            green("✔"),
            artifacts.crops.len(),
            written.len(),
            bold(&args.output.display().to_string())
        );
    }
    Ok(())
}

fn run_fix_scaling(args: FixScalingArgs, quiet: bool) -> Result<()> {
    let text = read_doctags(&args.doctags)?;

    let fix = if args.suggest {
        let Some(suggestion) = suggest_factors(&text) else {
            bail!("{}: no zones with coordinates found", args.doctags.display());
        };
        let s = &suggestion.stats;
        eprintln!("Zones:        {}", s.zone_count);
        eprintln!("X range:      {} – {}", s.min_x, s.max_x);
        eprintln!("Y range:      {} – {}", s.min_y, s.max_y);
        eprintln!("Avg size:     {:.1} × {:.1}", s.avg_width, s.avg_height);
        eprintln!("Regime:       {:?}", suggestion.regime);
        if s.high_variance {
            eprintln!("{}", yellow("Zone sizes vary widely; a single scale may not fit."));
        }
        eprintln!(
            "Suggested:    -x {:.3} -y {:.3}",
            suggestion.x_factor, suggestion.y_factor
        );
        AffineFix {
            x_offset: args.x_offset,
            y_offset: args.y_offset,
            ..suggestion.as_fix()
        }
    } else {
        AffineFix {
            x_factor: args.x_factor,
            y_factor: args.y_factor,
            x_offset: args.x_offset,
            y_offset: args.y_offset,
        }
    };

    let fixed = apply_affine_fix(&text, &fix);
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&args.output, &fixed)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    if !quiet {
        let before = coordinate_stats(&text);
        let after = coordinate_stats(&fixed);
        eprintln!(
            "{}  x×{} y×{} (+{}, +{})  →  {}",
            green("✔"),
            fix.x_factor,
            fix.y_factor,
            fix.x_offset,
            fix.y_offset,
            bold(&args.output.display().to_string())
        );
        if let (Some(b), Some(a)) = (before, after) {
            eprintln!(
                "   max ({}, {}) → ({}, {})",
                b.max_x, b.max_y, a.max_x, a.max_y
            );
        }
    }
    Ok(())
}

async fn run_inspect(args: InspectArgs) -> Result<()> {
    let info = inspect(&args.input, args.password.as_deref(), args.download_timeout)
        .await
        .context("Failed to inspect input")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialise document info")?
        );
        return Ok(());
    }

    println!("File:         {}", args.input);
    println!("Kind:         {}", info.kind);
    println!("Pages:        {}", info.page_count);
    if let Some(ref v) = info.pdf_version {
        println!("PDF Version:  {}", v);
    }
    if let Some(ref t) = info.title {
        println!("Title:        {}", t);
    }
    if let Some(ref p) = info.producer {
        println!("Producer:     {}", p);
    }
    let unit = if info.kind == "pdf" { "pt" } else { "px" };
    for (i, (w, h)) in info.page_sizes.iter().enumerate() {
        println!("  page {:>4}:  {:.1} × {:.1} {}", i + 1, w, h, unit);
    }
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn read_doctags(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read DocTags from {}", path.display()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn kind_filter(kinds: &[String]) -> KindFilter {
    if kinds.iter().any(|k| k.eq_ignore_ascii_case("all")) {
        KindFilter::All
    } else {
        KindFilter::only(kinds.iter().map(|k| k.trim().to_string()))
    }
}

/// Rasterise the requested page, or decode the image input.
async fn load_raster(source: &PageSource, config: &PipelineConfig) -> Result<PageRaster> {
    let resolved = resolve_input(&source.input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to open {}", source.input))?;
    let path = resolved.path().to_path_buf();

    let raster = match resolved.kind() {
        InputKind::Pdf => {
            let page = source.page;
            let mut config = config.clone();
            config.password = source.password.clone();
            tokio::task::spawn_blocking(move || render_pdf_page(&path, page, &config))
                .await
                .context("Render task panicked")?
                .with_context(|| format!("Failed to render page {}", source.page))?
        }
        InputKind::Image => {
            if source.page != 1 {
                bail!("{} is a single image; --page must be 1", source.input);
            }
            load_image_page(&path).with_context(|| format!("Failed to decode {}", source.input))?
        }
    };
    drop(resolved);
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix_scaling_args(argv: &[&str]) -> FixScalingArgs {
        match Cli::try_parse_from(argv).expect("valid arguments").command {
            Command::FixScaling(args) => args,
            other => panic!("parsed the wrong subcommand: {:?}", other),
        }
    }

    #[test]
    fn fix_scaling_creates_missing_output_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("page.doctags.txt");
        std::fs::write(&input, "<doctag><text><loc_100><loc_100><loc_200><loc_200>x</text></doctag>")
            .expect("write input");
        let output = dir.path().join("fixed/nested/page.doctags.txt");

        let args = fix_scaling_args(&[
            "doctags",
            "fix-scaling",
            "-d",
            input.to_str().expect("utf-8 path"),
            "-o",
            output.to_str().expect("utf-8 path"),
            "-x",
            "0.5",
            "-y",
            "0.5",
        ]);
        run_fix_scaling(args, true).expect("fix-scaling");

        let fixed = std::fs::read_to_string(&output).expect("read output");
        assert!(fixed.contains("<loc_50><loc_50><loc_100><loc_100>"));
    }

    #[test]
    fn fix_scaling_reports_unwritable_output_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("page.doctags.txt");
        std::fs::write(&input, "<doctag><text><loc_1><loc_1><loc_2><loc_2>x</text></doctag>")
            .expect("write input");
        // A regular file where the output directory should go.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").expect("write blocker");
        let output = blocker.join("out.txt");

        let args = fix_scaling_args(&[
            "doctags",
            "fix-scaling",
            "-d",
            input.to_str().expect("utf-8 path"),
            "-o",
            output.to_str().expect("utf-8 path"),
        ]);
        let err = run_fix_scaling(args, true).expect_err("parent is a file");
        assert!(
            err.to_string().starts_with("Failed to create"),
            "got: {err:#}"
        );
    }
}
