//! CLI binary for reportrx.
//!
//! A thin shim over the library crate: `analyze` runs one report from the
//! command line, `serve` exposes the same analyzer over HTTP.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use reportrx::{
    AnalysisConfig, AnalysisProgressCallback, Analyzer, ProgressCallback, ReportAnalysis,
    RequestState, Section, SectionError,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the PDF is rendered, then a six-step bar over the sections.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(Section::ALL.len() as u64);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>1}/{len} sections  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Analysing");
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_state(&self, state: RequestState) {
        match state {
            RequestState::Received => self.bar.set_message("Rendering pages…"),
            RequestState::Rasterized => self.bar.set_message("Stacking pages…"),
            RequestState::Composited => self.activate_bar(),
            RequestState::Analyzed(_) => {}
            RequestState::Rendered => {
                self.bar.finish_and_clear();
                let failed = self.errors.load(Ordering::SeqCst);
                let total = Section::ALL.len();
                if failed == 0 {
                    eprintln!("{} {} sections analysed", green("✔"), bold(&total.to_string()));
                } else {
                    eprintln!(
                        "{} {}/{} sections analysed  ({} failed)",
                        if failed == total { red("✘") } else { cyan("⚠") },
                        bold(&(total - failed).to_string()),
                        total,
                        red(&failed.to_string()),
                    );
                }
            }
        }
    }

    fn on_section_start(&self, section: Section, _position: usize, _total: usize) {
        self.bar.set_message(section.title().to_string());
    }

    fn on_section_complete(&self, section: Section, text_len: usize) {
        self.bar.println(format!(
            "  {} {:<28}  {}",
            green("✓"),
            section.title(),
            dim(&format!("{text_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_section_error(&self, section: Section, error: &SectionError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let reason = error.reason();
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason
        };
        self.bar.println(format!(
            "  {} {:<28}  {}",
            red("✗"),
            section.title(),
            red(&msg)
        ));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a report, print the sections as text
  reportrx analyze blood-panel.pdf

  # JSON output (sections, composite data URI, stats)
  reportrx analyze --json blood-panel.pdf > report.json

  # Analyse a report from a URL
  reportrx analyze https://lab.example.com/reports/cbc.pdf

  # Run the HTTP endpoint
  reportrx serve --addr 127.0.0.1:5000
  curl -F pdf_file=@blood-panel.pdf http://127.0.0.1:5000/analyze

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY        Google Gemini API key (default provider)
  OPENAI_API_KEY        OpenAI API key        (--provider openai)
  ANTHROPIC_API_KEY     Anthropic API key     (--provider anthropic)
  REPORTRX_PROVIDER     Override provider
  REPORTRX_MODEL        Override model ID
  PDFIUM_LIB_PATH       Path to libpdfium (file or directory)

Without a credential every section reports
"Error: Could not analyze report. API issue: …" instead of failing.
"#;

/// Analyse medical report PDFs with a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "reportrx",
    version,
    about = "Analyse medical report PDFs with a Vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "REPORTRX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "REPORTRX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one report and print the sections.
    Analyze(AnalyzeArgs),
    /// Serve `POST /analyze` over HTTP.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Output structured JSON (ReportAnalysis) instead of text.
    #[arg(long, env = "REPORTRX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "REPORTRX_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "REPORTRX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    #[command(flatten)]
    model: ModelArgs,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "REPORTRX_ADDR", default_value = "0.0.0.0:5000")]
    addr: std::net::SocketAddr,

    #[command(flatten)]
    model: ModelArgs,
}

/// Flags shared by every subcommand that builds an analyzer.
#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM provider: gemini, openai, anthropic, mistral, openrouter, ollama.
    #[arg(long, env = "REPORTRX_PROVIDER", default_value = reportrx::config::DEFAULT_PROVIDER)]
    provider: String,

    /// Vision model ID.
    #[arg(long, env = "REPORTRX_MODEL", default_value = reportrx::config::DEFAULT_MODEL)]
    model: String,

    /// Rendering DPI (72–600).
    #[arg(long, env = "REPORTRX_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "REPORTRX_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max LLM output tokens per section.
    #[arg(long, env = "REPORTRX_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Per-section LLM call timeout in seconds.
    #[arg(long, env = "REPORTRX_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Retries per section on LLM failure.
    #[arg(long, env = "REPORTRX_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Number of section calls in flight at once.
    #[arg(long, env = "REPORTRX_SECTION_CONCURRENCY", default_value_t = 1)]
    section_concurrency: usize,

    /// Directory for temporary files (default: OS temp dir).
    #[arg(long, env = "REPORTRX_TEMP_DIR")]
    temp_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for interactive `analyze` runs.
    let show_progress = match &cli.command {
        Command::Analyze(args) => !cli.quiet && !args.no_progress && !args.json,
        #[cfg(feature = "server")]
        Command::Serve(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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
        Command::Analyze(args) => run_analyze(args, cli.quiet, show_progress).await,
        #[cfg(feature = "server")]
        Command::Serve(args) => {
            let config = build_config(&args.model, None, 120)?;
            let analyzer = Arc::new(Analyzer::new(config));
            reportrx::server::serve(args.addr, analyzer)
                .await
                .with_context(|| format!("Server on {} failed", args.addr))
        }
    }
}

async fn run_analyze(args: AnalyzeArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&args.model, progress_cb, args.download_timeout)?;
    let analyzer = Analyzer::new(config);

    let report = analyzer
        .analyze_input(&args.input)
        .await
        .with_context(|| format!("Failed to analyse '{}'", args.input))?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(render_text(&report).as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !quiet && !args.json {
        eprintln!(
            "   {} pages  {} tokens in  /  {} tokens out  —  {}ms total",
            report.stats.page_count,
            dim(&report.stats.total_input_tokens.to_string()),
            dim(&report.stats.total_output_tokens.to_string()),
            report.stats.total_duration_ms,
        );
    }
    Ok(())
}

/// Sections as plain text, one titled block each.
fn render_text(report: &ReportAnalysis) -> String {
    let mut out = String::new();
    for result in &report.sections {
        out.push_str(&format!("## {}\n\n", result.section.title()));
        out.push_str(result.text().trim_end());
        out.push_str("\n\n");
    }
    out
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(
    args: &ModelArgs,
    progress: Option<ProgressCallback>,
    download_timeout: u64,
) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .provider_name(&args.provider)
        .model(&args.model)
        .dpi(args.dpi)
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .api_timeout_secs(args.api_timeout)
        .max_retries(args.max_retries)
        .section_concurrency(args.section_concurrency)
        .download_timeout_secs(download_timeout);
    if let Some(ref dir) = args.temp_dir {
        builder = builder.temp_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}
