//! # reportrx
//!
//! Analyse medical laboratory reports (PDF) with a Vision Language Model.
//!
//! A report is rasterised page by page, the pages are stacked into one tall
//! image, and that image is sent to the model six times, once per report
//! section (health summary, parameters at a glance, potential risks, diet,
//! consolidated guidance, final summary). The answers come back as a
//! [`ReportAnalysis`] holding every section in display order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF upload
//!  │
//!  ├─ 1. Validate  reject missing or empty uploads (no disk access)
//!  ├─ 2. Render    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Stack     pages top to bottom into one composite image
//!  ├─ 4. Encode    composite → PNG → base64 ImageData
//!  ├─ 5. VLM       six section prompts against the same image
//!  ├─ 6. Clean     strip non-ASCII characters, trim
//!  └─ 7. Output    sections + composite data URI + stats
//! ```
//!
//! A failed section call never fails the request: its text becomes an error
//! line and the other sections still run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reportrx::{AnalysisConfig, Analyzer, Section};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential read from GEMINI_API_KEY
//!     let analyzer = Analyzer::new(AnalysisConfig::default());
//!     let report = analyzer.analyze_file("blood-panel.pdf").await?;
//!     println!("{}", report.text(Section::HealthSummary).unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `reportrx` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | Enables [`server`], the `POST /analyze` HTTP endpoint (axum) |
//!
//! Disable both when using only the library:
//! ```toml
//! reportrx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod tempfiles;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{Analyzer, RequestState, Submission, UploadedDocument};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{CompositeError, RasterError, ReportError, SectionError, ValidationError};
pub use model::{ModelFailure, ModelReply, ModelRequest, VisionModel};
pub use output::{
    AnalysisStats, CompositeImage, CompositeSummary, PageImage, PagePlacement, ReportAnalysis,
    SectionResult,
};
pub use pipeline::composite::compose;
pub use pipeline::postprocess::clean_result;
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::{Section, SECTIONS};
pub use tempfiles::TempFileManager;
