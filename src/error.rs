//! Error types for the reportrx library.
//!
//! Two distinct error families reflect two distinct failure modes:
//!
//! * [`ReportError`]: **Fatal**: the request cannot produce a report at all
//!   (no file uploaded, the upload is not a PDF, the PDF has no pages). Returned
//!   as `Err(ReportError)` from [`crate::analyze::Analyzer::analyze`].
//!
//! * [`SectionError`]: **Non-fatal**: one report section failed (network,
//!   auth, quota, timeout) but the other sections are fine. Stored inside
//!   [`crate::output::SectionResult`] so one failed model call never aborts the
//!   remaining sections.
//!
//! Temp-file cleanup failures are neither: they are logged and swallowed by
//! [`crate::tempfiles`].

use crate::prompts::Section;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the reportrx library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The submission was rejected before any processing took place.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The upload could not be turned into page images.
    #[error(transparent)]
    Rasterization(#[from] RasterError),

    /// Page images could not be stacked into a composite.
    #[error(transparent)]
    Composite(#[from] CompositeError),

    /// The composite image could not be PNG-encoded.
    #[error("Failed to encode composite image: {0}")]
    EncodeFailed(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReportError {
    /// `true` when the request was rejected before any processing.
    pub fn is_validation(&self) -> bool {
        matches!(self, ReportError::Validation(_))
    }
}

/// Rejections of the inbound "submit document" operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No file field was present in the submission.
    #[error("No file selected.")]
    NoFile,

    /// A file field was present but its filename was empty.
    #[error("No file selected: the uploaded file has no name.")]
    EmptyFilename,

    /// The uploaded file contained zero bytes.
    #[error("The uploaded file '{filename}' is empty.")]
    EmptyFile { filename: String },
}

/// Failures while turning PDF bytes into page images.
#[derive(Debug, Error)]
pub enum RasterError {
    /// The bytes are not a PDF, or pdfium could not parse them.
    #[error("Uploaded file is not a valid PDF: {detail}")]
    InvalidDocument { detail: String },

    /// The PDF parsed but produced zero pages.
    #[error("The PDF contains no pages")]
    EmptyDocument,

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    PageFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    EngineUnavailable(String),

    /// The temporary input file could not be written.
    #[error("Failed to stage PDF for rasterisation: {0}")]
    Io(String),
}

/// Failures of the image compositor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeError {
    /// `compose` was called with zero page images.
    #[error("Cannot build a composite image from zero pages")]
    EmptyInput,

    /// The summed page heights do not fit into a single image.
    #[error("Composite of {width}x{height} px exceeds the supported image size")]
    TooLarge { width: u64, height: u64 },
}

/// A non-fatal error for a single report section.
///
/// Stored in [`crate::output::SectionResult`]; the request continues.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum SectionError {
    /// The model call failed (network, auth, quota, malformed response).
    #[error("{section}: model call failed after {retries} retries: {detail}")]
    ModelFailed {
        section: Section,
        retries: u32,
        detail: String,
    },

    /// The model call did not complete within the per-call timeout.
    #[error("{section}: model call timed out after {secs}s")]
    Timeout { section: Section, secs: u64 },

    /// The model service was never configured (missing credential etc.).
    #[error("model provider '{provider}' is not configured: {hint}")]
    NotConfigured { provider: String, hint: String },
}

impl SectionError {
    /// The failure reason embedded into the user-facing section text.
    pub fn reason(&self) -> String {
        match self {
            SectionError::ModelFailed { detail, .. } => detail.clone(),
            SectionError::Timeout { secs, .. } => format!("request timed out after {secs}s"),
            SectionError::NotConfigured { provider, hint } => {
                format!("provider '{provider}' is not configured ({hint})")
            }
        }
    }

    /// Text shown in place of the section when the model call failed.
    pub fn user_message(&self) -> String {
        format!("Error: Could not analyze report. API issue: {}", self.reason())
    }
}
