//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is CPU-bound
//! and not async-aware. `tokio::task::spawn_blocking` moves the work onto the
//! blocking pool so Tokio worker threads never stall during rendering.
//!
//! ## Why a temp file?
//!
//! Uploads arrive as bytes, but [`Rasterizer`] implementations open documents
//! by path. [`rasterize_document`] stages the bytes in a file owned by the
//! request's [`TempScope`] and removes that file again before it returns,
//! whether rendering succeeded or not.

use crate::error::{RasterError, ReportError};
use crate::output::PageImage;
use crate::tempfiles::TempScope;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// How far into the file the `%PDF-` header may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// pdfium keeps global library state; only one binding may be live at a time.
static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// Turns a PDF on disk into one image per page, in page order.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<PageImage>, RasterError>;
}

/// [`Rasterizer`] backed by a dynamically loaded pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library: Option<PathBuf>,
    max_page_pixels: u32,
}

impl PdfiumRasterizer {
    /// `library` may be the shared library itself or the directory holding
    /// it. `None` tries `./` and then the system library path.
    pub fn new(library: Option<PathBuf>, max_page_pixels: u32) -> Self {
        Self {
            library,
            max_page_pixels,
        }
    }

    /// `true` if a pdfium library can be bound right now.
    pub fn is_available(&self) -> bool {
        let _guard = PDFIUM_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        bind_pdfium(self.library.as_deref()).is_ok()
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<PageImage>, RasterError> {
        let _guard = PDFIUM_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let pdfium = bind_pdfium(self.library.as_deref())?;

        let document = pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
            let detail = format!("{:?}", e);
            if detail.contains("Password") || detail.contains("password") {
                RasterError::InvalidDocument {
                    detail: "the PDF is password-protected".to_string(),
                }
            } else {
                RasterError::InvalidDocument { detail }
            }
        })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
            .set_maximum_width(self.max_page_pixels as i32)
            .set_maximum_height(self.max_page_pixels as i32);

        let mut images = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| RasterError::PageFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(PageImage::new(idx, image));
        }

        Ok(images)
    }
}

/// Bind to pdfium: explicit library (file or directory), else `./`, else the
/// system library.
fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, RasterError> {
    let bindings = match library {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| RasterError::EngineUnavailable(e.to_string()))?;

    Ok(Pdfium::new(bindings))
}

/// Check for a `%PDF-` header near the start of `bytes`.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Rasterise uploaded PDF bytes at `dpi`.
///
/// # Errors
/// - [`RasterError::InvalidDocument`] if `bytes` is not a PDF or pdfium
///   cannot parse it
/// - [`RasterError::EmptyDocument`] if the PDF has zero pages
///
/// The staged input file is released from `scope` before this returns.
pub async fn rasterize_document(
    bytes: &[u8],
    dpi: u32,
    rasterizer: &Arc<dyn Rasterizer>,
    scope: &mut TempScope,
) -> Result<Vec<PageImage>, ReportError> {
    if !looks_like_pdf(bytes) {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(RasterError::InvalidDocument {
            detail: format!("missing %PDF header (first bytes: {:?})", magic),
        }
        .into());
    }

    let start = Instant::now();
    let input = scope
        .allocate(".pdf")
        .map_err(|e| RasterError::Io(e.to_string()))?;

    let outcome = stage_and_render(bytes, dpi, rasterizer, scope, &input).await;
    scope.release(&input);

    let pages = outcome?;
    if pages.is_empty() {
        return Err(RasterError::EmptyDocument.into());
    }
    info!(
        "Rasterised {} pages at {} DPI in {}ms",
        pages.len(),
        dpi,
        start.elapsed().as_millis()
    );
    Ok(pages)
}

async fn stage_and_render(
    bytes: &[u8],
    dpi: u32,
    rasterizer: &Arc<dyn Rasterizer>,
    scope: &mut TempScope,
    input: &Path,
) -> Result<Vec<PageImage>, ReportError> {
    scope
        .write(input, bytes)
        .map_err(|e| RasterError::Io(e.to_string()))?;

    let rasterizer = Arc::clone(rasterizer);
    let path = input.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || rasterizer.rasterize(&path, dpi))
        .await
        .map_err(|e| ReportError::Internal(format!("Render task panicked: {}", e)))??;

    Ok(pages)
}
