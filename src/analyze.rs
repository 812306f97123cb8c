//! Request orchestration: one uploaded report in, one [`ReportAnalysis`] out.
//!
//! ## Request lifecycle
//!
//! ```text
//! Received ──▶ Rasterized ──▶ Composited ──▶ Analyzed(1..=6) ──▶ Rendered
//!    │              │
//!    └─ reject      └─ reject (not a PDF, no pages)
//! ```
//!
//! Validation runs before anything touches the disk, so a rejected
//! submission never allocates a temporary file. Every file allocated after
//! that belongs to the request's [`TempScope`], which releases them all when
//! the request ends, on success, on error and on unwind alike.
//!
//! Section calls are isolated: a failed call is stored as data in its
//! [`SectionResult`] and the remaining sections still run.

use crate::config::AnalysisConfig;
use crate::error::{ReportError, ValidationError};
use crate::model::{resolve_model, VisionModel};
use crate::output::{AnalysisStats, ReportAnalysis, SectionResult};
use crate::pipeline::{composite, encode, input, llm, render};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::prompts::Section;
use crate::tempfiles::{TempFileManager, TempScope};
use edgequake_llm::ImageData;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a request currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Received,
    Rasterized,
    Composited,
    /// `n` of the six sections have finished.
    Analyzed(usize),
    Rendered,
}

/// What the submitter handed in, before validation.
///
/// `bytes: None` models a form with no file field at all.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub filename: Option<String>,
    pub bytes: Option<Vec<u8>>,
}

impl Submission {
    /// A submission carrying one file.
    pub fn file(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: Some(filename.into()),
            bytes: Some(bytes),
        }
    }

    /// A submission with no file attached.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reject submissions that cannot be processed.
    ///
    /// # Errors
    /// - [`ValidationError::NoFile`] when no file is attached
    /// - [`ValidationError::EmptyFilename`] when the filename is blank
    /// - [`ValidationError::EmptyFile`] when the file has zero bytes
    pub fn validate(self) -> Result<UploadedDocument, ValidationError> {
        let bytes = self.bytes.ok_or(ValidationError::NoFile)?;
        let filename = match self.filename {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(ValidationError::EmptyFilename),
        };
        if bytes.is_empty() {
            return Err(ValidationError::EmptyFile { filename });
        }
        Ok(UploadedDocument { filename, bytes })
    }
}

/// A submission that passed validation.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Serves analysis requests. Cheap to share behind an `Arc`.
pub struct Analyzer {
    config: AnalysisConfig,
    model: Arc<dyn VisionModel>,
    rasterizer: Arc<dyn Rasterizer>,
    temp: TempFileManager,
}

impl Analyzer {
    /// Build an analyzer with the pdfium rasterizer and the model named by
    /// `config`.
    ///
    /// Never fails: a missing credential yields a model whose every call
    /// reports "not configured", so requests still produce a report.
    pub fn new(config: AnalysisConfig) -> Self {
        let model = resolve_model(&config);
        let rasterizer: Arc<dyn Rasterizer> = Arc::new(PdfiumRasterizer::new(
            config.pdfium_library.clone(),
            config.max_page_pixels,
        ));
        let temp = config
            .temp_dir
            .clone()
            .map(TempFileManager::new)
            .unwrap_or_default();
        Self::with_parts(config, model, rasterizer, temp)
    }

    /// Build an analyzer from explicit collaborators.
    pub fn with_parts(
        config: AnalysisConfig,
        model: Arc<dyn VisionModel>,
        rasterizer: Arc<dyn Rasterizer>,
        temp: TempFileManager,
    ) -> Self {
        info!(
            "Analyzer ready: model={}, dpi={}, temp_dir={}",
            model.name(),
            config.dpi,
            temp.dir().display()
        );
        Self {
            config,
            model,
            rasterizer,
            temp,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn temp_files(&self) -> &TempFileManager {
        &self.temp
    }

    /// Analyse one submitted report.
    ///
    /// # Returns
    /// `Ok(ReportAnalysis)` whenever the document could be rasterised, even
    /// if every section call failed (check [`ReportAnalysis::all_failed`]).
    ///
    /// # Errors
    /// - [`ReportError::Validation`] for a missing or empty upload
    /// - [`ReportError::Rasterization`] when the upload is not a readable PDF
    ///   or has no pages
    pub async fn analyze(&self, submission: Submission) -> Result<ReportAnalysis, ReportError> {
        let document = submission.validate()?;
        info!(
            "Analysing '{}' ({} bytes)",
            document.filename,
            document.bytes.len()
        );
        self.notify(RequestState::Received);

        let mut scope = TempScope::new(self.temp.clone());
        let result = self.run(document, &mut scope).await;
        let released = scope.release_all();
        debug!("Released {} temporary files", released);
        if let Err(ref e) = result {
            warn!("Request failed: {}", e);
        }
        result
    }

    /// Analyse a local PDF file.
    pub async fn analyze_file(&self, path: impl AsRef<Path>) -> Result<ReportAnalysis, ReportError> {
        let submission = input::read_local(path.as_ref()).await?;
        self.analyze(submission).await
    }

    /// Analyse a local path or an HTTP(S) URL.
    pub async fn analyze_input(&self, input_str: &str) -> Result<ReportAnalysis, ReportError> {
        let submission =
            input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        self.analyze(submission).await
    }

    async fn run(
        &self,
        document: UploadedDocument,
        scope: &mut TempScope,
    ) -> Result<ReportAnalysis, ReportError> {
        let total_start = Instant::now();

        // ── Step 1: Rasterise ────────────────────────────────────────────
        let render_start = Instant::now();
        let pages =
            render::rasterize_document(&document.bytes, self.config.dpi, &self.rasterizer, scope)
                .await?;
        let page_count = pages.len();
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        self.notify(RequestState::Rasterized);

        // ── Step 2: Composite + encode ───────────────────────────────────
        let composite_start = Instant::now();
        let (summary, encoded) = tokio::task::spawn_blocking(move || {
            let composite = composite::compose(pages)?;
            let encoded = encode::encode_png(&composite.image)
                .map_err(|e| ReportError::EncodeFailed(e.to_string()))?;
            Ok::<_, ReportError>((composite.summary(), encoded))
        })
        .await
        .map_err(|e| ReportError::Internal(format!("Composite task panicked: {}", e)))??;
        let composite_duration_ms = composite_start.elapsed().as_millis() as u64;
        info!(
            "Composite {}x{} px from {} pages ({} bytes PNG) in {}ms",
            summary.width, summary.height, page_count, encoded.png_len, composite_duration_ms
        );
        self.notify(RequestState::Composited);

        // ── Step 3: Section calls ────────────────────────────────────────
        let image = encoded.to_image_data();
        let llm_start = Instant::now();
        let sections = if self.config.section_concurrency > 1 {
            self.analyze_concurrent(&image).await
        } else {
            self.analyze_sequential(&image).await
        };
        let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

        // ── Step 4: Assemble ─────────────────────────────────────────────
        let stats = build_stats(
            &sections,
            page_count,
            render_duration_ms,
            composite_duration_ms,
            llm_duration_ms,
            total_start.elapsed().as_millis() as u64,
            scope.allocated(),
        );
        info!(
            "Analysis complete: {}/{} sections, {}ms total",
            stats.section_count - stats.failed_sections,
            stats.section_count,
            stats.total_duration_ms
        );
        self.notify(RequestState::Rendered);

        Ok(ReportAnalysis {
            filename: document.filename,
            sections,
            composite: summary,
            composite_data_uri: encoded.data_uri(),
            stats,
        })
    }

    async fn analyze_sequential(&self, image: &ImageData) -> Vec<SectionResult> {
        let total = Section::ALL.len();
        let mut results = Vec::with_capacity(total);
        for (i, &section) in Section::ALL.iter().enumerate() {
            results.push(self.analyze_one(image, section, i + 1, total).await);
            self.notify(RequestState::Analyzed(i + 1));
        }
        results
    }

    /// Up to `section_concurrency` calls in flight; `buffered` keeps the
    /// results in display order.
    async fn analyze_concurrent(&self, image: &ImageData) -> Vec<SectionResult> {
        let total = Section::ALL.len();
        let done = AtomicUsize::new(0);
        let done = &done;
        // Boxed up front so the request future stays `Send`.
        let calls: Vec<BoxFuture<'_, SectionResult>> = Section::ALL
            .iter()
            .enumerate()
            .map(|(i, &section)| {
                async move {
                    let result = self.analyze_one(image, section, i + 1, total).await;
                    let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                    self.notify(RequestState::Analyzed(finished));
                    result
                }
                .boxed()
            })
            .collect();
        stream::iter(calls)
            .buffered(self.config.section_concurrency)
            .collect()
            .await
    }

    async fn analyze_one(
        &self,
        image: &ImageData,
        section: Section,
        position: usize,
        total: usize,
    ) -> SectionResult {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_section_start(section, position, total);
        }
        let result = llm::analyze_section(self.model.as_ref(), image, section, &self.config).await;
        if let Some(ref cb) = self.config.progress_callback {
            match &result.outcome {
                Ok(text) => cb.on_section_complete(section, text.len()),
                Err(e) => cb.on_section_error(section, e),
            }
        }
        result
    }

    fn notify(&self, state: RequestState) {
        debug!("Request state: {:?}", state);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_state(state);
        }
    }
}

fn build_stats(
    sections: &[SectionResult],
    page_count: usize,
    render_duration_ms: u64,
    composite_duration_ms: u64,
    llm_duration_ms: u64,
    total_duration_ms: u64,
    temp_files_allocated: usize,
) -> AnalysisStats {
    AnalysisStats {
        page_count,
        section_count: sections.len(),
        failed_sections: sections.iter().filter(|s| s.is_error()).count(),
        total_input_tokens: sections.iter().map(|s| s.input_tokens as u64).sum(),
        total_output_tokens: sections.iter().map(|s| s.output_tokens as u64).sum(),
        render_duration_ms,
        composite_duration_ms,
        llm_duration_ms,
        total_duration_ms,
        temp_files_allocated,
    }
}

// Request futures must be spawnable on the multi-threaded runtime.
#[allow(dead_code)]
fn assert_request_future_is_send(analyzer: &Analyzer) {
    fn is_send<T: Send>(_: T) {}
    is_send(analyzer.analyze(Submission::empty()));
    is_send(analyzer.analyze_input(""));
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("model", &self.model.name())
            .field("temp_dir", &self.temp.dir())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RasterError;
    use crate::model::{ModelFailure, ModelReply, ModelRequest};
    use crate::output::PageImage;
    use crate::progress::AnalysisProgressCallback;
    use async_trait::async_trait;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::Mutex;

    struct EchoModel;

    #[async_trait]
    impl VisionModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelFailure> {
            let section = Section::ALL
                .iter()
                .find(|s| s.prompt() == request.prompt)
                .map(|s| s.key())
                .unwrap_or("unknown");
            Ok(ModelReply {
                content: format!("text for {section}"),
                input_tokens: 100,
                output_tokens: 10,
            })
        }
    }

    struct SolidRasterizer {
        pages: usize,
    }

    impl Rasterizer for SolidRasterizer {
        fn rasterize(&self, _: &Path, _: u32) -> Result<Vec<PageImage>, RasterError> {
            Ok((0..self.pages)
                .map(|i| {
                    let img = RgbImage::from_pixel(4, 5, Rgb([i as u8 * 40, 0, 0]));
                    PageImage::new(i, DynamicImage::ImageRgb8(img))
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct StateRecorder {
        states: Mutex<Vec<RequestState>>,
    }

    impl AnalysisProgressCallback for StateRecorder {
        fn on_state(&self, state: RequestState) {
            self.states.lock().unwrap().push(state);
        }
    }

    fn analyzer(dir: &Path, pages: usize, config: AnalysisConfig) -> Analyzer {
        Analyzer::with_parts(
            config,
            Arc::new(EchoModel),
            Arc::new(SolidRasterizer { pages }),
            TempFileManager::new(dir),
        )
    }

    #[test]
    fn validation_rules() {
        assert_eq!(
            Submission::empty().validate().unwrap_err(),
            ValidationError::NoFile
        );
        assert_eq!(
            Submission::file("  ", b"%PDF".to_vec()).validate().unwrap_err(),
            ValidationError::EmptyFilename
        );
        let no_name = Submission {
            filename: None,
            bytes: Some(b"%PDF".to_vec()),
        };
        assert_eq!(no_name.validate().unwrap_err(), ValidationError::EmptyFilename);
        assert!(matches!(
            Submission::file("a.pdf", vec![]).validate(),
            Err(ValidationError::EmptyFile { .. })
        ));
        let doc = Submission::file("a.pdf", b"%PDF".to_vec()).validate().unwrap();
        assert_eq!(doc.filename, "a.pdf");
    }

    #[tokio::test]
    async fn states_are_reported_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(StateRecorder::default());
        let config = AnalysisConfig::builder()
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        let analyzer = analyzer(dir.path(), 2, config);

        let analysis = analyzer
            .analyze(Submission::file("labs.pdf", b"%PDF-1.7".to_vec()))
            .await
            .unwrap();
        assert_eq!(analysis.stats.page_count, 2);

        let states = recorder.states.lock().unwrap().clone();
        let mut expected = vec![
            RequestState::Received,
            RequestState::Rasterized,
            RequestState::Composited,
        ];
        expected.extend((1..=6).map(RequestState::Analyzed));
        expected.push(RequestState::Rendered);
        assert_eq!(states, expected);
    }

    #[tokio::test]
    async fn rejected_submission_skips_every_state() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(StateRecorder::default());
        let config = AnalysisConfig::builder()
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        let analyzer = analyzer(dir.path(), 1, config);

        let err = analyzer.analyze(Submission::empty()).await.unwrap_err();
        assert!(err.is_validation());
        assert!(recorder.states.lock().unwrap().is_empty());
        assert!(analyzer.temp_files().leftovers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_and_sections() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(dir.path(), 3, AnalysisConfig::default());
        let analysis = analyzer
            .analyze(Submission::file("labs.pdf", b"%PDF-1.7".to_vec()))
            .await
            .unwrap();

        assert_eq!(analysis.filename, "labs.pdf");
        assert_eq!(analysis.stats.section_count, 6);
        assert_eq!(analysis.stats.failed_sections, 0);
        assert_eq!(analysis.stats.total_input_tokens, 600);
        assert_eq!(analysis.stats.temp_files_allocated, 1);
        assert_eq!(
            analysis.text(Section::DietRecommendations).as_deref(),
            Some("text for diet_recommendations")
        );
        assert_eq!(analysis.composite.height, 15);
        assert!(analysis.composite_data_uri.starts_with("data:image/png;base64,"));
        assert!(analyzer.temp_files().leftovers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_sections_keep_display_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::builder()
            .section_concurrency(4)
            .build()
            .unwrap();
        let analyzer = analyzer(dir.path(), 1, config);
        let analysis = analyzer
            .analyze(Submission::file("labs.pdf", b"%PDF-1.7".to_vec()))
            .await
            .unwrap();

        let order: Vec<Section> = analysis.sections.iter().map(|s| s.section).collect();
        assert_eq!(order, Section::ALL.to_vec());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_sections_run_inside_spawned_task() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::builder()
            .section_concurrency(3)
            .build()
            .unwrap();
        let analyzer = Arc::new(analyzer(dir.path(), 2, config));

        let task = {
            let analyzer = Arc::clone(&analyzer);
            tokio::spawn(async move {
                analyzer
                    .analyze(Submission::file("labs.pdf", b"%PDF-1.7".to_vec()))
                    .await
            })
        };
        let analysis = task.await.unwrap().unwrap();
        assert_eq!(analysis.sections.len(), 6);
        assert!(analyzer.temp_files().leftovers().unwrap().is_empty());
    }
}
