//! Configuration for medical-report analysis.
//!
//! All behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. The config is created once at startup and passed
//! to [`crate::analyze::Analyzer::new`]; nothing in the pipeline reads ambient
//! process state after that, apart from the provider credential which is read
//! exactly once while resolving the model.

use crate::error::ReportError;
use crate::model::VisionModel;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for one [`crate::analyze::Analyzer`].
///
/// # Example
/// ```rust
/// use reportrx::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .dpi(200)
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.temperature, 0.7);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Rendering DPI used when rasterising each page. Range: 72–600. Default: 300.
    ///
    /// Lab reports use small print and dense tables; 300 DPI keeps them
    /// legible to the model at the cost of larger images.
    pub dpi: u32,

    /// Upper bound on either edge of a rendered page, in pixels. Default: 10000.
    ///
    /// A4 and Letter at 300 DPI stay well below this; it only bites on
    /// oversized pages where it keeps pdfium's bitmap allocation bounded.
    pub max_page_pixels: u32,

    /// Sampling temperature for every section call. Default: 0.7.
    ///
    /// The sections are advisory prose, not value extraction, so a mid-range
    /// temperature is used.
    pub temperature: f32,

    /// Maximum tokens the model may generate per section. Default: 8192.
    pub max_tokens: usize,

    /// Retry attempts per section on a failed call. Default: 0 (one attempt).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Number of section calls in flight at once. Default: 1 (sequential).
    ///
    /// Sections share no state, so raising this only trades rate-limit
    /// headroom for latency. Results are always returned in display order.
    pub section_concurrency: usize,

    /// Provider name passed to edgequake-llm. Default: `gemini`.
    pub provider_name: String,

    /// Model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// Pre-constructed model. Takes precedence over `provider_name`/`model`.
    pub provider: Option<Arc<dyn VisionModel>>,

    /// Directory for temporary files. Default: `None` (OS temp dir).
    pub temp_dir: Option<PathBuf>,

    /// Explicit pdfium library (file or directory). Default: `PDFIUM_LIB_PATH`
    /// from the environment, if set.
    pub pdfium_library: Option<PathBuf>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_page_pixels: 10_000,
            temperature: 0.7,
            max_tokens: 8192,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            section_concurrency: 1,
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: None,
            temp_dir: None,
            pdfium_library: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("dpi", &self.dpi)
            .field("max_page_pixels", &self.max_page_pixels)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("section_concurrency", &self.section_concurrency)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("temp_dir", &self.temp_dir)
            .field("pdfium_library", &self.pdfium_library)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_page_pixels(mut self, px: u32) -> Self {
        self.config.max_page_pixels = px.max(100);
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

    pub fn section_concurrency(mut self, n: usize) -> Self {
        self.config.section_concurrency = n;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn VisionModel>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, ReportError> {
        let c = &self.config;
        if !(72..=600).contains(&c.dpi) {
            return Err(ReportError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.section_concurrency == 0 {
            return Err(ReportError::InvalidConfig(
                "Section concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ReportError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if c.provider.is_none() && (c.provider_name.trim().is_empty() || c.model.trim().is_empty())
        {
            return Err(ReportError::InvalidConfig(
                "Provider name and model must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
