//! Progress-callback trait for per-request analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to observe the
//! request as it moves through its states and section calls. The CLI uses it
//! to drive a progress bar; a web front end could forward the events to a
//! socket.
//!
//! # Example
//!
//! ```rust
//! use reportrx::{AnalysisConfig, AnalysisProgressCallback, Section};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_section_complete(&self, section: Section, text_len: usize) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}: {section} ({text_len} chars)");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::analyze::RequestState;
use crate::error::SectionError;
use crate::prompts::Section;
use std::sync::Arc;

/// Called by the orchestrator while it serves one request.
///
/// All methods default to no-ops. With `section_concurrency > 1` the section
/// methods may be called from several tasks at once, so implementations must
/// be `Send + Sync`.
pub trait AnalysisProgressCallback: Send + Sync {
    /// The request entered `state`.
    fn on_state(&self, state: RequestState) {
        let _ = state;
    }

    /// A section call is about to be sent.
    ///
    /// * `position`: 1-based position among the `total` sections
    fn on_section_start(&self, section: Section, position: usize, total: usize) {
        let _ = (section, position, total);
    }

    /// A section returned text.
    fn on_section_complete(&self, section: Section, text_len: usize) {
        let _ = (section, text_len);
    }

    /// A section failed; its text will be the error line.
    fn on_section_error(&self, section: Section, error: &SectionError) {
        let _ = (section, error);
    }
}

/// Shared, type-erased progress callback.
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

/// A callback that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}
