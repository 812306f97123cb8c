//! Pipeline stages for medical-report analysis.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the orchestrator in [`crate::analyze`] only wires
//! them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ composite ──▶ encode ──▶ llm ×6 ──▶ postprocess
//! (path/URL) (pdfium)   (stack)      (PNG/b64)  (VLM)      (cleanup)
//! ```
//!
//! 1. [`input`]: read a local path or download a URL into a submission
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`composite`]: stack the pages top to bottom into one image
//! 4. [`encode`]: PNG-encode and base64-wrap the composite for the model
//!    request and the data URI in the response
//! 5. [`llm`]: one model call per report section, with timeout and
//!    optional retry; the only stage with network I/O
//! 6. [`postprocess`]: strip non-ASCII characters and surrounding whitespace

pub mod composite;
pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
