//! Section analysis: one prompt + the composite image → cleaned text.
//!
//! This module drives a single [`VisionModel`] call per section. All prompt
//! text lives in [`crate::prompts`]; all text cleanup in
//! [`super::postprocess`].
//!
//! ## Failure policy
//!
//! [`analyze_section`] never returns an error. A failed, timed-out or
//! unconfigured call becomes a [`SectionError`] stored in the
//! [`SectionResult`], so one bad section cannot abort the other five.
//!
//! ## Retry strategy
//!
//! Off by default (`max_retries = 0`). When enabled, failed calls are retried
//! with exponential backoff (`retry_backoff_ms * 2^attempt`, capped at
//! [`MAX_BACKOFF_MS`]). An unconfigured model is never retried.

use crate::config::AnalysisConfig;
use crate::error::SectionError;
use crate::model::{ModelFailure, ModelRequest, VisionModel};
use crate::output::SectionResult;
use crate::pipeline::postprocess::clean_result;
use crate::prompts::Section;
use edgequake_llm::ImageData;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Upper bound for a single retry delay.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Delay before retry number `attempt` (1-based).
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_BACKOFF_MS)
}

/// Run `section`'s prompt against `image`.
pub async fn analyze_section(
    model: &dyn VisionModel,
    image: &ImageData,
    section: Section,
    config: &AnalysisConfig,
) -> SectionResult {
    let start = Instant::now();
    let request = ModelRequest {
        prompt: section.prompt(),
        image,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<SectionError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                section, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, model.generate(request)).await {
            Ok(Ok(reply)) => {
                let duration = start.elapsed();
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    section, reply.input_tokens, reply.output_tokens, duration
                );
                return SectionResult {
                    section,
                    outcome: Ok(clean_result(&reply.content)),
                    input_tokens: reply.input_tokens,
                    output_tokens: reply.output_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt,
                };
            }
            Ok(Err(ModelFailure::NotConfigured { provider, hint })) => {
                warn!("{}: model provider '{}' is not configured", section, provider);
                return SectionResult::failed(
                    section,
                    SectionError::NotConfigured { provider, hint },
                    start.elapsed().as_millis() as u64,
                    attempt,
                );
            }
            Ok(Err(ModelFailure::Call(detail))) => {
                warn!("{}: attempt {} failed: {}", section, attempt + 1, detail);
                last_err = Some(SectionError::ModelFailed {
                    section,
                    retries: attempt,
                    detail,
                });
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    section,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(SectionError::Timeout {
                    section,
                    secs: config.api_timeout_secs,
                });
            }
        }
    }

    let error = last_err.unwrap_or_else(|| SectionError::ModelFailed {
        section,
        retries: config.max_retries,
        detail: "Unknown error".to_string(),
    });
    SectionResult::failed(
        section,
        error,
        start.elapsed().as_millis() as u64,
        config.max_retries,
    )
}
