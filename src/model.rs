//! The vision-model seam.
//!
//! [`VisionModel`] is the only thing the analysis pipeline knows about the
//! model service: one image, one prompt, one reply. Production code wraps an
//! edgequake-llm provider in [`LlmVisionModel`]; tests substitute their own
//! implementation through [`crate::config::AnalysisConfigBuilder::provider`].
//!
//! The handle is resolved once per process by [`resolve_model`] and shared
//! read-only as `Arc<dyn VisionModel>`. A missing credential does not fail
//! startup: it resolves to an [`UnconfiguredModel`] whose every call returns
//! a diagnosable [`ModelFailure::NotConfigured`].

use crate::config::AnalysisConfig;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::{info, warn};

/// One model call.
#[derive(Clone, Copy)]
pub struct ModelRequest<'a> {
    pub prompt: &'a str,
    pub image: &'a ImageData,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Raw (uncleaned) model reply.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Why a model call did not produce a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelFailure {
    /// The service was never configured; retrying cannot help.
    NotConfigured { provider: String, hint: String },
    /// The call was attempted and failed.
    Call(String),
}

impl ModelFailure {
    pub fn is_permanent(&self) -> bool {
        matches!(self, ModelFailure::NotConfigured { .. })
    }
}

/// A multimodal model that answers a prompt about an image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Provider/model label for logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelFailure>;
}

/// [`VisionModel`] backed by an edgequake-llm provider.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmVisionModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelFailure> {
        // Prompt and image travel in a single user turn; no system message,
        // no history.
        let messages = vec![ChatMessage::user_with_images(
            request.prompt,
            vec![request.image.clone()],
        )];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ModelFailure::Call(e.to_string()))?;

        Ok(ModelReply {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Stand-in used when the model service could not be configured.
#[derive(Debug, Clone)]
pub struct UnconfiguredModel {
    provider: String,
    hint: String,
}

impl UnconfiguredModel {
    pub fn new(provider: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            hint: hint.into(),
        }
    }
}

#[async_trait]
impl VisionModel for UnconfiguredModel {
    fn name(&self) -> &str {
        &self.provider
    }

    async fn generate(&self, _request: ModelRequest<'_>) -> Result<ModelReply, ModelFailure> {
        Err(ModelFailure::NotConfigured {
            provider: self.provider.clone(),
            hint: self.hint.clone(),
        })
    }
}

/// Environment variable holding the credential for a known provider.
pub fn credential_var(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        _ => None,
    }
}

/// Resolve the model handle, from most-specific to least-specific:
///
/// 1. **Pre-built model** (`config.provider`): used as-is.
/// 2. **Named provider + model** (`config.provider_name`, `config.model`) :
///    built with [`ProviderFactory::create_llm_provider`], which reads the
///    provider's API key from the environment.
///
/// Never fails. A missing credential or factory error yields an
/// [`UnconfiguredModel`] carrying the reason.
pub fn resolve_model(config: &AnalysisConfig) -> Arc<dyn VisionModel> {
    if let Some(ref model) = config.provider {
        return Arc::clone(model);
    }

    let provider = config.provider_name.as_str();
    let model = config.model.as_str();

    if let Some(var) = credential_var(provider) {
        let present = std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false);
        if !present {
            warn!(
                "{} not found; every report section will fail until it is set",
                var
            );
            return Arc::new(UnconfiguredModel::new(
                provider,
                format!("{var} is not set in the environment"),
            ));
        }
    }

    match ProviderFactory::create_llm_provider(provider, model) {
        Ok(llm) => {
            info!("Using model provider {}/{}", provider, model);
            Arc::new(LlmVisionModel::new(llm, format!("{provider}/{model}")))
        }
        Err(e) => {
            warn!("Could not initialise provider '{}': {}", provider, e);
            Arc::new(UnconfiguredModel::new(provider, e.to_string()))
        }
    }
}
