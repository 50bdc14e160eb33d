//! [`ModelClient`] backed by an `edgequake-llm` provider.
//!
//! The whole PDF goes to the model as a single attachment; the model reads it
//! and answers with the complete translation. Prompts live in
//! [`crate::prompts`]; retry, timeout and output
//! reconciliation belong to the session, so a call here makes exactly one
//! request and classifies its failure.
//!
//! ## Message Layout
//!
//! 1. **System message** — the translation prompt (or the configured override)
//! 2. **User message** — the PDF as a base64 `application/pdf` attachment
//!    with empty text; the attachment carries all the content.
//!
//! ## Provider resolution
//!
//! [`LlmClient::from_config`] picks a provider in this order:
//!
//! 1. `config.provider` — a pre-built provider
//! 2. `config.provider_name` + `config.model`
//! 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set
//! 4. OpenAI when `OPENAI_API_KEY` is set
//! 5. whatever `ProviderFactory::from_env()` detects

use super::{ModelClient, ModelOutput};
use crate::config::TranslatorConfig;
use crate::error::{ModelError, TranslateError};
use crate::language::Language;
use crate::prompts::translation_prompt;
use crate::request::TranslationRequest;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Sends each request to an LLM provider.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    system_prompt: Option<String>,
}

impl fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|_| "<custom>"))
            .finish()
    }
}

impl LlmClient {
    /// Wrap a provider with default sampling options.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            temperature: 0.1,
            max_tokens: 8000,
            system_prompt: None,
        }
    }

    /// Resolve a provider from the config (see the module docs) and copy its
    /// sampling options.
    pub fn from_config(config: &TranslatorConfig) -> Result<Self, TranslateError> {
        let provider = resolve_provider(config)?;
        Ok(Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
        })
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    fn build_messages(&self, request: &TranslationRequest) -> Vec<ChatMessage> {
        let prompt = match &self.system_prompt {
            Some(custom) => custom.clone(),
            None => translation_prompt(
                Language::default_source_for(request.target()),
                request.target(),
                request.model().dialect(),
                request.template(),
            ),
        };
        let pdf = ImageData::new(STANDARD.encode(request.source()), "application/pdf");
        vec![
            ChatMessage::system(prompt),
            ChatMessage::user_with_images("", vec![pdf]),
        ]
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

impl ModelClient for LlmClient {
    fn invoke<'a>(
        &'a self,
        request: &'a TranslationRequest,
    ) -> BoxFuture<'a, Result<ModelOutput, ModelError>> {
        Box::pin(async move {
            let start = Instant::now();
            let messages = self.build_messages(request);
            let options = self.build_options();

            let response = self
                .provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| classify_failure(&e.to_string()))?;

            debug!(
                "{} input tokens, {} output tokens, {:?}",
                response.prompt_tokens,
                response.completion_tokens,
                start.elapsed()
            );
            Ok(ModelOutput::full(response.content))
        })
    }
}

/// Markers of failures that a retry cannot fix.
const PERMANENT_MARKERS: [&str; 9] = [
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "invalid api key",
    "authentication",
    "bad request",
    "content policy",
    "content_filter",
];

/// Sort a provider failure into retryable transport trouble or a rejection.
fn classify_failure(message: &str) -> ModelError {
    let lower = message.to_lowercase();
    if PERMANENT_MARKERS.iter().any(|m| lower.contains(m)) {
        ModelError::Rejected(message.to_string())
    } else {
        ModelError::Transport(message.to_string())
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn resolve_provider(config: &TranslatorConfig) -> Result<Arc<dyn LLMProvider>, TranslateError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // Prefer OpenAI when its key is present, even if other keys are too.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _) =
        ProviderFactory::from_env().map_err(|e| TranslateError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!("No LLM provider auto-detected: {}", e),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, TranslateError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        TranslateError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_permanent() {
        assert_eq!(
            classify_failure("HTTP 401: Invalid API key"),
            ModelError::Rejected("HTTP 401: Invalid API key".into())
        );
        assert!(!classify_failure("Forbidden").is_transient());
    }

    #[test]
    fn overload_and_network_failures_are_transient() {
        assert!(classify_failure("HTTP 429: rate limited").is_transient());
        assert!(classify_failure("503 Service Unavailable").is_transient());
        assert!(classify_failure("connection reset by peer").is_transient());
    }
}
