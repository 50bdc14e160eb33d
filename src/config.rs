//! Configuration types for the translator.
//!
//! Everything a session needs beyond its request (retry policy, timeouts,
//! limits, the model client and the archive) lives in one
//! [`TranslatorConfig`], built via its [`TranslatorConfigBuilder`] and passed
//! into [`crate::Translator::new`]. There is no ambient global state: two
//! translators with different configs can run side by side in one process.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::archive::Archive;
use crate::client::ModelClient;
use crate::error::TranslateError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default input size limit: 15 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 15 * 1024 * 1024;

/// Configuration for a [`crate::Translator`].
///
/// Built via [`TranslatorConfig::builder()`] or using
/// [`TranslatorConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_translate::TranslatorConfig;
///
/// let config = TranslatorConfig::builder()
///     .max_attempts(5)
///     .attempt_timeout_secs(120)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TranslatorConfig {
    /// Model calls per session, including the first. Default: 3.
    ///
    /// Overloaded endpoints (429/503) and dropped connections are common for
    /// multi-minute generations. Three attempts catch the vast majority
    /// without making a doomed session wait for long. Permanent rejections
    /// (bad API key, refused content) are never retried.
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds. Default: 1000.
    ///
    /// Doubles after each failed attempt: 1 s → 2 s → 4 s. Exponential
    /// backoff keeps many concurrent sessions from hammering a recovering
    /// endpoint in lockstep.
    pub retry_backoff_ms: u64,

    /// Timeout for one model attempt in seconds. Default: 300.
    ///
    /// Applies per attempt, not per session. Whole-document translations of
    /// long contracts legitimately take minutes; a timeout is treated like
    /// any other transient failure and retried.
    pub attempt_timeout_secs: u64,

    /// Largest accepted document in bytes. Default: 15 MiB.
    pub max_input_bytes: usize,

    /// Sessions allowed to run at once across the translator. Default: 8.
    ///
    /// Each session holds its PDF in memory and keeps one model call open,
    /// so this bounds both memory and provider concurrency.
    pub max_concurrent_sessions: usize,

    /// How long `start_session` waits for a free slot in seconds. Default: 30.
    pub admission_timeout_secs: u64,

    /// Events buffered per session before the session waits for the
    /// consumer. Default: 64.
    pub event_buffer: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Expected output length in characters, for progress estimates.
    /// Default: `None`, derived from the input size.
    pub expected_chars: Option<usize>,

    /// Sampling temperature for the LLM completion. Default: 0.1.
    ///
    /// Translation should be faithful, not creative. A low temperature keeps
    /// retries of the same request close to each other, which also keeps
    /// the replayed prefix of a retry consistent with what was delivered.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate. Default: 8000.
    ///
    /// Setting this too low silently truncates the translation mid-document.
    pub max_tokens: usize,

    /// LLM model identifier, e.g. "gpt-4.1-mini", "claude-sonnet-4-20250514".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Custom system prompt. If None, the built-in prompt is used.
    pub system_prompt: Option<String>,

    /// Pre-constructed model client. Takes precedence over every LLM
    /// provider setting.
    pub client: Option<Arc<dyn ModelClient>>,

    /// Where finished sessions are archived. Default: nowhere.
    pub archive: Option<Arc<dyn Archive>>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 1000,
            attempt_timeout_secs: 300,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_concurrent_sessions: 8,
            admission_timeout_secs: 30,
            event_buffer: 64,
            download_timeout_secs: 120,
            expected_chars: None,
            temperature: 0.1,
            max_tokens: 8000,
            model: None,
            provider_name: None,
            provider: None,
            system_prompt: None,
            client: None,
            archive: None,
        }
    }
}

impl fmt::Debug for TranslatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorConfig")
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("attempt_timeout_secs", &self.attempt_timeout_secs)
            .field("max_input_bytes", &self.max_input_bytes)
            .field("max_concurrent_sessions", &self.max_concurrent_sessions)
            .field("admission_timeout_secs", &self.admission_timeout_secs)
            .field("event_buffer", &self.event_buffer)
            .field("expected_chars", &self.expected_chars)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("client", &self.client.as_ref().map(|_| "<dyn ModelClient>"))
            .field("archive", &self.archive.as_ref().map(|_| "<dyn Archive>"))
            .finish()
    }
}

impl TranslatorConfig {
    /// Create a new builder for `TranslatorConfig`.
    pub fn builder() -> TranslatorConfigBuilder {
        TranslatorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Expected output length for an input of `input_bytes`.
    ///
    /// Without an explicit `expected_chars`, assume one output character per
    /// ten input bytes, clamped to 2 000–100 000. PDF size tracks text length
    /// only loosely (fonts, images), so this is a rough scale for a progress
    /// bar, not a prediction.
    pub fn expected_chars_for(&self, input_bytes: usize) -> usize {
        self.expected_chars
            .unwrap_or_else(|| (input_bytes / 10).clamp(2_000, 100_000))
            .max(1)
    }
}

/// Builder for [`TranslatorConfig`].
#[derive(Debug)]
pub struct TranslatorConfigBuilder {
    config: TranslatorConfig,
}

impl TranslatorConfigBuilder {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.clamp(1, 10);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn attempt_timeout_secs(mut self, secs: u64) -> Self {
        self.config.attempt_timeout_secs = secs.max(1);
        self
    }

    pub fn max_input_bytes(mut self, n: usize) -> Self {
        self.config.max_input_bytes = n;
        self
    }

    pub fn max_concurrent_sessions(mut self, n: usize) -> Self {
        self.config.max_concurrent_sessions = n.max(1);
        self
    }

    pub fn admission_timeout_secs(mut self, secs: u64) -> Self {
        self.config.admission_timeout_secs = secs;
        self
    }

    pub fn event_buffer(mut self, n: usize) -> Self {
        self.config.event_buffer = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn expected_chars(mut self, n: usize) -> Self {
        self.config.expected_chars = Some(n.max(1));
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

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn archive(mut self, archive: Arc<dyn Archive>) -> Self {
        self.config.archive = Some(archive);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranslatorConfig, TranslateError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(TranslateError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.max_concurrent_sessions == 0 {
            return Err(TranslateError::InvalidConfig(
                "max_concurrent_sessions must be ≥ 1".into(),
            ));
        }
        if c.max_input_bytes == 0 {
            return Err(TranslateError::InvalidConfig(
                "max_input_bytes must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(TranslateError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedClient;

    #[test]
    fn defaults() {
        let c = TranslatorConfig::default();
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.retry_backoff_ms, 1000);
        assert_eq!(c.attempt_timeout_secs, 300);
        assert_eq!(c.max_input_bytes, 15 * 1024 * 1024);
        assert_eq!(c.max_tokens, 8000);
        assert!((c.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn setters_clamp() {
        let c = TranslatorConfig::builder()
            .max_attempts(0)
            .attempt_timeout_secs(0)
            .max_concurrent_sessions(0)
            .event_buffer(0)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.max_attempts, 1);
        assert_eq!(c.attempt_timeout_secs, 1);
        assert_eq!(c.max_concurrent_sessions, 1);
        assert_eq!(c.event_buffer, 1);
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn build_rejects_zero_limits() {
        let err = TranslatorConfig::builder()
            .max_input_bytes(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, TranslateError::InvalidConfig(_)));
        assert!(TranslatorConfig::builder().max_tokens(0).build().is_err());
    }

    #[test]
    fn expected_chars_heuristic() {
        let c = TranslatorConfig::default();
        assert_eq!(c.expected_chars_for(0), 2_000);
        assert_eq!(c.expected_chars_for(500_000), 50_000);
        assert_eq!(c.expected_chars_for(50_000_000), 100_000);

        let fixed = TranslatorConfig::builder().expected_chars(123).build().unwrap();
        assert_eq!(fixed.expected_chars_for(500_000), 123);
    }

    #[test]
    fn debug_hides_trait_objects() {
        let c = TranslatorConfig::builder()
            .client(Arc::new(ScriptedClient::new()))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn ModelClient>"));
    }
}
