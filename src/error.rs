//! Error types for the edgequake-translate library.
//!
//! Four distinct error types reflect four distinct failure modes:
//!
//! * [`TranslateError`] — **Fatal**: the translation cannot proceed at all
//!   (bad input, provider not configured, retries exhausted). Returned as
//!   `Err(TranslateError)` from the top-level entry points.
//!
//! * [`ValidationError`] — the request itself is malformed. Raised before a
//!   session exists and never retried.
//!
//! * [`ModelError`] — a single model attempt failed. Classified by
//!   [`ModelError::is_transient`]: transient failures are retried inside the
//!   session, permanent ones end it. Callers only ever see the last one,
//!   folded into an `Error` event.
//!
//! * [`ArchiveError`] — best-effort archival failed. Logged, never surfaced.
//!
//! Parse degradations are deliberately *not* errors; see
//! [`crate::pipeline::parse::Degradation`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-translate library.
#[derive(Debug, Error)]
pub enum TranslateError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The request was rejected before a session started.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Admission errors ──────────────────────────────────────────────────
    /// Every session slot stayed busy for the whole admission window.
    #[error("Translator at capacity: {limit} sessions active, none freed within {waited_secs}s")]
    AtCapacity { limit: usize, waited_secs: u64 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The session ended with an `Error` event.
    #[error("Translation of '{document_id}' failed after {elapsed_secs:.1}s: {message}")]
    SessionFailed {
        document_id: String,
        message: String,
        elapsed_secs: f64,
        retries_exhausted: bool,
    },

    /// The session was cancelled before it completed.
    #[error("Translation of '{document_id}' was cancelled")]
    Cancelled { document_id: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A request that must be rejected before any model call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Zero-length document.
    #[error("Input document is empty")]
    EmptyInput,

    /// Document exceeds the configured size limit.
    #[error("File size {size} bytes exceeds the {limit}-byte limit")]
    InputTooLarge { size: usize, limit: usize },

    /// The bytes do not start with the `%PDF` signature.
    #[error("Input is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { magic: Vec<u8> },

    /// Target language code is not in the language table.
    #[error("Unsupported target language '{code}'\nUse an ISO 639-1 code such as 'en' or 'hi'.")]
    UnsupportedLanguage { code: String },

    /// Model selector was blank.
    #[error("Model id must not be empty")]
    EmptyModel,

    /// Template id is not one of the known templates.
    #[error("Unknown template '{template}'\nKnown templates: simplified, detailed.")]
    UnknownTemplate { template: String },
}

/// Failure of a single model attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The attempt exceeded the per-attempt timeout.
    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Network, 5xx, rate-limit or stream interruption.
    #[error("Model transport error: {0}")]
    Transport(String),

    /// The increment stream skipped or repeated a sequence number.
    #[error("Sequence gap in model stream: expected increment {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    /// The model rejected the request (auth, bad request, content filter).
    /// Retrying will not help.
    #[error("Model rejected the request: {0}")]
    Rejected(String),
}

impl ModelError {
    /// Whether the session should retry after this failure.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ModelError::Rejected(_))
    }
}

/// Best-effort archival failure. Only ever logged.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to write archive entry '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive backend error: {0}")]
    Backend(String),
}
