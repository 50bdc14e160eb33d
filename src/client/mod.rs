//! The model capability a session drives.
//!
//! A [`ModelClient`] turns one [`TranslationRequest`] into translated text,
//! either as a single [`ModelOutput::Full`] result or as a
//! [`ModelOutput::Stream`] of sequence-numbered [`TextIncrement`]s.
//!
//! ## What sessions assume about a client
//!
//! - A call may fail at any point, **after** some increments were already
//!   produced. Partial delivery on failure is normal, not exceptional.
//! - A call may never finish. Sessions enforce their own per-attempt timeout
//!   and abort the call by dropping it.
//! - Sequence numbers start at 0 for every call. Increments of a retried call
//!   say nothing about where the previous call stopped.
//!
//! Two implementations ship with the crate:
//!
//! - [`LlmClient`] — an `edgequake-llm` provider, used by the CLI
//! - [`ScriptedClient`] — replays scripted attempts, for tests and demos

pub mod llm;
pub mod scripted;

pub use llm::LlmClient;
pub use scripted::{Script, ScriptedClient, Step};

use crate::error::ModelError;
use crate::language::Language;
use crate::request::TranslationRequest;
use futures::future::BoxFuture;
use futures::stream;
use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;

/// A sequence-numbered slice of model output from a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextIncrement {
    /// 0-based, strictly increasing within one attempt.
    pub seq: u64,
    pub text: String,
}

impl TextIncrement {
    pub fn new(seq: u64, text: impl Into<String>) -> Self {
        Self {
            seq,
            text: text.into(),
        }
    }
}

/// A boxed stream of increments from one attempt.
pub type IncrementStream = Pin<Box<dyn Stream<Item = Result<TextIncrement, ModelError>> + Send>>;

/// What a successful `invoke` hands back.
pub enum ModelOutput {
    /// The whole translation at once.
    Full {
        text: String,
        /// Source language, when the model reports one.
        source_language: Option<Language>,
    },
    /// Increments that arrive over time. The stream may still fail.
    Stream {
        increments: IncrementStream,
        source_language: Option<Language>,
    },
}

impl ModelOutput {
    pub fn full(text: impl Into<String>) -> Self {
        ModelOutput::Full {
            text: text.into(),
            source_language: None,
        }
    }

    pub fn stream(increments: IncrementStream) -> Self {
        ModelOutput::Stream {
            increments,
            source_language: None,
        }
    }

    pub fn source_language(&self) -> Option<Language> {
        match self {
            ModelOutput::Full {
                source_language, ..
            }
            | ModelOutput::Stream {
                source_language, ..
            } => *source_language,
        }
    }

    /// View either mode as an increment stream. A full result becomes a
    /// single increment with sequence number 0.
    pub fn into_increments(self) -> IncrementStream {
        match self {
            ModelOutput::Full { text, .. } => {
                Box::pin(stream::once(async move { Ok(TextIncrement::new(0, text)) }))
            }
            ModelOutput::Stream { increments, .. } => increments,
        }
    }
}

impl fmt::Debug for ModelOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelOutput::Full {
                text,
                source_language,
            } => f
                .debug_struct("Full")
                .field("chars", &text.chars().count())
                .field("source_language", source_language)
                .finish(),
            ModelOutput::Stream {
                source_language, ..
            } => f
                .debug_struct("Stream")
                .field("increments", &"<IncrementStream>")
                .field("source_language", source_language)
                .finish(),
        }
    }
}

/// Anything that can translate a request.
///
/// Implementations must be cheap to call repeatedly with the same request:
/// every retry calls `invoke` again from scratch.
pub trait ModelClient: Send + Sync {
    fn invoke<'a>(
        &'a self,
        request: &'a TranslationRequest,
    ) -> BoxFuture<'a, Result<ModelOutput, ModelError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn full_result_becomes_one_increment() {
        let output = ModelOutput::full("नमस्ते");
        assert_eq!(output.source_language(), None);
        let items: Vec<_> = output.into_increments().collect().await;
        assert_eq!(items, vec![Ok(TextIncrement::new(0, "नमस्ते"))]);
    }

    #[test]
    fn debug_does_not_dump_text() {
        let output = ModelOutput::Full {
            text: "secret contract".into(),
            source_language: Some(Language::ENGLISH),
        };
        let dbg = format!("{output:?}");
        assert!(dbg.contains("chars: 15"));
        assert!(!dbg.contains("secret"));
    }
}
