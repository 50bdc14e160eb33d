//! Results of a finished session.

use crate::document::NormalizedDocument;
use crate::language::Language;
use serde::Serialize;

/// Counters collected over one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Model calls made, including the successful one.
    pub attempts: u32,
    /// `Chunk` events emitted.
    pub chunks: u64,
    /// Characters of translated text delivered.
    pub chars: usize,
    /// Text the parser had to fall back to paragraphs for.
    pub degradations: usize,
    /// Retries whose output disagreed with text already delivered.
    pub divergent_attempts: u32,
}

/// Everything a renderer needs from a completed translation.
///
/// Returned by [`crate::Translator::translate`]; the streaming API carries
/// the same fields in its `Final` event.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationOutput {
    pub document_id: String,
    pub document: NormalizedDocument,
    /// The delivered text: exactly the concatenation of all chunk deltas.
    pub text: String,
    pub detected_language: Language,
    pub target_language: Language,
    pub elapsed_secs: f64,
    pub stats: SessionStats,
}

impl TranslationOutput {
    /// Render the document as Markdown.
    pub fn to_markdown(&self) -> String {
        self.document.to_markdown()
    }

    /// Render the document as plain text.
    pub fn to_plain_text(&self) -> String {
        self.document.to_plain_text()
    }
}
