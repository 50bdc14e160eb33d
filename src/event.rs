//! Session lifecycle events.
//!
//! Every session emits, in order: one [`SessionEvent::Start`], zero or more
//! [`SessionEvent::Chunk`]s, then exactly one terminal event:
//! [`SessionEvent::Final`], [`SessionEvent::Error`] or
//! [`SessionEvent::Cancelled`]. Nothing follows a terminal event.
//!
//! Events serialise as JSON objects tagged by `type`:
//!
//! ```text
//! {"type":"start","document_id":"req_1718000000_4242_0","input_size":48213,"target_language":{"code":"hi","name":"Hindi"}}
//! {"type":"chunk","document_id":"req_1718000000_4242_0","delta":"ऋण समझौता","progress":4,"chunk_count":1}
//! {"type":"final","document_id":"req_1718000000_4242_0","document":{…},"progress":100,…}
//! ```

use crate::document::NormalizedDocument;
use crate::language::Language;
use crate::output::{SessionStats, TranslationOutput};
use serde::Serialize;

/// One event of a session's stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session has a slot and is calling the model.
    Start {
        document_id: String,
        input_size: usize,
        target_language: Language,
    },
    /// Newly translated text. `delta` is never text an earlier chunk carried.
    Chunk {
        document_id: String,
        delta: String,
        /// Heuristic, 0–99, non-decreasing.
        progress: u8,
        /// 1-based running count of chunk events.
        chunk_count: u64,
    },
    /// The translation finished.
    Final {
        document_id: String,
        document: NormalizedDocument,
        text: String,
        detected_language: Language,
        target_language: Language,
        /// Always 100.
        progress: u8,
        elapsed_secs: f64,
        stats: SessionStats,
    },
    /// The translation failed.
    Error {
        document_id: String,
        message: String,
        elapsed_secs: f64,
        /// `false` when the model rejected the request outright.
        retries_exhausted: bool,
    },
    /// The caller cancelled the session.
    Cancelled {
        document_id: String,
        elapsed_secs: f64,
    },
}

impl SessionEvent {
    pub fn document_id(&self) -> &str {
        match self {
            SessionEvent::Start { document_id, .. }
            | SessionEvent::Chunk { document_id, .. }
            | SessionEvent::Final { document_id, .. }
            | SessionEvent::Error { document_id, .. }
            | SessionEvent::Cancelled { document_id, .. } => document_id,
        }
    }

    /// Final, Error and Cancelled end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::Final { .. } | SessionEvent::Error { .. } | SessionEvent::Cancelled { .. }
        )
    }

    /// The `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Start { .. } => "start",
            SessionEvent::Chunk { .. } => "chunk",
            SessionEvent::Final { .. } => "final",
            SessionEvent::Error { .. } => "error",
            SessionEvent::Cancelled { .. } => "cancelled",
        }
    }

    /// The output of a `Final` event.
    pub fn into_output(self) -> Option<TranslationOutput> {
        match self {
            SessionEvent::Final {
                document_id,
                document,
                text,
                detected_language,
                target_language,
                elapsed_secs,
                stats,
                ..
            } => Some(TranslationOutput {
                document_id,
                document,
                text,
                detected_language,
                target_language,
                elapsed_secs,
                stats,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentNode;

    #[test]
    fn chunk_serialises_with_type_tag() {
        let e = SessionEvent::Chunk {
            document_id: "req_1".into(),
            delta: "नमस्ते".into(),
            progress: 12,
            chunk_count: 3,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "chunk");
        assert_eq!(json["delta"], "नमस्ते");
        assert_eq!(json["chunk_count"], 3);
        assert!(!e.is_terminal());
    }

    #[test]
    fn final_carries_document_and_languages() {
        let e = SessionEvent::Final {
            document_id: "req_1".into(),
            document: NormalizedDocument::new(vec![DocumentNode::heading(1, "Loan")]),
            text: "# Loan".into(),
            detected_language: Language::ENGLISH,
            target_language: Language::HINDI,
            progress: 100,
            elapsed_secs: 1.5,
            stats: SessionStats::default(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "final");
        assert_eq!(json["document"]["title"], "Loan");
        assert_eq!(json["detected_language"]["name"], "English");
        assert_eq!(json["target_language"]["name"], "Hindi");
        assert!(e.is_terminal());
        assert_eq!(e.document_id(), "req_1");

        let out = e.into_output().unwrap();
        assert_eq!(out.text, "# Loan");
    }

    #[test]
    fn error_and_cancelled_are_terminal() {
        let err = SessionEvent::Error {
            document_id: "d".into(),
            message: "boom".into(),
            elapsed_secs: 0.0,
            retries_exhausted: true,
        };
        let cancelled = SessionEvent::Cancelled {
            document_id: "d".into(),
            elapsed_secs: 0.0,
        };
        assert!(err.is_terminal() && cancelled.is_terminal());
        assert_eq!(serde_json::to_value(&cancelled).unwrap()["type"], "cancelled");
        assert!(err.into_output().is_none());
    }
}
