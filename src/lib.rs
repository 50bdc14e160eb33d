//! # edgequake-translate
//!
//! Translate PDF documents with Language Models, streaming the translation
//! as it is generated and finishing with a structured document.
//!
//! ## Why this crate?
//!
//! A whole-document translation from an LLM takes minutes, and the raw
//! model output is loosely formatted text: sometimes Markdown, sometimes
//! HTML-ish markup, always with stray fences, tags and invisible characters.
//! This crate streams the text to the caller as it arrives, survives dropped
//! connections by retrying without ever repeating text the caller already
//! has, and turns the final output into a clean [`NormalizedDocument`] of
//! headings, paragraphs, lists and tables.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Admit      validate, wait for a session slot
//!  ├─ 2. Translate  one model call per attempt, increments → Chunk events
//!  │                (retry with backoff; delivered text is never re-sent)
//!  ├─ 3. Clean      strip fences, invisible characters, noise lines
//!  ├─ 4. Parse      Markdown or markup → NormalizedDocument
//!  ├─ 5. Sanitize   strip leftover tags and emphasis markers
//!  ├─ 6. Final      document + delivered text + stats
//!  └─ 7. Archive    input and output, detached and best-effort
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_translate::{ModelSelector, TranslationRequest, Translator, TranslatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let translator = Translator::new(TranslatorConfig::default())?;
//!     let bytes = std::fs::read("contract.pdf")?;
//!     let request = TranslationRequest::new(bytes, "hi", ModelSelector::new("gpt-4.1-mini"))?;
//!     let output = translator.translate(request).await?;
//!     println!("{}", output.to_markdown());
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use edgequake_translate::{SessionEvent, Translator, TranslationRequest};
//! use futures::StreamExt;
//!
//! # async fn run(translator: Translator, request: TranslationRequest) -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = translator.start_session(request).await?;
//! while let Some(event) = session.next().await {
//!     match event {
//!         SessionEvent::Chunk { delta, progress, .. } => print!("{delta} ({progress}%)"),
//!         SessionEvent::Final { document, .. } => println!("\n{} nodes", document.len()),
//!         SessionEvent::Error { message, .. } => eprintln!("failed: {message}"),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-translate` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-translate = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod language;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod request;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{Archive, FsArchive};
pub use client::{LlmClient, ModelClient, ModelOutput, TextIncrement};
pub use config::{TranslatorConfig, TranslatorConfigBuilder};
pub use document::{DocumentNode, ListKind, NormalizedDocument, RichText, Section, Span};
pub use error::{ArchiveError, ModelError, TranslateError, ValidationError};
pub use event::SessionEvent;
pub use language::{Language, Script};
pub use output::{SessionStats, TranslationOutput};
pub use pipeline::parse::Dialect;
pub use request::{ModelSelector, Template, TranslationRequest};
pub use session::SessionState;
pub use stream::{CancelHandle, SessionHandle, Translator};
