//! Pipeline stages between the model and the finished document.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable, and only [`aggregate`] holds
//! state across increments.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ (model) ──▶ aggregate ──▶ sanitize::clean_text ──▶ parse ──▶ sanitize
//! (path/URL)  increments  deltas       raw-text cleanup          nodes     nodes
//! ```
//!
//! 1. [`input`]     — read a local file or download a URL into memory
//! 2. [`aggregate`] — reconcile increments across retries into deltas;
//!    owns the delivered-text watermark
//! 3. [`sanitize`]  — deterministic cleanup, once on the raw text and once on
//!    the parsed nodes
//! 4. [`parse`]     — dialect-specific structure recovery

pub mod aggregate;
pub mod input;
pub mod parse;
pub mod sanitize;
