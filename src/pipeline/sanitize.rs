//! Sanitisation: deterministic cleanup of model artefacts.
//!
//! ## Why is sanitisation necessary?
//!
//! Even well-prompted models leave debris in a translation that is harmless
//! to a human reader but wrong in a structured document:
//!
//! - Wrapping the whole answer in ` ```markdown ... ``` ` fences
//! - Stray `<b>`/`</p>` tags or `**` markers inside what is plain text
//! - OCR noise carried over from the scan: bare page numbers, lone symbols,
//!   horizontal rules between pages
//! - Zero-width spaces, BOMs and soft hyphens
//! - Restating the last heading after a retry boundary
//!
//! Cleanup happens at two levels:
//!
//! 1. [`clean_text`] runs once over the raw model text before parsing. It
//!    fixes line-level problems that would otherwise confuse the parser.
//!    Noise lines are only dropped from Markdown: in markup a line break
//!    carries no structure, so a lone `12` may well be the body of a cell.
//! 2. [`sanitize_node`] / [`sanitize`] run over parsed nodes. They are
//!    **idempotent**: a second pass over sanitised nodes is a no-op.
//!
//! [`scrub_delta`] is a third, character-local pass applied to every streamed
//! increment: removing a character never depends on its neighbours, so the
//! concatenation of scrubbed deltas still equals the scrubbed full text.

use crate::document::{DocumentNode, NormalizedDocument, RichText, Span};
use crate::pipeline::parse::Dialect;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Zero-width and formatting characters that never carry content.
const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
];

// ── Delta scrubbing ──────────────────────────────────────────────────────────

/// Remove invisible Unicode from a streamed increment.
pub fn scrub_delta(text: &str) -> Cow<'_, str> {
    if text.contains(INVISIBLE) {
        Cow::Owned(text.replace(INVISIBLE, ""))
    } else {
        Cow::Borrowed(text)
    }
}

// ── Raw-text cleanup ─────────────────────────────────────────────────────────

/// Apply all line-level cleanup rules to the raw model output.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences (models sometimes disobey the prompt)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 4. Trim trailing whitespace per line
/// 5. Markdown only: drop OCR noise lines (bare page numbers, lone symbols)
///    and horizontal rules (`---`, `***`, `===`) that carry no table pipes
/// 6. Collapse runs of blank lines to a single blank line
pub fn clean_text(input: &str, dialect: Dialect) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = s.replace(INVISIBLE, "");
    let s = trim_trailing_whitespace(&s);
    let s = match dialect {
        Dialect::Markdown => drop_noise_lines(&s),
        Dialect::Markup => s,
    };
    collapse_blank_lines(&s).trim().to_string()
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|html)?\n(.*)\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:[-=_*]\s*){3,}$").unwrap());

fn drop_noise_lines(input: &str) -> String {
    input
        .lines()
        .map(|line| {
            if is_noise(line.trim()) || RE_RULE.is_match(line) {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

/// Text too short to be content: one or two bare digits (page numbers) or a
/// single non-alphanumeric character. Empty strings are not noise; they are
/// blank lines.
fn is_noise(text: &str) -> bool {
    let count = text.chars().count();
    if count == 0 {
        return false;
    }
    (count <= 2 && text.chars().all(|c| c.is_ascii_digit()))
        || (count == 1 && !text.chars().all(char::is_alphanumeric))
}

// ── Node sanitisation ────────────────────────────────────────────────────────

/// Sanitise every node, drop empty ones and repeated headings.
///
/// Idempotent: `sanitize(sanitize(d)) == sanitize(d)`.
pub fn sanitize(doc: NormalizedDocument) -> NormalizedDocument {
    let mut out: Vec<DocumentNode> = Vec::with_capacity(doc.len());
    for node in doc.into_nodes().into_iter().filter_map(sanitize_node) {
        if let Some(prev) = out.last() {
            if is_repeated_heading(prev, &node) {
                continue;
            }
        }
        out.push(node);
    }
    NormalizedDocument::new(out)
}

/// Sanitise one node. Returns `None` when nothing is left of it.
///
/// Idempotent: `sanitize_node(n).and_then(sanitize_node) == sanitize_node(n)`.
pub fn sanitize_node(node: DocumentNode) -> Option<DocumentNode> {
    match node {
        DocumentNode::Title { text } => {
            let text = clean_plain(&text);
            (!text.is_empty()).then_some(DocumentNode::Title { text })
        }
        DocumentNode::Heading { level, text } => {
            let text = clean_plain(&text);
            (!text.is_empty()).then_some(DocumentNode::Heading {
                level: level.clamp(1, 6),
                text,
            })
        }
        DocumentNode::Paragraph { text } => {
            let text = clean_rich(text);
            let plain = text.to_plain();
            if text.is_empty() || is_noise(&plain) || RE_RULE.is_match(&plain) {
                None
            } else {
                Some(DocumentNode::Paragraph { text })
            }
        }
        DocumentNode::ListItem { kind, depth, text } => {
            let text = clean_rich(text);
            (!text.is_empty()).then_some(DocumentNode::ListItem { kind, depth, text })
        }
        DocumentNode::Table { headers, rows } => {
            let headers: Vec<String> = headers.iter().map(|h| clean_plain(h)).collect();
            let rows: Vec<Vec<String>> = rows
                .into_iter()
                .map(|row| row.iter().map(|c| clean_plain(c)).collect::<Vec<_>>())
                .filter(|row| row.iter().any(|c| !c.is_empty()))
                .collect();
            if rows.is_empty() && headers.iter().all(String::is_empty) {
                None
            } else {
                Some(DocumentNode::Table { headers, rows })
            }
        }
    }
}

/// A heading immediately restating the one before it.
fn is_repeated_heading(prev: &DocumentNode, node: &DocumentNode) -> bool {
    if !prev.is_heading_like() || !node.is_heading_like() {
        return false;
    }
    prev.plain_text().to_lowercase() == node.plain_text().to_lowercase()
}

// ── Inline cleanup ───────────────────────────────────────────────────────────

/// A tag whose attributes, if any, are all `name=value` pairs. `a<b and c>d`
/// is prose, not a tag.
static RE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"</?[A-Za-z][A-Za-z0-9]*(?:\s+[A-Za-z_:][-A-Za-z0-9_:.]*\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'<>=]+))*\s*/?>"#,
    )
    .unwrap()
});
/// Only `**`: a run of underscores is a form blank, not emphasis.
static RE_EMPHASIS_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*").unwrap());
static RE_LEADING_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:#{1,6}|>)\s+").unwrap());

fn clean_plain(text: &str) -> String {
    clean_rich(RichText::plain(text)).to_plain()
}

/// Run the inline rules until nothing changes. Each pass only deletes
/// characters, merges spans or turns whitespace into plain spaces, so the
/// loop terminates, and the fixpoint makes the result idempotent.
fn clean_rich(text: RichText) -> RichText {
    let mut current = text.into_spans();
    loop {
        let next = clean_spans_once(&current);
        if next == current {
            return RichText::from_spans(next);
        }
        current = next;
    }
}

fn clean_spans_once(spans: &[Span]) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    // Start as if after a space so leading whitespace is trimmed.
    let mut after_space = true;

    for span in spans {
        let stripped = strip_markup(&span.text);
        let mut text = String::with_capacity(stripped.len());
        for c in stripped.chars() {
            if c.is_whitespace() {
                if !after_space {
                    text.push(' ');
                    after_space = true;
                }
            } else {
                text.push(c);
                after_space = false;
            }
        }
        if text.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(prev) if prev.bold == span.bold => prev.text.push_str(&text),
            _ => out.push(Span {
                text,
                bold: span.bold,
            }),
        }
    }

    if let Some(last) = out.last_mut() {
        if last.text.ends_with(' ') {
            last.text.pop();
        }
    }
    if let Some(first) = out.first_mut() {
        if let Some(m) = RE_LEADING_MARKER.find(&first.text) {
            first.text.replace_range(..m.end(), "");
        }
    }
    out.retain(|s| !s.text.is_empty());
    out
}

fn strip_markup(text: &str) -> String {
    let s = text.replace(INVISIBLE, "");
    let s = RE_TAG.replace_all(&s, "");
    RE_EMPHASIS_MARKER.replace_all(&s, "").into_owned()
}

// ── Tests ────────────────────────────────────────────────────────────────────
