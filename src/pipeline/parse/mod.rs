//! Structure parsing: model text → [`NormalizedDocument`].
//!
//! Models answer in one of two conventions, fixed per model:
//!
//! - [`Dialect::Markdown`] — `#` headings, `**bold**`, `-`/`•`/`1.` lists,
//!   pipe tables. Handled by [`markdown`].
//! - [`Dialect::Markup`] — HTML-ish `<h1>`, `<p>`, `<ul><li>`, `<table>`.
//!   Handled by [`markup`].
//!
//! The two parsers share nothing but their output type. Each is single-pass
//! and never fails: text it cannot place degrades to a `Paragraph` node and
//! a [`Degradation`] is recorded. Degradations are diagnostics for logs and
//! session stats, never errors.

pub mod markdown;
pub mod markup;

use crate::document::{NormalizedDocument, RichText, Span};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output convention of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Markdown-like (the default).
    #[default]
    Markdown,
    /// HTML-like tags.
    Markup,
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Dialect::Markdown),
            "markup" | "html" => Ok(Dialect::Markup),
            other => Err(format!(
                "unknown dialect '{other}' (expected 'markdown' or 'markup')"
            )),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Markdown => "markdown",
            Dialect::Markup => "markup",
        })
    }
}

/// Why a piece of text fell back to a plain paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradationKind {
    /// A pipe row with no neighbouring row or separator.
    LoneTableRow,
    /// A tag name the markup parser does not know; kept as text.
    UnknownTag(String),
    /// A `<` that does not open a well-formed tag; kept as text.
    MalformedTag,
    /// An element still open at the end of the text.
    UnclosedTag(String),
    /// A list item outside any list.
    OrphanListItem,
    /// A table cell or row outside any table, or text between table cells.
    OrphanTableContent,
}

impl fmt::Display for DegradationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradationKind::LoneTableRow => write!(f, "lone table row"),
            DegradationKind::UnknownTag(name) => write!(f, "unknown tag <{name}>"),
            DegradationKind::MalformedTag => write!(f, "malformed tag"),
            DegradationKind::UnclosedTag(name) => write!(f, "unclosed <{name}>"),
            DegradationKind::OrphanListItem => write!(f, "list item outside a list"),
            DegradationKind::OrphanTableContent => write!(f, "table content outside a table"),
        }
    }
}

/// A recorded best-effort fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradation {
    /// 1-based line of the input where it happened.
    pub line: usize,
    pub kind: DegradationKind,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

/// A parsed document plus what had to be degraded to get it.
#[derive(Debug, Clone, Default)]
pub struct Parsed {
    pub document: NormalizedDocument,
    pub degradations: Vec<Degradation>,
}

/// Parse model text into a document.
pub fn parse(text: &str, dialect: Dialect) -> NormalizedDocument {
    parse_with_report(text, dialect).document
}

/// Parse model text, also returning the recorded degradations.
pub fn parse_with_report(text: &str, dialect: Dialect) -> Parsed {
    match dialect {
        Dialect::Markdown => markdown::parse(text),
        Dialect::Markup => markup::parse(text),
    }
}

// ── Shared helpers ───────────────────────────────────────────────────────

/// Fit a table row to `width` cells: pad short rows with empty cells and fold
/// overflow into the last cell so no text is lost.
pub(crate) fn fit_row(mut cells: Vec<String>, width: usize) -> Vec<String> {
    if width == 0 {
        return cells;
    }
    if cells.len() > width {
        let overflow = cells.split_off(width - 1);
        cells.push(overflow.join(" | "));
    }
    cells.resize(width, String::new());
    cells
}

/// Collapse whitespace runs to single spaces, trim the ends and merge
/// adjacent spans with equal emphasis.
pub(crate) fn tidy_spans(spans: Vec<Span>) -> RichText {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    let mut after_space = true;
    for span in spans {
        let mut text = String::with_capacity(span.text.len());
        for c in span.text.chars() {
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
    out.retain(|s| !s.text.is_empty());
    RichText::from_spans(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_from_str() {
        assert_eq!("HTML".parse::<Dialect>().unwrap(), Dialect::Markup);
        assert_eq!("md".parse::<Dialect>().unwrap(), Dialect::Markdown);
        assert!("latex".parse::<Dialect>().is_err());
        assert_eq!(Dialect::default().to_string(), "markdown");
    }

    #[test]
    fn fit_row_pads_and_folds() {
        let row = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(fit_row(row(&["a"]), 3), row(&["a", "", ""]));
        assert_eq!(fit_row(row(&["a", "b", "c", "d"]), 2), row(&["a", "b | c | d"]));
        assert_eq!(fit_row(row(&["a", "b"]), 2), row(&["a", "b"]));
    }

    #[test]
    fn tidy_spans_collapses_and_merges() {
        let rich = tidy_spans(vec![
            Span::plain("  a \n b "),
            Span::plain(" c"),
            Span::bold("  "),
            Span::bold("d  "),
        ]);
        assert_eq!(
            rich.spans(),
            &[Span::plain("a b c"), Span::bold(" d")]
        );
    }

    #[test]
    fn both_dialects_produce_the_same_nodes() {
        let md = parse("# Fees\n\n- one\n- two", Dialect::Markdown);
        let html = parse(
            "<h1>Fees</h1><ul><li>one</li><li>two</li></ul>",
            Dialect::Markup,
        );
        assert_eq!(md, html);
    }
}
