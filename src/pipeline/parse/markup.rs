//! Markup-like dialect: HTML-ish tags mapped onto the shared node set.
//!
//! | Tags | Node |
//! |------|------|
//! | `<title>` | `Title` |
//! | `<h1>`…`<h6>` | `Heading` |
//! | `<p>`, bare text | `Paragraph` |
//! | `<ul>`/`<ol>` + `<li>` | `ListItem`; depth = list nesting |
//! | `<table>` `<tr>` `<th>`/`<td>` | `Table`; the first row is the header |
//! | `<b>`, `<strong>` | bold span |
//!
//! Layout wrappers (`<div>`, `<section>`, …) end the current block; inline
//! wrappers (`<span>`, `<i>`, …) are dropped; `<head>`, `<style>` and
//! `<script>` contents are skipped. Any other tag is kept verbatim as text
//! and recorded as a degradation, as is a `<` that does not close into a tag.
//!
//! The scan is a single forward pass over the text; no tree is built.

use super::{fit_row, tidy_spans, Degradation, DegradationKind, Parsed};
use crate::document::{DocumentNode, ListKind, NormalizedDocument, Span};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static RE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<\s*(/)?\s*([A-Za-z][A-Za-z0-9]*)(?:\s[^<>]*?)?\s*(/)?\s*>").unwrap()
});
static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^<!--.*?-->").unwrap());
static RE_DECLARATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<[!?][^<>]*>").unwrap());
static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z]+);").unwrap());

const BLOCK_WRAPPERS: &[&str] = &[
    "html", "body", "div", "section", "article", "main", "header", "footer", "nav", "aside",
    "blockquote", "center", "hr", "address", "figure", "figcaption",
];
const INLINE_WRAPPERS: &[&str] = &[
    "span", "em", "i", "u", "a", "font", "small", "sup", "sub", "mark", "code", "abbr", "cite",
    "thead", "tbody", "tfoot", "caption", "colgroup", "col", "meta", "img", "link",
];
const SKIPPED: &[&str] = &["head", "style", "script"];

/// Parse markup-like text.
pub fn parse(text: &str) -> Parsed {
    let mut b = Builder::default();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        if !rest.starts_with('<') {
            let end = rest.find('<').unwrap_or(rest.len());
            let chunk = &rest[..end];
            b.text(&decode_entities(chunk));
            b.advance(chunk);
            pos += end;
            continue;
        }

        if let Some(m) = RE_COMMENT
            .find(rest)
            .or_else(|| RE_DECLARATION.find(rest))
        {
            b.advance(m.as_str());
            pos += m.end();
            continue;
        }

        if let Some(caps) = RE_TAG.captures(rest) {
            let raw = caps.get(0).map_or("", |m| m.as_str());
            b.tag(&caps, raw);
            b.advance(raw);
            pos += raw.len();
            continue;
        }

        // A `<` that does not open a tag. Text like "a < b" is not worth reporting.
        if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic() || c == '/') {
            b.degrade(DegradationKind::MalformedTag);
        }
        b.text("<");
        pos += 1;
    }

    b.finish()
}

#[derive(Debug)]
enum BlockKind {
    Title,
    Heading(u8),
    Paragraph,
    Item { kind: ListKind, depth: usize },
}

#[derive(Debug)]
struct Block {
    kind: BlockKind,
    spans: Vec<Span>,
    /// Tag that opened the block; `None` for bare text.
    opened_by: Option<String>,
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Vec<String>>,
    row: Option<Vec<String>>,
    cell: Option<String>,
}

impl Table {
    fn end_cell(&mut self) {
        if let Some(cell) = self.cell.take() {
            let text = cell.split_whitespace().collect::<Vec<_>>().join(" ");
            self.row.get_or_insert_with(Vec::new).push(text);
        }
    }

    fn end_row(&mut self) {
        self.end_cell();
        if let Some(row) = self.row.take() {
            if !row.is_empty() {
                self.rows.push(row);
            }
        }
    }

    fn into_node(mut self) -> Option<DocumentNode> {
        self.end_row();
        if self.rows.is_empty() {
            return None;
        }
        let headers = self.rows.remove(0);
        let width = headers.len();
        let rows = self.rows.into_iter().map(|r| fit_row(r, width)).collect();
        Some(DocumentNode::Table { headers, rows })
    }
}

#[derive(Debug)]
struct Builder {
    nodes: Vec<DocumentNode>,
    degradations: Vec<Degradation>,
    line: usize,
    block: Option<Block>,
    bold: usize,
    lists: Vec<ListKind>,
    table: Option<Table>,
    skip: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            degradations: Vec::new(),
            line: 1,
            block: None,
            bold: 0,
            lists: Vec::new(),
            table: None,
            skip: 0,
        }
    }
}

impl Builder {
    fn advance(&mut self, consumed: &str) {
        self.line += consumed.matches('\n').count();
    }

    fn degrade(&mut self, kind: DegradationKind) {
        self.degradations.push(Degradation {
            line: self.line,
            kind,
        });
    }

    fn in_cell(&self) -> bool {
        self.table.as_ref().is_some_and(|t| t.cell.is_some())
    }

    fn tag(&mut self, caps: &Captures<'_>, raw: &str) {
        let closing = caps.get(1).is_some();
        let name = caps[2].to_ascii_lowercase();

        if SKIPPED.contains(&name.as_str()) {
            if closing {
                self.skip = self.skip.saturating_sub(1);
            } else if caps.get(3).is_none() {
                self.skip += 1;
            }
            return;
        }
        if self.skip > 0 {
            return;
        }
        if is_block_tag(&name) {
            // Inside a cell, block boundaries only separate words.
            if let Some(cell) = self.table.as_mut().and_then(|t| t.cell.as_mut()) {
                cell.push(' ');
            }
        }

        match (name.as_str(), closing) {
            ("b" | "strong", false) => self.bold += 1,
            ("b" | "strong", true) => self.bold = self.bold.saturating_sub(1),
            ("br", _) => self.text(" "),

            ("title", false) => self.start_block(BlockKind::Title, &name),
            ("p", false) => self.start_block(BlockKind::Paragraph, &name),
            ("title" | "p" | "li", true) => self.finish_block(),
            (h, false) if heading_level(h).is_some() => {
                let level = heading_level(h).unwrap_or(1);
                self.start_block(BlockKind::Heading(level), &name);
            }
            (h, true) if heading_level(h).is_some() => self.finish_block(),

            ("ul" | "ol", false) => {
                self.finish_block();
                self.lists.push(if name == "ol" {
                    ListKind::Ordered
                } else {
                    ListKind::Unordered
                });
            }
            ("ul" | "ol", true) => {
                self.finish_block();
                self.lists.pop();
            }
            ("li", false) => {
                let (kind, depth) = match self.lists.last().copied() {
                    Some(kind) => (kind, self.lists.len() - 1),
                    None => {
                        self.degrade(DegradationKind::OrphanListItem);
                        (ListKind::Unordered, 0)
                    }
                };
                self.start_block(BlockKind::Item { kind, depth }, &name);
            }

            ("table", false) => {
                self.finish_block();
                self.finish_table();
                self.table = Some(Table::default());
            }
            ("table", true) => self.finish_table(),
            ("tr", false) => match self.table.as_mut() {
                Some(table) => {
                    table.end_row();
                    table.row = Some(Vec::new());
                }
                None => self.orphan_table_content(),
            },
            ("tr", true) => {
                if let Some(table) = self.table.as_mut() {
                    table.end_row();
                }
            }
            ("th" | "td", false) => match self.table.as_mut() {
                Some(table) => {
                    table.end_cell();
                    table.cell = Some(String::new());
                }
                None => self.orphan_table_content(),
            },
            ("th" | "td", true) => {
                if let Some(table) = self.table.as_mut() {
                    table.end_cell();
                }
            }

            (n, _) if BLOCK_WRAPPERS.contains(&n) => {
                if !self.in_cell() {
                    self.finish_block();
                }
            }
            (n, _) if INLINE_WRAPPERS.contains(&n) => {}

            (_, _) => {
                self.degrade(DegradationKind::UnknownTag(name.clone()));
                self.text(raw);
            }
        }
    }

    fn orphan_table_content(&mut self) {
        self.degrade(DegradationKind::OrphanTableContent);
        self.finish_block();
    }

    fn text(&mut self, text: &str) {
        if self.skip > 0 {
            return;
        }

        if let Some(table) = self.table.as_mut() {
            if table.cell.is_none() {
                if text.trim().is_empty() {
                    return;
                }
                // Text between cells becomes a cell of its own.
                table.cell = Some(String::new());
                self.degrade(DegradationKind::OrphanTableContent);
            }
            if let Some(cell) = self.table.as_mut().and_then(|t| t.cell.as_mut()) {
                cell.push_str(text);
            }
            return;
        }

        if self.block.is_none() {
            if text.trim().is_empty() {
                return;
            }
            self.block = Some(Block {
                kind: BlockKind::Paragraph,
                spans: Vec::new(),
                opened_by: None,
            });
        }
        if let Some(block) = self.block.as_mut() {
            block.spans.push(Span {
                text: text.to_string(),
                bold: self.bold > 0,
            });
        }
    }

    fn start_block(&mut self, kind: BlockKind, tag: &str) {
        if self.in_cell() {
            return;
        }
        self.finish_block();
        self.block = Some(Block {
            kind,
            spans: Vec::new(),
            opened_by: Some(tag.to_string()),
        });
    }

    fn finish_block(&mut self) {
        let Some(block) = self.block.take() else {
            return;
        };
        let text = tidy_spans(block.spans);
        if text.is_empty() {
            return;
        }
        let node = match block.kind {
            BlockKind::Title => DocumentNode::Title {
                text: text.to_plain(),
            },
            BlockKind::Heading(level) => DocumentNode::heading(level, text.to_plain()),
            BlockKind::Paragraph => DocumentNode::Paragraph { text },
            BlockKind::Item { kind, depth } => DocumentNode::ListItem { kind, depth, text },
        };
        self.nodes.push(node);
    }

    fn finish_table(&mut self) {
        if let Some(node) = self.table.take().and_then(Table::into_node) {
            self.nodes.push(node);
        }
    }

    fn finish(mut self) -> Parsed {
        if self.table.is_some() {
            self.degrade(DegradationKind::UnclosedTag("table".into()));
            self.finish_table();
        }
        if let Some(tag) = self.block.as_ref().and_then(|b| b.opened_by.clone()) {
            self.degrade(DegradationKind::UnclosedTag(tag));
        }
        self.finish_block();
        Parsed {
            document: NormalizedDocument::new(self.nodes),
            degradations: self.degradations,
        }
    }
}

fn is_block_tag(name: &str) -> bool {
    matches!(name, "title" | "p" | "li" | "ul" | "ol")
        || heading_level(name).is_some()
        || BLOCK_WRAPPERS.contains(&name)
}

fn heading_level(name: &str) -> Option<u8> {
    match name.as_bytes() {
        [b'h', d @ b'1'..=b'6'] => Some(d - b'0'),
        _ => None,
    }
}

/// Decode character references once; unknown names stay as written.
fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    RE_ENTITY.replace_all(text, |caps: &Captures<'_>| {
        let body = &caps[1];
        let decoded = match body {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => body
                .strip_prefix("#x")
                .or_else(|| body.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| body.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        decoded.map_or_else(|| caps[0].to_string(), String::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RichText;

    fn nodes(text: &str) -> Vec<DocumentNode> {
        parse(text).document.into_nodes()
    }

    fn item(kind: ListKind, depth: usize, text: &str) -> DocumentNode {
        DocumentNode::ListItem {
            kind,
            depth,
            text: RichText::plain(text),
        }
    }

    #[test]
    fn full_document() {
        let text = "<title>Loan</title>\n<h2>Fees</h2>\n<p>The <b>rate</b> is fixed.</p>\n\
                    <ol><li>First<ul><li>Sub</li></ul></li><li>Second</li></ol>\n\
                    <table><tr><th>Fee</th><th>Amount</th></tr>\
                    <tr><td>Processing</td><td>1%</td></tr></table>";
        let parsed = parse(text);
        assert!(parsed.degradations.is_empty());
        assert_eq!(
            parsed.document.into_nodes(),
            vec![
                DocumentNode::Title {
                    text: "Loan".into()
                },
                DocumentNode::heading(2, "Fees"),
                DocumentNode::Paragraph {
                    text: RichText::from_spans(vec![
                        Span::plain("The "),
                        Span::bold("rate"),
                        Span::plain(" is fixed."),
                    ]),
                },
                item(ListKind::Ordered, 0, "First"),
                item(ListKind::Unordered, 1, "Sub"),
                item(ListKind::Ordered, 0, "Second"),
                DocumentNode::Table {
                    headers: vec!["Fee".into(), "Amount".into()],
                    rows: vec![vec!["Processing".into(), "1%".into()]],
                },
            ]
        );
    }

    #[test]
    fn unknown_tags_are_kept_as_text() {
        let parsed = parse("<p>Signed <seal>by registrar</seal></p>");
        assert_eq!(
            parsed.document.into_nodes(),
            vec![DocumentNode::paragraph("Signed <seal>by registrar</seal>")]
        );
        assert_eq!(parsed.degradations.len(), 2);
        assert_eq!(
            parsed.degradations[0].kind,
            DegradationKind::UnknownTag("seal".into())
        );
    }

    #[test]
    fn malformed_tag_is_text() {
        let parsed = parse("<p>a <b c</p><p>x < y</p>");
        assert_eq!(
            parsed.document.into_nodes(),
            vec![
                DocumentNode::paragraph("a <b c"),
                DocumentNode::paragraph("x < y"),
            ]
        );
        assert_eq!(
            parsed.degradations,
            vec![Degradation {
                line: 1,
                kind: DegradationKind::MalformedTag
            }]
        );
    }

    #[test]
    fn bare_text_becomes_paragraphs() {
        assert_eq!(
            nodes("Intro text<h1>T</h1>tail"),
            vec![
                DocumentNode::paragraph("Intro text"),
                DocumentNode::heading(1, "T"),
                DocumentNode::paragraph("tail"),
            ]
        );
    }

    #[test]
    fn entities_and_line_breaks() {
        assert_eq!(
            nodes("<p>Fees &amp; charges&nbsp;apply &#8377;100 &bogus;<br>next</p>"),
            vec![DocumentNode::paragraph(
                "Fees & charges apply ₹100 &bogus; next"
            )]
        );
    }

    #[test]
    fn whitespace_inside_blocks_collapses() {
        assert_eq!(
            nodes("<h3>\n  Terms\n  and Conditions\n</h3>"),
            vec![DocumentNode::heading(3, "Terms and Conditions")]
        );
    }

    #[test]
    fn orphan_list_item_is_top_level() {
        let parsed = parse("<li>loose</li>");
        assert_eq!(
            parsed.document.into_nodes(),
            vec![item(ListKind::Unordered, 0, "loose")]
        );
        assert_eq!(parsed.degradations[0].kind, DegradationKind::OrphanListItem);
    }

    #[test]
    fn unclosed_ragged_table() {
        let parsed = parse("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr>");
        assert_eq!(
            parsed.document.into_nodes(),
            vec![DocumentNode::Table {
                headers: vec!["a".into(), "b".into()],
                rows: vec![vec!["c".into(), "".into()]],
            }]
        );
        assert_eq!(
            parsed.degradations,
            vec![Degradation {
                line: 1,
                kind: DegradationKind::UnclosedTag("table".into())
            }]
        );
    }

    #[test]
    fn degradation_lines_are_counted() {
        let parsed = parse("<p>ok</p>\n\n<blink>x</blink>");
        assert_eq!(parsed.degradations[0].line, 3);
    }

    #[test]
    fn head_and_style_are_skipped() {
        assert_eq!(
            nodes("<!DOCTYPE html><html><head><title>Meta</title></head><style>p { color: red }</style><body><p>x</p></body></html>"),
            vec![DocumentNode::paragraph("x")]
        );
    }

    #[test]
    fn block_tags_inside_cells_stay_in_the_cell() {
        assert_eq!(
            nodes("<table><tr><th>A</th></tr><tr><td><p>one</p><div>two</div></td></tr></table>"),
            vec![DocumentNode::Table {
                headers: vec!["A".into()],
                rows: vec![vec!["one two".into()]],
            }]
        );
    }
}
