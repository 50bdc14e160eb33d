//! Markdown-like dialect.
//!
//! Line classification, in priority order:
//!
//! | Line | Node |
//! |------|------|
//! | `#`…`######` + space | `Heading` (level = number of `#`) |
//! | `---`, `***`, `___` | skipped (horizontal rule) |
//! | `•`, `-`, `*`, `+` or `1.`/`1)` + space | `ListItem`; depth from indentation |
//! | `a \| b` followed by a separator or another pipe row | `Table` |
//! | anything else | joined into a `Paragraph` until a blank line |
//!
//! `**bold**` inside paragraphs and list items becomes a bold span. An
//! unmatched `**` stays literal text.

use super::{fit_row, tidy_spans, Degradation, DegradationKind, Parsed};
use crate::document::{DocumentNode, ListKind, NormalizedDocument, RichText, Span};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*?)(?:\s+#+)?\s*$").unwrap());
static RE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[-*_]\s*){3,}$").unwrap());
static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(?:([•\-*+])|(\d{1,3})[.)])\s+(.*)$").unwrap());
static RE_SEPARATOR_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:?-+:?$").unwrap());

/// Parse markdown-like text.
pub fn parse(text: &str) -> Parsed {
    let mut parser = Parser {
        lines: text.lines().collect(),
        nodes: Vec::new(),
        degradations: Vec::new(),
        paragraph: Vec::new(),
        list_indents: Vec::new(),
    };
    parser.run();
    Parsed {
        document: NormalizedDocument::new(parser.nodes),
        degradations: parser.degradations,
    }
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    nodes: Vec<DocumentNode>,
    degradations: Vec<Degradation>,
    /// Plain lines waiting to become one paragraph.
    paragraph: Vec<&'a str>,
    /// Indentation of each open list level.
    list_indents: Vec<usize>,
}

impl<'a> Parser<'a> {
    fn run(&mut self) {
        let mut i = 0;
        while i < self.lines.len() {
            let raw = self.lines[i];
            let line = raw.trim();

            if line.is_empty() {
                self.flush_paragraph();
                i += 1;
                continue;
            }

            if let Some(caps) = RE_HEADING.captures(line) {
                self.end_block();
                let level = caps[1].len() as u8;
                self.nodes
                    .push(DocumentNode::heading(level, inline(&caps[2]).to_plain()));
            } else if RE_RULE.is_match(line) {
                self.end_block();
            } else if let Some(caps) = RE_LIST_ITEM.captures(raw) {
                self.flush_paragraph();
                let kind = if caps.get(2).is_some() {
                    ListKind::Unordered
                } else {
                    ListKind::Ordered
                };
                let depth = self.list_depth(indent_width(&caps[1]));
                self.nodes.push(DocumentNode::ListItem {
                    kind,
                    depth,
                    text: inline(&caps[4]),
                });
            } else if line.contains('|') {
                if self.starts_table(i) {
                    self.end_block();
                    i = self.table(i);
                    continue;
                }
                if is_separator(line) {
                    // A separator with no header row above it carries nothing.
                } else if line.starts_with('|') {
                    self.end_block();
                    self.degrade(i, DegradationKind::LoneTableRow);
                    self.nodes.push(DocumentNode::Paragraph { text: inline(line) });
                } else {
                    self.list_indents.clear();
                    self.paragraph.push(line);
                }
            } else {
                self.list_indents.clear();
                self.paragraph.push(line);
            }
            i += 1;
        }
        self.flush_paragraph();
    }

    /// Flush pending text and close any open list.
    fn end_block(&mut self) {
        self.flush_paragraph();
        self.list_indents.clear();
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let joined = self.paragraph.join(" ");
        self.paragraph.clear();
        let text = inline(&joined);
        if !text.is_empty() {
            self.nodes.push(DocumentNode::Paragraph { text });
        }
    }

    /// Depth of an item at `indent`: deeper indentation opens a level,
    /// shallower closes levels back to the nearest enclosing one.
    fn list_depth(&mut self, indent: usize) -> usize {
        while self.list_indents.last().is_some_and(|&top| indent < top) {
            self.list_indents.pop();
        }
        if self.list_indents.last().map_or(true, |&top| indent > top) {
            self.list_indents.push(indent);
        }
        self.list_indents.len() - 1
    }

    /// A pipe row starts a table when the next line is a separator or
    /// another pipe row.
    fn starts_table(&self, i: usize) -> bool {
        let line = self.lines[i].trim();
        if is_separator(line) {
            return false;
        }
        match self.lines.get(i + 1).map(|l| l.trim()) {
            Some(next) => is_separator(next) || (next.contains('|') && !is_list_item(next)),
            None => false,
        }
    }

    /// Consume a table starting at line `i`; returns the first line after it.
    fn table(&mut self, i: usize) -> usize {
        let headers = split_row(self.lines[i]);
        let width = headers.len();
        let mut rows = Vec::new();
        let mut j = i + 1;
        while let Some(line) = self.lines.get(j).map(|l| l.trim()) {
            if line.is_empty() || !line.contains('|') {
                break;
            }
            if !is_separator(line) {
                rows.push(fit_row(split_row(line), width));
            }
            j += 1;
        }
        self.nodes.push(DocumentNode::Table { headers, rows });
        j
    }

    fn degrade(&mut self, index: usize, kind: DegradationKind) {
        self.degradations.push(Degradation {
            line: index + 1,
            kind,
        });
    }
}

fn is_list_item(line: &str) -> bool {
    RE_LIST_ITEM.is_match(line)
}

/// Tabs count as four columns.
fn indent_width(indent: &str) -> usize {
    indent.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum()
}

/// `---|:---:|---` style row.
fn is_separator(line: &str) -> bool {
    if !line.contains('|') || !line.contains('-') {
        return false;
    }
    split_cells(line)
        .iter()
        .all(|cell| RE_SEPARATOR_CELL.is_match(cell.trim()))
}

/// Cells of a pipe row with inline markup removed.
fn split_row(line: &str) -> Vec<String> {
    split_cells(line)
        .iter()
        .map(|cell| inline(cell).to_plain())
        .collect()
}

/// Split on unescaped `|`, dropping one optional outer pipe on each side.
fn split_cells(line: &str) -> Vec<String> {
    let s = line.trim();
    let s = s.strip_prefix('|').unwrap_or(s);
    let s = if s.ends_with('|') && !s.ends_with("\\|") {
        &s[..s.len() - 1]
    } else {
        s
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Split `**bold**` markers into spans.
fn inline(text: &str) -> RichText {
    let parts: Vec<&str> = text.split("**").collect();
    let last = parts.len() - 1;
    // An odd number of markers leaves the final one without a partner.
    let unmatched = last % 2 == 1;
    let spans = parts
        .iter()
        .enumerate()
        .map(|(k, part)| {
            if unmatched && k == last {
                Span::plain(format!("**{part}"))
            } else if k % 2 == 1 {
                Span::bold(*part)
            } else {
                Span::plain(*part)
            }
        })
        .collect();
    tidy_spans(spans)
}
