//! The dialect-independent document model handed to renderers.
//!
//! Whatever convention the model wrote in, parsing ends here: an ordered list
//! of [`DocumentNode`]s wrapped in a [`NormalizedDocument`]. Renderers (PDF,
//! DOCX, plain text) depend on this module and nothing upstream of it. They
//! never see raw model text or know which dialect produced it.
//!
//! ## Serialised shape
//!
//! A `NormalizedDocument` serialises as a title, ordered sections (each a
//! heading plus the paragraphs, list items and tables under it) and a
//! plain-text rendering:
//!
//! ```text
//! { "title": "...", "sections": [ { "heading": "...", "level": 2, "nodes": [...] } ], "plain_text": "..." }
//! ```

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

/// A run of text with uniform emphasis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

/// Paragraph or list-item text with optional emphasis spans.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct RichText {
    spans: Vec<Span>,
}

impl RichText {
    /// Unemphasised text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            spans: vec![Span::plain(text)],
        }
    }

    pub fn from_spans(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn into_spans(self) -> Vec<Span> {
        self.spans
    }

    /// The text with emphasis markers dropped.
    pub fn to_plain(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn has_emphasis(&self) -> bool {
        self.spans.iter().any(|s| s.bold && !s.text.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }
}

/// Ordered (`1.`) or unordered (`•`, `-`, `*`) list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Ordered,
    Unordered,
}

/// One structural element of a translated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentNode {
    Title {
        text: String,
    },
    /// `level` is 1–6.
    Heading {
        level: u8,
        text: String,
    },
    Paragraph {
        text: RichText,
    },
    /// `depth` 0 is a top-level item.
    ListItem {
        kind: ListKind,
        depth: usize,
        text: RichText,
    },
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl DocumentNode {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        DocumentNode::Heading {
            level: level.clamp(1, 6),
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        DocumentNode::Paragraph {
            text: RichText::plain(text),
        }
    }

    /// Title and heading nodes.
    pub fn is_heading_like(&self) -> bool {
        matches!(self, DocumentNode::Title { .. } | DocumentNode::Heading { .. })
    }

    /// Flattened text of the node; table cells are joined with `" | "`.
    pub fn plain_text(&self) -> String {
        match self {
            DocumentNode::Title { text } | DocumentNode::Heading { text, .. } => text.clone(),
            DocumentNode::Paragraph { text } | DocumentNode::ListItem { text, .. } => {
                text.to_plain()
            }
            DocumentNode::Table { headers, rows } => std::iter::once(headers)
                .chain(rows.iter())
                .map(|row| row.join(" | "))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A run of nodes under one heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section<'a> {
    /// `None` for content that precedes the first heading.
    pub heading: Option<&'a str>,
    /// Heading level; 0 for the untitled preamble.
    pub level: u8,
    pub nodes: Vec<&'a DocumentNode>,
}

/// The finished, immutable document produced by a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedDocument {
    nodes: Vec<DocumentNode>,
}

impl NormalizedDocument {
    pub fn new(nodes: Vec<DocumentNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[DocumentNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<DocumentNode> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Document title.
    ///
    /// The first `Title` node wins. Otherwise the first level-1 heading, and
    /// failing that a heading or short (< 80 chars) paragraph among the first
    /// three nodes; models often open with a bare title line.
    pub fn title(&self) -> Option<String> {
        if let Some(text) = self.nodes.iter().find_map(|n| match n {
            DocumentNode::Title { text } => Some(text),
            _ => None,
        }) {
            return Some(text.clone());
        }
        if let Some(text) = self.nodes.iter().find_map(|n| match n {
            DocumentNode::Heading { level: 1, text } => Some(text),
            _ => None,
        }) {
            return Some(text.clone());
        }
        self.nodes.iter().take(3).find_map(|n| match n {
            DocumentNode::Heading { text, .. } => Some(text.clone()),
            DocumentNode::Paragraph { text } => {
                let plain = text.to_plain();
                (plain.chars().count() < 80).then_some(plain)
            }
            _ => None,
        })
    }

    /// Group nodes under their headings. `Title` nodes are reported through
    /// [`title`](Self::title) and skipped here.
    pub fn sections(&self) -> Vec<Section<'_>> {
        let mut sections: Vec<Section<'_>> = Vec::new();
        for node in &self.nodes {
            match node {
                DocumentNode::Title { .. } => {}
                DocumentNode::Heading { level, text } => sections.push(Section {
                    heading: Some(text.as_str()),
                    level: *level,
                    nodes: Vec::new(),
                }),
                other => {
                    if sections.is_empty() {
                        sections.push(Section {
                            heading: None,
                            level: 0,
                            nodes: Vec::new(),
                        });
                    }
                    if let Some(current) = sections.last_mut() {
                        current.nodes.push(other);
                    }
                }
            }
        }
        sections
    }

    /// All tables, in document order.
    pub fn tables(&self) -> impl Iterator<Item = &DocumentNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n, DocumentNode::Table { .. }))
    }
}

impl Serialize for NormalizedDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("NormalizedDocument", 3)?;
        s.serialize_field("title", &self.title())?;
        s.serialize_field("sections", &self.sections())?;
        s.serialize_field("plain_text", &self.to_plain_text())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NormalizedDocument {
        NormalizedDocument::new(vec![
            DocumentNode::paragraph("Preamble"),
            DocumentNode::heading(1, "Loan Agreement"),
            DocumentNode::paragraph("Body"),
            DocumentNode::heading(2, "Fees"),
            DocumentNode::Table {
                headers: vec!["Fee".into(), "Amount".into()],
                rows: vec![vec!["Processing".into(), "1%".into()]],
            },
        ])
    }

    #[test]
    fn title_prefers_title_node() {
        let mut nodes = sample().into_nodes();
        nodes.push(DocumentNode::Title {
            text: "Sanction Letter".into(),
        });
        assert_eq!(
            NormalizedDocument::new(nodes).title().as_deref(),
            Some("Sanction Letter")
        );
    }

    #[test]
    fn title_falls_back_to_first_h1() {
        assert_eq!(sample().title().as_deref(), Some("Loan Agreement"));
    }

    #[test]
    fn title_falls_back_to_short_opening_line() {
        let doc = NormalizedDocument::new(vec![
            DocumentNode::paragraph("Notice of Change"),
            DocumentNode::paragraph("x".repeat(200)),
        ]);
        assert_eq!(doc.title().as_deref(), Some("Notice of Change"));

        let long = NormalizedDocument::new(vec![DocumentNode::paragraph("y".repeat(120))]);
        assert_eq!(long.title(), None);
    }

    #[test]
    fn sections_group_under_headings() {
        let doc = sample();
        let sections = doc.sections();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].heading, None);
        assert_eq!(sections[0].level, 0);
        assert_eq!(sections[1].heading, Some("Loan Agreement"));
        assert_eq!(sections[1].nodes.len(), 1);
        assert_eq!(sections[2].level, 2);
        assert!(matches!(sections[2].nodes[0], DocumentNode::Table { .. }));
        assert_eq!(doc.tables().count(), 1);
    }

    #[test]
    fn rich_text_plain_and_emphasis() {
        let t = RichText::from_spans(vec![Span::bold("Note:"), Span::plain(" pay on time")]);
        assert_eq!(t.to_plain(), "Note: pay on time");
        assert!(t.has_emphasis());
        assert!(!RichText::plain("x").has_emphasis());
        assert!(RichText::default().is_empty());
    }

    #[test]
    fn heading_level_is_clamped() {
        assert_eq!(
            DocumentNode::heading(9, "x"),
            DocumentNode::Heading {
                level: 6,
                text: "x".into()
            }
        );
    }

    #[test]
    fn serializes_title_sections_and_plain_text() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["title"], "Loan Agreement");
        assert_eq!(json["sections"].as_array().unwrap().len(), 3);
        assert_eq!(json["sections"][2]["nodes"][0]["type"], "table");
        assert!(json["plain_text"].as_str().unwrap().contains("Processing | 1%"));
    }

    #[test]
    fn list_item_keeps_its_kind_beside_the_node_tag() {
        let item = DocumentNode::ListItem {
            kind: ListKind::Ordered,
            depth: 1,
            text: RichText::plain("Repay monthly"),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "list_item");
        assert_eq!(json["kind"], "ordered");
        assert_eq!(json["depth"], 1);
    }
}
