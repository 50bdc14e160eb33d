//! Reference renderers: Markdown and plain text.
//!
//! PDF and DOCX rendering live outside this crate. These two renderers are
//! what the CLI prints and what the `Final` event embeds as `plain_text`.
//! Both read only the [`NormalizedDocument`]; neither knows which dialect the
//! model used.

use crate::document::{DocumentNode, ListKind, NormalizedDocument, RichText};

impl NormalizedDocument {
    /// Render as GitHub-flavoured Markdown, ending with exactly one newline.
    pub fn to_markdown(&self) -> String {
        render(self, Style::Markdown)
    }

    /// Render as plain text: no markup, bullets as `•`, tables as `a | b` rows.
    pub fn to_plain_text(&self) -> String {
        render(self, Style::Plain)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Style {
    Markdown,
    Plain,
}

fn render(doc: &NormalizedDocument, style: Style) -> String {
    let mut out = String::new();
    // Running number per depth for ordered lists.
    let mut counters: Vec<usize> = Vec::new();
    let mut prev_was_list = false;

    for node in doc.nodes() {
        let is_list = matches!(node, DocumentNode::ListItem { .. });
        if !out.is_empty() {
            out.push_str(if is_list && prev_was_list { "\n" } else { "\n\n" });
        }
        if !is_list {
            counters.clear();
        }
        prev_was_list = is_list;

        match node {
            DocumentNode::Title { text } => match style {
                Style::Markdown => {
                    out.push_str("# ");
                    out.push_str(text);
                }
                Style::Plain => out.push_str(text),
            },
            DocumentNode::Heading { level, text } => {
                if style == Style::Markdown {
                    out.push_str(&"#".repeat(*level as usize));
                    out.push(' ');
                }
                out.push_str(text);
            }
            DocumentNode::Paragraph { text } => out.push_str(&inline(text, style)),
            DocumentNode::ListItem { kind, depth, text } => {
                counters.truncate(depth + 1);
                counters.resize(depth + 1, 0);
                out.push_str(&"  ".repeat(*depth));
                match kind {
                    ListKind::Ordered => {
                        counters[*depth] += 1;
                        out.push_str(&format!("{}. ", counters[*depth]));
                    }
                    ListKind::Unordered => {
                        counters[*depth] = 0;
                        out.push_str(if style == Style::Markdown { "- " } else { "• " });
                    }
                }
                out.push_str(&inline(text, style));
            }
            DocumentNode::Table { headers, rows } => match style {
                Style::Markdown => out.push_str(&markdown_table(headers, rows)),
                Style::Plain => out.push_str(&node.plain_text()),
            },
        }
    }

    if style == Style::Markdown {
        out.push('\n');
    }
    out
}

fn inline(text: &RichText, style: Style) -> String {
    if style == Style::Plain {
        return text.to_plain();
    }
    let mut out = String::new();
    for span in text.spans() {
        if !span.bold || span.text.trim().is_empty() {
            out.push_str(&span.text);
            continue;
        }
        // `** x**` is not emphasis in Markdown; keep edge whitespace outside.
        let inner = span.text.trim();
        let lead = &span.text[..span.text.len() - span.text.trim_start().len()];
        let trail = &span.text[span.text.trim_end().len()..];
        out.push_str(lead);
        out.push_str("**");
        out.push_str(inner);
        out.push_str("**");
        out.push_str(trail);
    }
    out
}

fn markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let row = |cells: &[String]| {
        let escaped: Vec<String> = cells.iter().map(|c| c.replace('|', "\\|")).collect();
        format!("| {} |", escaped.join(" | "))
    };
    let mut lines = vec![row(headers)];
    lines.push(format!("|{}", " --- |".repeat(headers.len().max(1))));
    lines.extend(rows.iter().map(|r| row(r)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Span;

    fn doc() -> NormalizedDocument {
        NormalizedDocument::new(vec![
            DocumentNode::heading(1, "Terms"),
            DocumentNode::Paragraph {
                text: RichText::from_spans(vec![
                    Span::bold("Note: "),
                    Span::plain("rates are fixed."),
                ]),
            },
            DocumentNode::ListItem {
                kind: ListKind::Ordered,
                depth: 0,
                text: RichText::plain("First"),
            },
            DocumentNode::ListItem {
                kind: ListKind::Unordered,
                depth: 1,
                text: RichText::plain("Nested"),
            },
            DocumentNode::ListItem {
                kind: ListKind::Ordered,
                depth: 0,
                text: RichText::plain("Second"),
            },
            DocumentNode::Table {
                headers: vec!["Fee".into(), "Amount".into()],
                rows: vec![vec!["A|B".into(), "1%".into()]],
            },
        ])
    }

    #[test]
    fn markdown_rendering() {
        let md = doc().to_markdown();
        assert_eq!(
            md,
            "# Terms\n\n\
             **Note:** rates are fixed.\n\n\
             1. First\n  - Nested\n2. Second\n\n\
             | Fee | Amount |\n| --- | --- |\n| A\\|B | 1% |\n"
        );
    }

    #[test]
    fn plain_rendering() {
        let txt = doc().to_plain_text();
        assert_eq!(
            txt,
            "Terms\n\n\
             Note: rates are fixed.\n\n\
             1. First\n  • Nested\n2. Second\n\n\
             Fee | Amount\nA|B | 1%"
        );
    }

    #[test]
    fn empty_document() {
        let doc = NormalizedDocument::default();
        assert_eq!(doc.to_markdown(), "\n");
        assert_eq!(doc.to_plain_text(), "");
    }

    #[test]
    fn ordered_numbering_restarts_after_paragraph() {
        let item = |t: &str| DocumentNode::ListItem {
            kind: ListKind::Ordered,
            depth: 0,
            text: RichText::plain(t),
        };
        let doc = NormalizedDocument::new(vec![
            item("a"),
            item("b"),
            DocumentNode::paragraph("break"),
            item("c"),
        ]);
        assert_eq!(doc.to_plain_text(), "1. a\n2. b\n\nbreak\n\n1. c");
    }
}
