//! Translation prompts.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the default behaviour (e.g. adding
//!    a rule for signatures or stamps) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    spinning up a real model, making prompt regressions easy to catch.
//!
//! The prompt is assembled from three parts: the translation rules (shared),
//! the formatting rules for the model's [`Dialect`], and the content rules
//! for the requested [`Template`]. Callers can replace the whole thing via
//! [`crate::config::TranslatorConfig::system_prompt`].

use crate::language::Language;
use crate::pipeline::parse::Dialect;
use crate::request::Template;

/// Rules every translation follows. `{source}` and `{target}` are replaced
/// with language names.
const TRANSLATION_RULES: &str = r#"You are a professional document translator specializing in legal, financial, and official documents. Your task is to translate this PDF document from {source} to {target}.

CRITICAL TRANSLATION REQUIREMENTS:
1. COMPLETE TRANSLATION: Translate every sentence and paragraph from beginning to end
2. NO TRUNCATION: Never stop mid-sentence or mid-paragraph
3. PRESERVE STRUCTURE: Keep the document hierarchy, headings, and sections in their original order
4. PRESERVE LEGAL TERMS: Keep legal references, case numbers, dates, and official terminology accurate
5. PROFESSIONAL QUALITY: Use formal language appropriate for official documents

CONTENT PRESERVATION:
- Keep all numbers, dates, amounts, and percentages exactly as they appear
- Preserve proper nouns, company names, and legal entity names
- Maintain reference numbers, case citations, and official codes"#;

const MARKDOWN_FORMAT: &str = r#"FORMATTING (Markdown):
- # for the document title, ## for major sections, ### for subsections
- **bold** for important terms and emphasis
- Numbered lists as 1. 2. 3., bullet points as • or -
- Indent nested list items by two spaces per level
- Tables as pipe rows: a header row, a separator row (---|---), then data rows
- A blank line between paragraphs"#;

const MARKUP_FORMAT: &str = r#"FORMATTING (HTML):
- <h1> for the document title, <h2> for major sections, <h3> for subsections
- <p> for every paragraph, <b> for important terms and emphasis
- <ol>/<ul> with <li> items for lists; nest lists for sub-items
- <table> with <tr>, <th> header cells and <td> data cells
- No <html>, <head>, <body> or <style> wrappers"#;

const SIMPLIFIED_CONTENT: &str = r#"CONTENT SCOPE:
- Translate the body text of the document
- Skip page numbers and headers or footers repeated on every page
- Remove OCR artifacts and scattered characters"#;

const DETAILED_CONTENT: &str = r#"CONTENT SCOPE:
- Translate headers, footers, stamps, and all visible text content
- Keep addresses, contact information, and signatures
- Remove OCR artifacts and scattered characters"#;

const OUTPUT_RULES: &str = r#"OUTPUT REQUIREMENTS:
- Start the translation immediately without any preamble
- Do not wrap the output in code fences
- Do not add explanatory notes or comments
- End only when the entire document has been translated

Begin the complete translation now:"#;

/// Build the system prompt for one request.
pub fn translation_prompt(
    source: Language,
    target: Language,
    dialect: Dialect,
    template: Template,
) -> String {
    let rules = TRANSLATION_RULES
        .replace("{source}", source.name())
        .replace("{target}", target.name());
    let format = match dialect {
        Dialect::Markdown => MARKDOWN_FORMAT,
        Dialect::Markup => MARKUP_FORMAT,
    };
    let content = match template {
        Template::Simplified => SIMPLIFIED_CONTENT,
        Template::Detailed => DETAILED_CONTENT,
    };
    [rules.as_str(), format, content, OUTPUT_RULES].join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_both_languages() {
        let p = translation_prompt(
            Language::ENGLISH,
            Language::HINDI,
            Dialect::Markdown,
            Template::Simplified,
        );
        assert!(p.contains("from English to Hindi"));
        assert!(!p.contains("{source}"));
    }

    #[test]
    fn dialect_selects_format_rules() {
        let md = translation_prompt(
            Language::HINDI,
            Language::ENGLISH,
            Dialect::Markdown,
            Template::Simplified,
        );
        let html = translation_prompt(
            Language::HINDI,
            Language::ENGLISH,
            Dialect::Markup,
            Template::Simplified,
        );
        assert!(md.contains("---|---"));
        assert!(html.contains("<table>"));
        assert!(!html.contains("**bold**"));
    }

    #[test]
    fn template_selects_content_scope() {
        let detailed = translation_prompt(
            Language::HINDI,
            Language::ENGLISH,
            Dialect::Markdown,
            Template::Detailed,
        );
        assert!(detailed.contains("stamps"));
        assert!(detailed.ends_with("Begin the complete translation now:"));
    }
}
