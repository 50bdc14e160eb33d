//! The immutable input of one translation session.

use crate::error::ValidationError;
use crate::language::Language;
use crate::pipeline::parse::Dialect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which model to call, and the output convention it writes in.
///
/// The dialect is fixed per model: a model that answers in HTML-ish markup
/// will keep doing so across retries, so the parser strategy is chosen once
/// at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSelector {
    id: String,
    dialect: Dialect,
}

impl ModelSelector {
    /// A markdown-dialect model.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dialect: Dialect::Markdown,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

/// Output template requested by the caller.
///
/// Renderers own the visual template; here it only steers the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    /// Body text only; headers, footers and page furniture are dropped.
    #[default]
    Simplified,
    /// Everything on the page, including headers, footers and stamps.
    Detailed,
}

impl FromStr for Template {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simplified" => Ok(Template::Simplified),
            "detailed" => Ok(Template::Detailed),
            _ => Err(ValidationError::UnknownTemplate {
                template: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Template::Simplified => "simplified",
            Template::Detailed => "detailed",
        })
    }
}

/// One document to translate.
///
/// Cheap to clone: the PDF bytes are shared, so every retry and the archival
/// upload see the same buffer without copying it.
#[derive(Clone)]
pub struct TranslationRequest {
    source: Arc<[u8]>,
    target: Language,
    model: ModelSelector,
    template: Template,
}

impl TranslationRequest {
    /// Build a request, resolving the target language code.
    ///
    /// Size and content checks need the translator's limits and run in
    /// [`validate`](Self::validate) when the session is created.
    pub fn new(
        source: impl Into<Arc<[u8]>>,
        target_lang: &str,
        model: ModelSelector,
    ) -> Result<Self, ValidationError> {
        let target =
            Language::from_code(target_lang).ok_or_else(|| ValidationError::UnsupportedLanguage {
                code: target_lang.to_string(),
            })?;
        if model.id().trim().is_empty() {
            return Err(ValidationError::EmptyModel);
        }
        Ok(Self {
            source: source.into(),
            target,
            model,
            template: Template::default(),
        })
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Shared handle to the source bytes.
    pub fn source_shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.source)
    }

    pub fn input_size(&self) -> usize {
        self.source.len()
    }

    pub fn target(&self) -> Language {
        self.target
    }

    pub fn model(&self) -> &ModelSelector {
        &self.model
    }

    pub fn template(&self) -> Template {
        self.template
    }

    /// Reject empty, oversized and non-PDF inputs.
    pub fn validate(&self, max_input_bytes: usize) -> Result<(), ValidationError> {
        if self.source.is_empty() {
            return Err(ValidationError::EmptyInput);
        }
        if self.source.len() > max_input_bytes {
            return Err(ValidationError::InputTooLarge {
                size: self.source.len(),
                limit: max_input_bytes,
            });
        }
        if !self.source.starts_with(b"%PDF") {
            return Err(ValidationError::NotAPdf {
                magic: self.source.iter().take(4).copied().collect(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for TranslationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationRequest")
            .field("source", &format_args!("<{} bytes>", self.source.len()))
            .field("target", &self.target.code())
            .field("model", &self.model)
            .field("template", &self.template)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(len: usize) -> Vec<u8> {
        let mut v = b"%PDF-1.7\n".to_vec();
        v.resize(len.max(9), b' ');
        v
    }

    #[test]
    fn resolves_language() {
        let req = TranslationRequest::new(pdf(20), "hi", ModelSelector::new("m")).unwrap();
        assert_eq!(req.target(), Language::HINDI);
        assert_eq!(req.template(), Template::Simplified);
        assert_eq!(req.input_size(), 20);
    }

    #[test]
    fn rejects_unknown_language() {
        let err = TranslationRequest::new(pdf(20), "klingon", ModelSelector::new("m")).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedLanguage { .. }));
    }

    #[test]
    fn rejects_blank_model() {
        let err = TranslationRequest::new(pdf(20), "en", ModelSelector::new("  ")).unwrap_err();
        assert_eq!(err, ValidationError::EmptyModel);
    }

    #[test]
    fn validate_size_and_magic() {
        let ok = TranslationRequest::new(pdf(100), "en", ModelSelector::new("m")).unwrap();
        assert!(ok.validate(100).is_ok());
        assert_eq!(
            ok.validate(99),
            Err(ValidationError::InputTooLarge {
                size: 100,
                limit: 99
            })
        );

        let empty = TranslationRequest::new(Vec::new(), "en", ModelSelector::new("m")).unwrap();
        assert_eq!(empty.validate(100), Err(ValidationError::EmptyInput));

        let png = TranslationRequest::new(b"\x89PNG....".to_vec(), "en", ModelSelector::new("m"))
            .unwrap();
        assert!(matches!(
            png.validate(100),
            Err(ValidationError::NotAPdf { .. })
        ));
    }

    #[test]
    fn template_parsing() {
        assert_eq!("Detailed".parse::<Template>().unwrap(), Template::Detailed);
        assert!("fancy".parse::<Template>().is_err());
    }

    #[test]
    fn debug_hides_bytes() {
        let req = TranslationRequest::new(pdf(2048), "en", ModelSelector::new("m")).unwrap();
        let dbg = format!("{req:?}");
        assert!(dbg.contains("<2048 bytes>"));
    }
}
