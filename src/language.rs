//! Language codes, display names and a script-based detector.
//!
//! The service only needs three things from a language: validate the code a
//! caller sent, print its English name in events, and guess which language a
//! piece of text is written in. A full ISO 639 database is overkill for that;
//! a static table of the languages the prompts are tuned for is enough.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported languages: `(ISO 639-1 code, English name, script)`.
const LANGUAGES: &[(&str, &str, Script)] = &[
    ("en", "English", Script::Latin),
    ("hi", "Hindi", Script::Devanagari),
    ("mr", "Marathi", Script::Devanagari),
    ("ne", "Nepali", Script::Devanagari),
    ("fr", "French", Script::Latin),
    ("de", "German", Script::Latin),
    ("es", "Spanish", Script::Latin),
    ("it", "Italian", Script::Latin),
    ("pt", "Portuguese", Script::Latin),
    ("nl", "Dutch", Script::Latin),
    ("ru", "Russian", Script::Cyrillic),
    ("uk", "Ukrainian", Script::Cyrillic),
    ("ar", "Arabic", Script::Arabic),
    ("ur", "Urdu", Script::Arabic),
    ("zh", "Chinese", Script::Han),
    ("ja", "Japanese", Script::Han),
];

/// Writing system, used for cheap language detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Latin,
    Devanagari,
    Cyrillic,
    Arabic,
    Han,
}

impl Script {
    fn of(c: char) -> Option<Script> {
        match c {
            'a'..='z' | 'A'..='Z' | '\u{00C0}'..='\u{024F}' => Some(Script::Latin),
            '\u{0900}'..='\u{097F}' => Some(Script::Devanagari),
            '\u{0400}'..='\u{04FF}' => Some(Script::Cyrillic),
            '\u{0600}'..='\u{06FF}' => Some(Script::Arabic),
            '\u{3040}'..='\u{30FF}' | '\u{4E00}'..='\u{9FFF}' => Some(Script::Han),
            _ => None,
        }
    }
}

/// A language known to the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    code: &'static str,
    name: &'static str,
    #[serde(skip)]
    script: Script,
}

impl Language {
    pub const ENGLISH: Language = Language {
        code: "en",
        name: "English",
        script: Script::Latin,
    };
    pub const HINDI: Language = Language {
        code: "hi",
        name: "Hindi",
        script: Script::Devanagari,
    };

    /// Look up a language by ISO 639-1 code (case-insensitive).
    pub fn from_code(code: &str) -> Option<Language> {
        let code = code.trim().to_ascii_lowercase();
        LANGUAGES
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|&(code, name, script)| Language { code, name, script })
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn script(&self) -> Script {
        self.script
    }

    /// Source language assumed when the model does not report one.
    ///
    /// The service translates between Hindi and English in both directions,
    /// so the source is the other half of that pair. Any other target is
    /// assumed to come from English.
    pub fn default_source_for(target: Language) -> Language {
        if target == Language::ENGLISH {
            Language::HINDI
        } else {
            Language::ENGLISH
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Dominant script of `text`, by letter count. `None` when no letters match.
pub fn detect_script(text: &str) -> Option<Script> {
    let mut counts = [0usize; 5];
    for c in text.chars() {
        if let Some(script) = Script::of(c) {
            counts[script as usize] += 1;
        }
    }
    let (idx, &best) = counts.iter().enumerate().max_by_key(|&(_, n)| *n)?;
    if best == 0 {
        return None;
    }
    Some(match idx {
        0 => Script::Latin,
        1 => Script::Devanagari,
        2 => Script::Cyrillic,
        3 => Script::Arabic,
        _ => Script::Han,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Language::from_code("HI"), Some(Language::HINDI));
        assert_eq!(Language::from_code(" en "), Some(Language::ENGLISH));
        assert_eq!(Language::from_code("xx"), None);
    }

    #[test]
    fn default_source_pairs_hindi_and_english() {
        assert_eq!(Language::default_source_for(Language::HINDI), Language::ENGLISH);
        assert_eq!(Language::default_source_for(Language::ENGLISH), Language::HINDI);
        let fr = Language::from_code("fr").unwrap();
        assert_eq!(Language::default_source_for(fr), Language::ENGLISH);
    }

    #[test]
    fn detects_devanagari() {
        assert_eq!(detect_script("यह एक परीक्षण है"), Some(Script::Devanagari));
    }

    #[test]
    fn detects_latin_and_mixed() {
        assert_eq!(detect_script("Loan agreement, clause 4"), Some(Script::Latin));
        // Mostly Hindi with an English acronym.
        assert_eq!(detect_script("ऋण समझौता PNB"), Some(Script::Devanagari));
    }

    #[test]
    fn no_letters_is_none() {
        assert_eq!(detect_script("12 34 --"), None);
    }

    #[test]
    fn serializes_code_and_name() {
        let json = serde_json::to_string(&Language::HINDI).unwrap();
        assert_eq!(json, r#"{"code":"hi","name":"Hindi"}"#);
    }
}
