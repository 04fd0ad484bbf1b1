//! Language detection from a content locator.
//!
//! A locator is whatever name the host uses for a content unit, usually a
//! relative path. Only its extension matters here, and only to pick one of
//! a closed set of language families.

use std::path::Path;

use serde::Serialize;

/// Language of a content unit, inferred from its locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
    Java,
    Json,
    Yaml,
    /// Anything else; handled by the generic strategy.
    Other,
}

/// Family of languages sharing one condensing/chunking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageFamily {
    /// Parsed into a syntax tree (Python).
    Structured,
    /// Brace-delimited, handled with regex heuristics (JS/TS/Java).
    Brace,
    /// Structured data (JSON/YAML).
    Data,
    /// Plain text fallback.
    Generic,
}

impl Language {
    /// Every language with a dedicated strategy.
    pub fn all() -> &'static [Language] {
        &[
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Jsx,
            Language::Tsx,
            Language::Java,
            Language::Json,
            Language::Yaml,
        ]
    }

    /// File extensions (without the dot) mapped to this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py", "pyi"],
            Language::JavaScript => &["js", "mjs", "cjs"],
            Language::TypeScript => &["ts"],
            Language::Jsx => &["jsx"],
            Language::Tsx => &["tsx"],
            Language::Java => &["java"],
            Language::Json => &["json"],
            Language::Yaml => &["yaml", "yml"],
            Language::Other => &[],
        }
    }

    pub fn family(&self) -> LanguageFamily {
        match self {
            Language::Python => LanguageFamily::Structured,
            Language::JavaScript
            | Language::TypeScript
            | Language::Jsx
            | Language::Tsx
            | Language::Java => LanguageFamily::Brace,
            Language::Json | Language::Yaml => LanguageFamily::Data,
            Language::Other => LanguageFamily::Generic,
        }
    }

    /// JS/TS flavours, as opposed to Java.
    pub fn is_script(&self) -> bool {
        matches!(
            self,
            Language::JavaScript | Language::TypeScript | Language::Jsx | Language::Tsx
        )
    }

    /// Line comment marker used for annotations added to this language.
    pub fn comment_marker(&self) -> &'static str {
        match self.family() {
            LanguageFamily::Brace => "//",
            _ => "#",
        }
    }

    fn from_extension(ext: &str) -> Language {
        let ext = ext.to_lowercase();
        Language::all()
            .iter()
            .copied()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
            .unwrap_or(Language::Other)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Jsx => "jsx",
            Language::Tsx => "tsx",
            Language::Java => "java",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Other => "other",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    /// Parse a language name or a bare extension (`"python"`, `"py"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if let Some(lang) = Language::all()
            .iter()
            .copied()
            .find(|lang| lang.to_string() == lower)
        {
            return Ok(lang);
        }
        match Language::from_extension(&lower) {
            Language::Other if lower != "other" => Err(format!("unknown language: {}", s)),
            lang => Ok(lang),
        }
    }
}

/// Detect the language of a content unit from its locator.
///
/// Never fails: unknown or missing extensions map to [`Language::Other`].
pub fn detect_language(locator: &str) -> Language {
    Path::new(locator)
        .extension()
        .and_then(|e| e.to_str())
        .map(Language::from_extension)
        .unwrap_or(Language::Other)
}

/// Display name of a locator (its final path component).
pub fn display_name(locator: &str) -> &str {
    Path::new(locator)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(locator)
}
