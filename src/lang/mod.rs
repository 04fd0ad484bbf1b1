//! Per-language condensing and boundary strategies.
//!
//! Each [`LanguageFamily`] gets one implementation of [`LanguageStrategy`].
//! The condenser and the chunker pick a strategy once per call through
//! [`strategy_for`] and never branch on the language themselves.

mod brace;
mod data;
mod generic;
mod python;

use std::cell::RefCell;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tree_sitter::Parser;

use crate::condenser::CondensingLevel;
use crate::language::{Language, LanguageFamily};
use crate::priority::PriorityLevel;

pub(crate) use brace::{BraceDialect, BraceStrategy};
pub(crate) use data::DataStrategy;
pub(crate) use generic::GenericStrategy;
pub(crate) use python::PythonStrategy;

/// Condensing and chunking capabilities of one language family.
pub(crate) trait LanguageStrategy: Sync {
    /// Reduce `content` at `level`. `level` is never `None` here.
    ///
    /// Must not fail: strategies that parse fall back to the generic
    /// strategy when parsing does.
    fn condense(&self, content: &str, level: CondensingLevel, priority: PriorityLevel) -> String;

    /// Structural spans of `content`, sorted by start line.
    ///
    /// `None` means the family has no boundary notion or the content could
    /// not be analysed; the chunker then packs plain lines.
    fn boundaries(&self, content: &str) -> Option<Vec<Boundary>>;

    /// Keep the outline of an over-budget function: signature, docs and
    /// control flow.
    fn preserve_function_structure(&self, function: &str) -> String {
        let lines = split_lines(function);
        if lines.len() <= 10 {
            return function.to_string();
        }
        let mut kept: Vec<&str> = lines[..5].to_vec();
        kept.push("    // ... implementation ...");
        kept.extend_from_slice(&lines[lines.len() - 2..]);
        kept.join("\n")
    }

    /// Collapse a function to its declaration line and a placeholder.
    fn minimal_function(&self, function: &str) -> String {
        const DECLARATION_MARKERS: &[&str] = &["function", "def", "public", "private"];
        match function
            .split('\n')
            .find(|line| DECLARATION_MARKERS.iter().any(|m| line.contains(m)))
        {
            Some(line) => format!("{}\n    // ... implementation ...", line),
            None => format!("{}\n    # ...", function.split('\n').next().unwrap_or("")),
        }
    }
}

static PYTHON: PythonStrategy = PythonStrategy;
static SCRIPT: BraceStrategy = BraceStrategy::new(BraceDialect::Script);
static JAVA: BraceStrategy = BraceStrategy::new(BraceDialect::Java);
static DATA: DataStrategy = DataStrategy;
static GENERIC: GenericStrategy = GenericStrategy;

/// Select the strategy for a language.
pub(crate) fn strategy_for(language: Language) -> &'static dyn LanguageStrategy {
    match language.family() {
        LanguageFamily::Structured => &PYTHON,
        LanguageFamily::Brace if language == Language::Java => &JAVA,
        LanguageFamily::Brace => &SCRIPT,
        LanguageFamily::Data => &DATA,
        LanguageFamily::Generic => &GENERIC,
    }
}

/// Kind of structural span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoundaryKind {
    Function,
    Class,
    Method,
    Declaration,
}

impl BoundaryKind {
    pub(crate) fn is_callable(self) -> bool {
        matches!(self, BoundaryKind::Function | BoundaryKind::Method)
    }
}

impl std::fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BoundaryKind::Function => "function",
            BoundaryKind::Class => "class",
            BoundaryKind::Method => "method",
            BoundaryKind::Declaration => "declaration",
        };
        f.write_str(s)
    }
}

/// A structurally significant span of source lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Boundary {
    /// 0-indexed first line.
    pub start_line: usize,
    /// 0-indexed last line (inclusive).
    pub end_line: usize,
    pub kind: BoundaryKind,
    pub name: String,
    /// First line of the declaration itself, after any decorators.
    pub signature_start: usize,
    /// Last line of the declaration header (multi-line signatures).
    pub signature_end: usize,
}

impl Boundary {
    /// Boundary whose signature is its first line.
    pub(crate) fn new(start_line: usize, end_line: usize, kind: BoundaryKind, name: impl Into<String>) -> Self {
        Self {
            start_line,
            end_line,
            kind,
            name: name.into(),
            signature_start: start_line,
            signature_end: start_line,
        }
    }

    pub(crate) fn with_signature(mut self, start: usize, end: usize) -> Self {
        self.signature_start = start;
        self.signature_end = end;
        self
    }
}

/// Why a structural parse produced no usable tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum SyntaxError {
    #[error("failed to initialize {language} parser")]
    ParserInit { language: Language },

    #[error("parser returned no tree")]
    NoTree,

    #[error("syntax error near line {}", .row + 1)]
    Invalid { row: usize },
}

/// A regex compiled on first use.
///
/// A pattern that fails to compile behaves as one that never matches, so
/// heuristic extraction degrades instead of panicking.
pub(crate) struct LazyRegex {
    pattern: &'static str,
    cell: OnceLock<Option<Regex>>,
}

impl LazyRegex {
    pub(crate) const fn new(pattern: &'static str) -> Self {
        Self {
            pattern,
            cell: OnceLock::new(),
        }
    }

    pub(crate) fn get(&self) -> Option<&Regex> {
        self.cell.get_or_init(|| Regex::new(self.pattern).ok()).as_ref()
    }

    pub(crate) fn is_match(&self, text: &str) -> bool {
        self.get().is_some_and(|re| re.is_match(text))
    }

    /// All non-overlapping matches, in order.
    pub(crate) fn find_all<'t>(&self, text: &'t str) -> Vec<&'t str> {
        match self.get() {
            Some(re) => re.find_iter(text).map(|m| m.as_str()).collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn find_first<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.get()?.find(text).map(|m| m.as_str())
    }

    pub(crate) fn replace_all(&self, text: &str, rep: &str) -> String {
        match self.get() {
            Some(re) => re.replace_all(text, rep).into_owned(),
            None => text.to_string(),
        }
    }
}

// Parsers are not Sync; one cached parser per thread.
thread_local! {
    static PYTHON_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

fn init_python_parser() -> Result<Parser, SyntaxError> {
    let mut p = Parser::new();
    p.set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|_| SyntaxError::ParserInit {
            language: Language::Python,
        })?;
    Ok(p)
}

/// Execute a function with a cached Python parser.
pub(crate) fn with_python_parser<F, R>(f: F) -> Result<R, SyntaxError>
where
    F: FnOnce(&mut Parser) -> Result<R, SyntaxError>,
{
    PYTHON_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(init_python_parser()?);
        }

        let parser = slot.as_mut().ok_or(SyntaxError::ParserInit {
            language: Language::Python,
        })?;
        f(parser)
    })
}

/// Split content into lines the way every strategy counts them.
///
/// Unlike [`str::lines`], a trailing newline yields a final empty line, so
/// `split_lines(s).join("\n") == s`.
pub(crate) fn split_lines(content: &str) -> Vec<&str> {
    content.split('\n').collect()
}
