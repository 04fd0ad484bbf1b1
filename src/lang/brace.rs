//! Heuristic condensing and boundaries for brace-delimited languages.
//!
//! Nothing here parses. Declarations are found with regular expressions and
//! block ends by counting braces, which ignores braces inside strings and
//! comments. Results may under- or over-match; callers get a best-effort
//! outline, not an exact one.

use super::{split_lines, Boundary, BoundaryKind, LanguageStrategy, LazyRegex};
use crate::condenser::CondensingLevel;
use crate::priority::PriorityLevel;

const MAX_PER_CATEGORY: usize = 10;
const MAX_JAVA_IMPORTS: usize = 5;
const MAX_OUTLINE_ITEMS: usize = 5;

static LINE_COMMENT: LazyRegex = LazyRegex::new(r"(?m)//.*$");
static BLOCK_COMMENT: LazyRegex = LazyRegex::new(r"(?s)/\*.*?\*/");
static BLANK_RUN: LazyRegex = LazyRegex::new(r"\n\s*\n");

static SCRIPT_FUNCTION: LazyRegex =
    LazyRegex::new(r"(?:export\s+)?(?:async\s+)?function\s+\w+\([^)]*\)");
static SCRIPT_CLASS: LazyRegex = LazyRegex::new(r"(?:export\s+)?class\s+\w+(?:\s+extends\s+\w+)?");
static SCRIPT_EXPORT: LazyRegex =
    LazyRegex::new(r"export\s+(?:default\s+)?(?:const|let|var|function|class)\s+\w+");
static SCRIPT_EXPORT_LINE: LazyRegex = LazyRegex::new(r"export\s+.*");

static JAVA_PACKAGE: LazyRegex = LazyRegex::new(r"package\s+[\w.]+;");
static JAVA_IMPORT: LazyRegex = LazyRegex::new(r"import\s+[\w.]+;");
static JAVA_CLASS: LazyRegex = LazyRegex::new(
    r"(?:public\s+)?class\s+\w+(?:\s+extends\s+\w+)?(?:\s+implements\s+[\w,\s]+)?",
);
static JAVA_METHOD: LazyRegex = LazyRegex::new(
    r"(?:public|private|protected)?\s+(?:static\s+)?[\w<>\[\]]+\s+\w+\([^)]*\)",
);
static JAVA_CLASS_NAME: LazyRegex = LazyRegex::new(r"class\s+\w+");

// Declaration openers, matched against single lines. Group 1 is the name.
static SCRIPT_BOUNDARIES: [(LazyRegex, BoundaryKind); 4] = [
    (
        LazyRegex::new(r"^\s*(?:export\s+(?:default\s+)?)?(?:async\s+)?function\s*\*?\s*(\w+)"),
        BoundaryKind::Function,
    ),
    (
        LazyRegex::new(r"^\s*const\s+(\w+)\s*=\s*(?:async\s*)?\("),
        BoundaryKind::Function,
    ),
    (
        LazyRegex::new(r"^\s*export\s+const\s+(\w+)\s*="),
        BoundaryKind::Function,
    ),
    (
        LazyRegex::new(r"^\s*(?:export\s+(?:default\s+)?)?(?:abstract\s+)?class\s+(\w+)"),
        BoundaryKind::Class,
    ),
];

static JAVA_BOUNDARY: LazyRegex = LazyRegex::new(
    r"^\s*(?:public|private|protected)?\s*(?:static\s+)?(?:(?:class|interface)\s+(\w+)|\w+\s+(\w+)\s*\()",
);

/// Which brace-language heuristics to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BraceDialect {
    /// JavaScript, TypeScript, JSX, TSX.
    Script,
    Java,
}

pub(crate) struct BraceStrategy {
    dialect: BraceDialect,
}

impl BraceStrategy {
    pub(crate) const fn new(dialect: BraceDialect) -> Self {
        Self { dialect }
    }
}

fn strip_comments(content: &str) -> String {
    let without_line = LINE_COMMENT.replace_all(content, "");
    let without_block = BLOCK_COMMENT.replace_all(&without_line, "");
    BLANK_RUN.replace_all(&without_block, "\n")
}

fn first_n<'t>(re: &LazyRegex, text: &'t str, n: usize) -> Vec<&'t str> {
    re.find_all(text).into_iter().map(str::trim).take(n).collect()
}

fn condense_script(content: &str, level: CondensingLevel) -> String {
    match level {
        CondensingLevel::None => content.to_string(),
        CondensingLevel::Light => strip_comments(content),
        CondensingLevel::Moderate | CondensingLevel::Heavy => {
            let mut out = first_n(&SCRIPT_EXPORT, content, MAX_PER_CATEGORY);
            out.extend(first_n(&SCRIPT_FUNCTION, content, MAX_PER_CATEGORY));
            out.extend(first_n(&SCRIPT_CLASS, content, MAX_PER_CATEGORY));
            out.join("\n")
        }
        CondensingLevel::Maximum => {
            let exports = first_n(&SCRIPT_EXPORT_LINE, content, MAX_OUTLINE_ITEMS);
            if exports.is_empty() {
                "// JavaScript/TypeScript module".to_string()
            } else {
                exports.join("\n")
            }
        }
    }
}

fn condense_java(content: &str, level: CondensingLevel) -> String {
    match level {
        CondensingLevel::None => content.to_string(),
        CondensingLevel::Light => strip_comments(content),
        CondensingLevel::Moderate | CondensingLevel::Heavy => {
            let mut out: Vec<&str> = JAVA_PACKAGE.find_first(content).into_iter().collect();
            out.extend(first_n(&JAVA_IMPORT, content, MAX_JAVA_IMPORTS));
            out.extend(first_n(&JAVA_CLASS, content, MAX_PER_CATEGORY));
            if level == CondensingLevel::Moderate {
                out.extend(first_n(&JAVA_METHOD, content, MAX_PER_CATEGORY));
            }
            out.join("\n")
        }
        CondensingLevel::Maximum => {
            let mut out: Vec<String> = JAVA_PACKAGE
                .find_first(content)
                .map(str::to_string)
                .into_iter()
                .collect();
            out.extend(
                first_n(&JAVA_CLASS_NAME, content, MAX_OUTLINE_ITEMS)
                    .into_iter()
                    .map(|c| format!("// {}", c)),
            );
            out.join("\n")
        }
    }
}

/// Line index where the block opened at or after `start` closes.
///
/// Counts `{`/`}` from `start`; returns the last line if the block never
/// closes.
pub(crate) fn find_block_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i64 = 0;
    let mut opened = false;

    for (i, line) in lines.iter().enumerate().skip(start) {
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => {
                    depth -= 1;
                    if opened && depth == 0 {
                        return i;
                    }
                }
                _ => {}
            }
        }
    }

    lines.len().saturating_sub(1)
}

fn script_declaration(line: &str) -> Option<(BoundaryKind, String)> {
    SCRIPT_BOUNDARIES.iter().find_map(|(re, kind)| {
        let caps = re.get()?.captures(line)?;
        Some((*kind, caps.get(1)?.as_str().to_string()))
    })
}

fn java_declaration(line: &str) -> Option<(BoundaryKind, String)> {
    let caps = JAVA_BOUNDARY.get()?.captures(line.trim())?;
    let name = caps.get(1).or_else(|| caps.get(2))?.as_str().to_string();
    Some((BoundaryKind::Declaration, name))
}

impl LanguageStrategy for BraceStrategy {
    fn condense(&self, content: &str, level: CondensingLevel, _priority: PriorityLevel) -> String {
        match self.dialect {
            BraceDialect::Script => condense_script(content, level),
            BraceDialect::Java => condense_java(content, level),
        }
    }

    fn boundaries(&self, content: &str) -> Option<Vec<Boundary>> {
        let lines = split_lines(content);
        let detect = match self.dialect {
            BraceDialect::Script => script_declaration,
            BraceDialect::Java => java_declaration,
        };

        let boundaries = lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| {
                let (kind, name) = detect(line)?;
                Some(Boundary::new(i, find_block_end(&lines, i), kind, name))
            })
            .collect();
        Some(boundaries)
    }
}
