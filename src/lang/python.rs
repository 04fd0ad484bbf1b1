//! Python condensing and boundaries using tree-sitter.
//!
//! The syntax tree is converted into a small owned outline ([`PyModule`])
//! right after parsing; everything downstream works on that outline plus the
//! original source lines. A tree containing any error node counts as a
//! failed parse and the caller falls back to plain-text handling.

use std::collections::BTreeSet;

use tracing::debug;
use tree_sitter::Node;

use super::{split_lines, with_python_parser, Boundary, BoundaryKind, GenericStrategy, LanguageStrategy, SyntaxError};
use crate::condenser::CondensingLevel;
use crate::priority::PriorityLevel;

/// Members whose signatures survive moderate condensing of a class.
const IMPORTANT_MEMBERS: &[&str] = &[
    "__init__", "__call__", "__enter__", "__exit__", "main", "run", "execute",
];

/// Members whose signatures survive heavy condensing of a class.
const ESSENTIAL_MEMBERS: &[&str] = &["__init__", "__call__", "main"];

/// Import markers kept by heavy condensing.
const ESSENTIAL_IMPORTS: &[&str] = &["from __future__", "import os", "import sys"];

const MAX_IMPORTS: usize = 10;
const MAX_ESSENTIAL_IMPORTS: usize = 5;
const MAX_LISTED_METHODS: usize = 5;
const MAX_LISTED_FUNCTIONS: usize = 10;

const CONTROL_FLOW_PREFIXES: &[&str] = &[
    "if ", "elif ", "else:", "for ", "while ", "try:", "except", "finally:",
];
const TERMINAL_KEYWORDS: &[&str] = &["return", "raise", "yield", "assert"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefKind {
    Function,
    Class,
}

/// A top-level class or function, or a method.
#[derive(Debug, Clone)]
struct Definition {
    kind: DefKind,
    name: String,
    /// First line, decorators included.
    start_row: usize,
    /// Line of the `def`/`class` keyword.
    def_row: usize,
    /// Line holding the `:` that opens the body.
    header_end_row: usize,
    end_row: usize,
    docstring: Option<String>,
    /// Methods, for classes.
    members: Vec<Definition>,
}

/// Owned outline of a parsed module.
#[derive(Debug, Default)]
struct PyModule {
    docstring: Option<String>,
    /// Row spans of top-level import statements.
    imports: Vec<(usize, usize)>,
    definitions: Vec<Definition>,
    /// Rows on which a comment node starts.
    comment_rows: BTreeSet<usize>,
}

fn parse_module(content: &str) -> Result<PyModule, SyntaxError> {
    with_python_parser(|parser| {
        let tree = parser.parse(content, None).ok_or(SyntaxError::NoTree)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(SyntaxError::Invalid {
                row: first_error_row(root),
            });
        }
        Ok(build_module(root, content))
    })
}

fn first_error_row(root: Node) -> usize {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return node.start_position().row;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    root.start_position().row
}

fn node_text<'a>(node: Node, content: &'a str) -> &'a str {
    &content[node.byte_range()]
}

fn build_module(root: Node, content: &str) -> PyModule {
    let mut module = PyModule::default();
    let mut first_statement = true;

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "comment" {
            continue;
        }
        if first_statement {
            first_statement = false;
            if let Some(doc) = statement_docstring(child, content) {
                module.docstring = Some(doc);
                continue;
            }
        }
        match child.kind() {
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                module
                    .imports
                    .push((child.start_position().row, child.end_position().row));
            }
            "function_definition" | "class_definition" | "decorated_definition" => {
                if let Some(def) = extract_definition(child, content) {
                    module.definitions.push(def);
                }
            }
            _ => {}
        }
    }

    collect_comment_rows(root, &mut module.comment_rows);
    module
}

fn collect_comment_rows(root: Node, rows: &mut BTreeSet<usize>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "comment" {
            rows.insert(node.start_position().row);
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
}

fn extract_definition(node: Node, content: &str) -> Option<Definition> {
    if node.kind() == "decorated_definition" {
        let inner = node.child_by_field_name("definition")?;
        let mut def = extract_definition(inner, content)?;
        def.start_row = node.start_position().row;
        return Some(def);
    }

    let kind = match node.kind() {
        "function_definition" => DefKind::Function,
        "class_definition" => DefKind::Class,
        _ => return None,
    };

    let name = node_text(node.child_by_field_name("name")?, content).to_string();
    let def_row = node.start_position().row;

    // The body-opening `:` is a direct child; annotation colons sit inside
    // the parameter list.
    let mut cursor = node.walk();
    let header_end_row = node
        .children(&mut cursor)
        .find(|c| c.kind() == ":")
        .map(|c| c.start_position().row)
        .unwrap_or(def_row);

    let body = node.child_by_field_name("body");
    let docstring = body.and_then(|b| block_docstring(b, content));

    let mut members = Vec::new();
    if kind == DefKind::Class {
        if let Some(body) = body {
            let mut cursor = body.walk();
            for child in body.named_children(&mut cursor) {
                if let Some(member) = extract_definition(child, content) {
                    if member.kind == DefKind::Function {
                        members.push(member);
                    }
                }
            }
        }
    }

    Some(Definition {
        kind,
        name,
        start_row: node.start_position().row,
        def_row,
        header_end_row,
        end_row: node.end_position().row,
        docstring,
        members,
    })
}

fn block_docstring(block: Node, content: &str) -> Option<String> {
    let mut cursor = block.walk();
    let first = block
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment")?;
    statement_docstring(first, content)
}

fn statement_docstring(statement: Node, content: &str) -> Option<String> {
    if statement.kind() != "expression_statement" {
        return None;
    }
    let string = statement.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    Some(clean_docstring(strip_quotes(node_text(string, content))))
}

fn strip_quotes(literal: &str) -> &str {
    let body = literal.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = body
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner;
        }
    }
    body
}

/// Normalise docstring indentation: first line trimmed, common indent of
/// the remaining lines removed, surrounding blank lines dropped.
fn clean_docstring(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.trim().to_string()
            } else {
                line.get(indent..).unwrap_or("").trim_end().to_string()
            }
        })
        .collect();

    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    cleaned.join("\n")
}

fn row_span(lines: &[&str], start: usize, end: usize) -> String {
    if lines.is_empty() || start >= lines.len() {
        return String::new();
    }
    let end = end.min(lines.len() - 1);
    lines[start..=end].join("\n")
}

fn signature(def: &Definition, lines: &[&str]) -> String {
    row_span(lines, def.def_row, def.header_end_row)
}

/// Comment lines dropped by light condensing. `#` followed by a digit
/// (`#1 ...`, numbered notes) is kept.
fn is_standalone_comment(trimmed: &str) -> bool {
    trimmed
        .strip_prefix('#')
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_digit()))
}

fn light(content: &str, module: &PyModule) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for (row, line) in split_lines(content).into_iter().enumerate() {
        let trimmed = line.trim();
        if is_standalone_comment(trimmed) && module.comment_rows.contains(&row) {
            continue;
        }
        if trimmed.is_empty() && kept.last().is_some_and(|l| l.trim().is_empty()) {
            continue;
        }
        kept.push(line);
    }
    kept.join("\n")
}

fn moderate(content: &str, module: &PyModule, priority: PriorityLevel) -> String {
    let lines = split_lines(content);
    let mut out: Vec<String> = Vec::new();

    if let Some(doc) = module.docstring.as_ref().filter(|_| priority.is_important()) {
        out.push(format!("\"\"\"{}\"\"\"", doc));
        out.push(String::new());
    }

    if !module.imports.is_empty() {
        out.extend(
            module
                .imports
                .iter()
                .take(MAX_IMPORTS)
                .map(|&(start, end)| row_span(&lines, start, end)),
        );
        if module.imports.len() > MAX_IMPORTS {
            out.push(format!(
                "# ... and {} more imports",
                module.imports.len() - MAX_IMPORTS
            ));
        }
        out.push(String::new());
    }

    for def in &module.definitions {
        out.push(signature(def, &lines));
        if let Some(doc) = def.docstring.as_ref().filter(|_| priority.is_important()) {
            out.push(format!("    \"\"\"{}\"\"\"", doc));
        }
        if def.kind == DefKind::Class {
            for member in &def.members {
                if priority == PriorityLevel::Critical
                    || IMPORTANT_MEMBERS.contains(&member.name.as_str())
                {
                    out.push(signature(member, &lines));
                }
            }
        }
        out.push(String::new());
    }

    out.join("\n")
}

fn heavy(content: &str, module: &PyModule) -> String {
    let lines = split_lines(content);
    let mut out: Vec<String> = Vec::new();

    let essential: Vec<String> = module
        .imports
        .iter()
        .map(|&(start, end)| row_span(&lines, start, end))
        .filter(|text| {
            let lower = text.to_lowercase();
            ESSENTIAL_IMPORTS.iter().any(|marker| lower.contains(marker))
        })
        .take(MAX_ESSENTIAL_IMPORTS)
        .collect();
    if !essential.is_empty() {
        out.extend(essential);
        out.push(String::new());
    }

    for def in &module.definitions {
        out.push(signature(def, &lines));
        if def.kind == DefKind::Class {
            for member in &def.members {
                if ESSENTIAL_MEMBERS.contains(&member.name.as_str()) {
                    out.push(signature(member, &lines));
                }
            }
            out.push(String::new());
        }
    }

    out.join("\n")
}

fn maximum(module: &PyModule) -> String {
    let mut classes = Vec::new();
    let mut functions = Vec::new();

    for def in &module.definitions {
        match def.kind {
            DefKind::Class => {
                let methods: Vec<&str> = def
                    .members
                    .iter()
                    .take(MAX_LISTED_METHODS)
                    .map(|m| m.name.as_str())
                    .collect();
                classes.push(format!("class {}: # Methods: {}", def.name, methods.join(", ")));
            }
            DefKind::Function => functions.push(format!("def {}(...)", def.name)),
        }
    }

    let mut out = Vec::new();
    if !classes.is_empty() {
        out.push("# Classes:".to_string());
        out.extend(classes);
        out.push(String::new());
    }
    if !functions.is_empty() {
        out.push("# Functions:".to_string());
        let total = functions.len();
        out.extend(functions.into_iter().take(MAX_LISTED_FUNCTIONS));
        if total > MAX_LISTED_FUNCTIONS {
            out.push(format!(
                "# ... and {} more functions",
                total - MAX_LISTED_FUNCTIONS
            ));
        }
    }
    out.join("\n")
}

fn leading_word(s: &str) -> &str {
    s.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or("")
}

fn is_def_line(trimmed: &str) -> bool {
    trimmed.starts_with("def ") || trimmed.starts_with("async def ")
}

/// Span from the first decorator; signature from the `def`/`class` line
/// through the body-opening colon.
fn definition_boundary(def: &Definition, kind: BoundaryKind, name: String) -> Boundary {
    Boundary::new(def.start_row, def.end_row, kind, name).with_signature(def.def_row, def.header_end_row)
}

/// Python strategy: tree-sitter outline, generic fallback on parse failure.
pub(crate) struct PythonStrategy;

impl LanguageStrategy for PythonStrategy {
    fn condense(&self, content: &str, level: CondensingLevel, priority: PriorityLevel) -> String {
        let module = match parse_module(content) {
            Ok(module) => module,
            Err(e) => {
                debug!(error = %e, ?level, "python parse failed; using generic condensing");
                return GenericStrategy.condense(content, level, priority);
            }
        };

        match level {
            CondensingLevel::None => content.to_string(),
            CondensingLevel::Light => light(content, &module),
            CondensingLevel::Moderate => moderate(content, &module, priority),
            CondensingLevel::Heavy => heavy(content, &module),
            CondensingLevel::Maximum => maximum(&module),
        }
    }

    fn boundaries(&self, content: &str) -> Option<Vec<Boundary>> {
        let module = match parse_module(content) {
            Ok(module) => module,
            Err(e) => {
                debug!(error = %e, "python parse failed; no boundaries");
                return None;
            }
        };

        let mut boundaries = Vec::new();
        for def in &module.definitions {
            let kind = match def.kind {
                DefKind::Function => BoundaryKind::Function,
                DefKind::Class => BoundaryKind::Class,
            };
            boundaries.push(definition_boundary(def, kind, def.name.clone()));
            for member in &def.members {
                boundaries.push(definition_boundary(
                    member,
                    BoundaryKind::Method,
                    format!("{}.{}", def.name, member.name),
                ));
            }
        }
        boundaries.sort_by_key(|b| b.start_line);
        Some(boundaries)
    }

    fn preserve_function_structure(&self, function: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut paren_depth: i32 = 0;
        let mut docstring_quote: Option<&str> = None;
        let mut seen_def = false;

        for line in function.split('\n') {
            let trimmed = line.trim();

            if !seen_def && trimmed.starts_with('@') {
                out.push(line.to_string());
                continue;
            }

            if paren_depth > 0 {
                out.push(line.to_string());
                paren_depth += paren_delta(line);
                continue;
            }

            if is_def_line(trimmed) {
                out.push(line.to_string());
                seen_def = true;
                paren_depth = paren_delta(line).max(0);
                continue;
            }

            if let Some(quote) = docstring_quote {
                out.push(line.to_string());
                if line.contains(quote) {
                    docstring_quote = None;
                }
                continue;
            }

            if let Some(quote) = ["\"\"\"", "'''"]
                .into_iter()
                .find(|q| trimmed.starts_with(q))
            {
                out.push(line.to_string());
                if trimmed.matches(quote).count() < 2 {
                    docstring_quote = Some(quote);
                }
                continue;
            }

            if TERMINAL_KEYWORDS.contains(&leading_word(trimmed))
                || CONTROL_FLOW_PREFIXES.iter().any(|p| trimmed.starts_with(p))
            {
                out.push(line.to_string());
            } else if !trimmed.is_empty() && !trimmed.starts_with('#') {
                let indent = &line[..line.len() - line.trim_start().len()];
                out.push(format!("{}# ... implementation details ...", indent));
                break;
            }
        }

        out.join("\n")
    }

    fn minimal_function(&self, function: &str) -> String {
        match function.split('\n').find(|l| is_def_line(l.trim())) {
            Some(line) => format!("{}\n    # ... implementation ...", line),
            None => fallback_minimal(function),
        }
    }
}

fn paren_delta(line: &str) -> i32 {
    line.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

fn fallback_minimal(function: &str) -> String {
    let first = function.split('\n').next().unwrap_or("");
    format!("{}\n    # ...", first)
}
