//! # AST Utilities Module
//!
//! Parses Python source through ast-grep and keeps the raw bytes, the byte
//! offset of the parsed body and a line index together, so node ranges can be
//! turned into file spans.

use ast_grep_core::{AstGrep, Node, tree_sitter::StrDoc};
use ast_grep_language::SupportLang as Language;

use crate::errors::ServiceError;
use crate::patch::LineIndex;
use crate::types::Span;

const UTF8_BOM: &str = "\u{feff}";

pub type PyNode<'r> = Node<'r, StrDoc<Language>>;

/// A successfully parsed Python file.
pub struct ParsedSource<'a> {
    raw: &'a [u8],
    body: &'a str,
    ast: AstGrep<StrDoc<Language>>,
    body_offset: usize,
    index: LineIndex,
}

impl<'a> ParsedSource<'a> {
    /// Decode and parse raw file bytes.
    ///
    /// Errors carry an empty path; callers attach the file path with
    /// [`ServiceError::with_path`].
    pub fn parse(raw: &'a [u8]) -> Result<Self, ServiceError> {
        let text = std::str::from_utf8(raw).map_err(|e| ServiceError::UnreadableFile {
            path: Default::default(),
            reason: format!("not valid UTF-8: {e}"),
        })?;
        let body = text.strip_prefix(UTF8_BOM).unwrap_or(text);
        let body_offset = text.len() - body.len();

        let parsed = Self {
            raw,
            body,
            ast: AstGrep::new(body, Language::Python),
            body_offset,
            index: LineIndex::new(raw),
        };

        if let Some(offset) = parsed.first_error_offset() {
            let (line, column) = parsed.index.position(offset);
            return Err(ServiceError::UnparseableFile {
                path: Default::default(),
                line,
                column,
            });
        }

        Ok(parsed)
    }

    fn first_error_offset(&self) -> Option<usize> {
        self.ast
            .root()
            .dfs()
            .find(|node| node.kind() == "ERROR" || node.is_missing())
            .map(|node| node.range().start + self.body_offset)
    }

    pub fn root(&self) -> PyNode<'_> {
        self.ast.root()
    }

    /// Source text of a node byte range (as returned by `Node::range`).
    pub fn text(&self, range: std::ops::Range<usize>) -> &'a str {
        self.body.get(range).unwrap_or_default()
    }

    pub fn index(&self) -> &LineIndex {
        &self.index
    }

    /// File span covered by a node.
    pub fn span_of(&self, node: &PyNode<'_>) -> Span {
        let range = node.range();
        self.index
            .span(range.start + self.body_offset..range.end + self.body_offset)
    }

    /// Trimmed text of a 1-based line.
    pub fn line_text(&self, line: usize) -> String {
        String::from_utf8_lossy(self.index.line(self.raw, line))
            .trim()
            .to_string()
    }

    /// Indented dump of the syntax tree, for diagnosing skipped files.
    pub fn ast_debug_string(&self) -> String {
        build_ast_string(self.ast.root(), 0)
    }
}

/// Build a string representation of the AST
pub fn build_ast_string(node: PyNode<'_>, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    let mut result = format!(
        "{}{}[{}:{}]",
        indent,
        node.kind(),
        node.range().start,
        node.range().end
    );

    // Add node text if it's a leaf node or short
    let node_text = node.text();
    if node.children().count() == 0 || node_text.len() <= 50 {
        let escaped_text = node_text.replace('\n', "\\n").replace('\r', "\\r");
        if !escaped_text.trim().is_empty() {
            result.push_str(&format!(" \"{escaped_text}\""));
        }
    }

    result.push('\n');

    for child in node.children() {
        result.push_str(&build_ast_string(child, depth + 1));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_source() {
        let src = b"def greet(name):\n    print(f\"Hello {name}!\")\n";
        let parsed = ParsedSource::parse(src).unwrap();
        assert_eq!(parsed.root().kind(), "module");
        assert_eq!(parsed.line_text(2), "print(f\"Hello {name}!\")");
    }

    #[test]
    fn test_syntax_error_reported_with_position() {
        let src = b"x = 1\nprint(\"unterminated\n";
        match ParsedSource::parse(src) {
            Err(ServiceError::UnparseableFile { line, .. }) => assert!(line >= 2),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a syntax error"),
        }
    }

    #[test]
    fn test_invalid_utf8_is_unreadable() {
        let src = b"print('\xff')\n";
        assert!(matches!(
            ParsedSource::parse(src),
            Err(ServiceError::UnreadableFile { .. })
        ));
    }

    #[test]
    fn test_bom_offsets_spans() {
        let src = "\u{feff}print('hi')\n".as_bytes();
        let parsed = ParsedSource::parse(src).unwrap();
        let call = parsed
            .root()
            .dfs()
            .find(|n| n.kind() == "call")
            .unwrap();
        let span = parsed.span_of(&call);
        assert_eq!(span, Span::new(1, 3, 1, 14));
    }

    #[test]
    fn test_ast_debug_string() {
        let parsed = ParsedSource::parse(b"print('x')\n").unwrap();
        let dump = parsed.ast_debug_string();
        assert!(dump.starts_with("module[0:"));
        assert!(dump.contains("call["));
    }
}
