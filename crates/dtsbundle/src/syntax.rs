//! The syntax-tree surface shared by the parser, the rewriter and host
//! implementations.
//!
//! Nodes carry exact byte spans into the original text; sibling spans are
//! disjoint and ordered, and a node's children always fall inside its own
//! span. The rewriter relies on both properties.

use crate::diagnostics::Diagnostic;

/// The closed set of node kinds the rewrite policy can act on.
///
/// Anything the parser does not materialize as a node is plain text
/// between nodes and is always preserved verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    /// The root node covering the whole file
    SourceFile,
    /// A statement with no rewrite-relevant structure of its own
    Statement,
    /// `module`/`namespace`/`global` declaration whose block is recursed into
    ModuleDeclaration,
    /// `import ... from '...'` or `import '...'`
    ImportDeclaration,
    /// `import name = require('...')`
    ImportEqualsDeclaration,
    /// `export ... from '...'` / `export { ... }` / `export *`
    ExportDeclaration,
    /// The `require('...')` reference inside an import-equals declaration
    ExternalModuleReference,
    /// A standalone `declare` modifier keyword (span includes the
    /// whitespace up to the following token, so dropping it does not
    /// leave a double space behind)
    DeclareKeyword,
    /// A module-specifier string literal in import/export position,
    /// quotes included
    StringLiteral,
}

/// One node of the parsed tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: SyntaxKind,
    /// Byte offset of the first character covered by this node
    pub start: usize,
    /// Byte offset one past the last covered character
    pub end: usize,
    /// The referenced module specifier, for import/reference nodes
    pub specifier: Option<String>,
    /// Child nodes in source order
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: SyntaxKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            start,
            end,
            specifier: None,
            children: Vec::new(),
        }
    }

    pub fn with_specifier(kind: SyntaxKind, start: usize, end: usize, specifier: String) -> Self {
        Self {
            kind,
            start,
            end,
            specifier: Some(specifier),
            children: Vec::new(),
        }
    }
}

/// An immutable parsed declaration source.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Slash-normalized absolute file name
    pub file_name: String,
    /// The complete original text
    pub text: String,
    /// Root of the node tree, spanning the whole text
    pub root: Node,
    /// Whether the file has top-level import/export markers and is
    /// therefore an external module rather than a global declaration
    pub external_module_indicator: bool,
    /// Syntactic diagnostics collected while parsing
    pub diagnostics: Vec<Diagnostic>,
    /// Byte offsets of line starts, for position lookups
    line_starts: Vec<usize>,
}

impl SourceFile {
    /// Assemble a parsed source file, converting raw `(offset, message)`
    /// parse errors into positioned diagnostics.
    pub fn new(
        file_name: String,
        text: String,
        root: Node,
        external_module_indicator: bool,
        raw_diagnostics: Vec<(usize, String)>,
    ) -> Self {
        let line_starts = compute_line_starts(&text);
        let diagnostics = raw_diagnostics
            .into_iter()
            .map(|(offset, message)| {
                let (line, character) = position_of(&line_starts, offset);
                Diagnostic::at(file_name.clone(), line, character, message)
            })
            .collect();
        Self {
            file_name,
            text,
            root,
            external_module_indicator,
            diagnostics,
            line_starts,
        }
    }

    /// Zero-based (line, character) of a byte offset.
    pub fn line_and_character(&self, offset: usize) -> (u32, u32) {
        position_of(&self.line_starts, offset)
    }

    /// Whether this file already is a declaration file (`.d.ts`).
    pub fn is_declaration_file(&self) -> bool {
        self.file_name.ends_with(".d.ts")
    }
}

fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (offset, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(offset + 1);
        }
    }
    starts
}

fn position_of(line_starts: &[usize], offset: usize) -> (u32, u32) {
    let line = match line_starts.binary_search(&offset) {
        Ok(line) => line,
        Err(insertion) => insertion - 1,
    };
    (line as u32, (offset - line_starts[line]) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_and_character_lookup() {
        let file = SourceFile::new(
            "/t.d.ts".into(),
            "ab\ncd\n".into(),
            Node::new(SyntaxKind::SourceFile, 0, 6),
            false,
            Vec::new(),
        );
        assert_eq!(file.line_and_character(0), (0, 0));
        assert_eq!(file.line_and_character(1), (0, 1));
        assert_eq!(file.line_and_character(3), (1, 0));
        assert_eq!(file.line_and_character(5), (1, 2));
    }

    #[test]
    fn parse_errors_become_positioned_diagnostics() {
        let file = SourceFile::new(
            "/t.d.ts".into(),
            "a\nb'\n".into(),
            Node::new(SyntaxKind::SourceFile, 0, 5),
            false,
            vec![(3, "unterminated string literal".into())],
        );
        assert_eq!(file.diagnostics.len(), 1);
        assert_eq!(file.diagnostics[0].position, Some((1, 1)));
    }
}
