//! Tolerant, purely syntactic parser for declaration sources.
//!
//! The parser only materializes nodes the rewrite policy can act on:
//! statements, `declare` modifier keywords, `require(...)` external module
//! references, and module-specifier string literals in import/export
//! position. Everything else stays uncovered text and is reproduced
//! verbatim by the rewriter. `module`/`namespace`/`global` blocks are
//! recursed into so nested imports are still found; class, interface and
//! enum bodies are consumed raw.

use log::trace;

use crate::syntax::{Node, SourceFile, SyntaxKind};

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident,
    /// String literal; carries the decoded value without quotes
    Str(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn tokenize(text: &str, diagnostics: &mut Vec<(usize, String)>) -> Vec<Token> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let at = |i: usize| chars.get(i).map(|&(_, c)| c);
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if at(i + 1) == Some('/') => {
                while i < chars.len() && chars[i].1 != '\n' {
                    i += 1;
                }
            }
            '/' if at(i + 1) == Some('*') => {
                let open = offset;
                i += 2;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i].1 == '*' && at(i + 1) == Some('/') {
                        i += 2;
                        closed = true;
                        break;
                    }
                    i += 1;
                }
                if !closed {
                    diagnostics.push((open, "unterminated block comment".into()));
                }
            }
            quote @ ('\'' | '"' | '`') => {
                let start = offset;
                let mut value = String::new();
                let mut terminated = false;
                i += 1;
                while i < chars.len() {
                    let (char_offset, c) = chars[i];
                    if c == quote {
                        i += 1;
                        tokens.push(Token {
                            kind: TokenKind::Str(value),
                            start,
                            end: char_offset + c.len_utf8(),
                        });
                        terminated = true;
                        break;
                    }
                    if c == '\\' {
                        i += 1;
                        if let Some(&(_, escaped)) = chars.get(i) {
                            value.push(escaped);
                            i += 1;
                        }
                    } else if c == '\n' && quote != '`' {
                        break;
                    } else {
                        value.push(c);
                        i += 1;
                    }
                }
                if !terminated {
                    diagnostics.push((start, "unterminated string literal".into()));
                }
            }
            c if is_ident_start(c) => {
                let start = offset;
                let mut end = offset + c.len_utf8();
                i += 1;
                while i < chars.len() && is_ident_continue(chars[i].1) {
                    end = chars[i].0 + chars[i].1.len_utf8();
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident,
                    start,
                    end,
                });
            }
            _ => {
                tokens.push(Token {
                    kind: TokenKind::Punct(c),
                    start: offset,
                    end: offset + c.len_utf8(),
                });
                i += 1;
            }
        }
    }
    tokens
}

/// Copyable view of the current token, so loops can inspect it without
/// holding a borrow across `bump`.
#[derive(Debug, Clone, Copy)]
struct Peeked {
    start: usize,
    end: usize,
    punct: Option<char>,
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<(usize, String)>,
    external_module_indicator: bool,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn peeked(&self) -> Option<Peeked> {
        self.peek().map(|token| Peeked {
            start: token.start,
            end: token.end,
            punct: match token.kind {
                TokenKind::Punct(c) => Some(c),
                _ => None,
            },
        })
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 { 0 } else { self.tokens[self.pos - 1].end }
    }

    fn token_text(&self, token: &Token) -> &str {
        &self.text[token.start..token.end]
    }

    fn at_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(token) if token.kind == TokenKind::Ident && self.token_text(token) == word)
    }

    fn at_ident(&self) -> bool {
        matches!(self.peek(), Some(token) if token.kind == TokenKind::Ident)
    }

    fn at_punct(&self, c: char) -> bool {
        matches!(self.peek(), Some(token) if token.kind == TokenKind::Punct(c))
    }

    fn peek_punct_at(&self, n: usize, c: char) -> bool {
        matches!(self.peek_at(n), Some(token) if token.kind == TokenKind::Punct(c))
    }

    fn at_string(&self) -> bool {
        matches!(self.peek(), Some(token) if matches!(token.kind, TokenKind::Str(_)))
    }

    /// Consume the current token when it is a string literal, returning
    /// its span and decoded value.
    fn take_string(&mut self) -> Option<(usize, usize, String)> {
        let taken = match self.peek() {
            Some(token) => match &token.kind {
                TokenKind::Str(value) => Some((token.start, token.end, value.clone())),
                _ => None,
            },
            None => None,
        };
        if taken.is_some() {
            self.bump();
        }
        taken
    }

    fn parse_statements(&mut self, top_level: bool) -> Vec<Node> {
        let mut statements = Vec::new();
        loop {
            let Some(current) = self.peeked() else { break };
            if current.punct == Some('}') {
                if top_level {
                    self.diagnostics.push((current.start, "unexpected '}'".into()));
                    self.bump();
                    continue;
                }
                break;
            }
            if current.punct == Some(';') {
                self.bump();
                continue;
            }
            if let Some(statement) = self.parse_statement(top_level) {
                statements.push(statement);
            }
        }
        statements
    }

    fn parse_statement(&mut self, top_level: bool) -> Option<Node> {
        let start = self.peeked()?.start;
        let mut children: Vec<Node> = Vec::new();
        let mut saw_export = false;

        // Modifier keywords ahead of the declaration proper.
        loop {
            if self.at_word("declare") {
                let Some(current) = self.peeked() else { break };
                // The span swallows trailing whitespace so dropping the
                // keyword does not leave a double space behind.
                let end = self.peek_at(1).map_or(current.end, |next| next.start);
                children.push(Node::new(SyntaxKind::DeclareKeyword, current.start, end));
                self.bump();
            } else if self.at_word("export") {
                saw_export = true;
                self.bump();
                if self.at_punct('=') {
                    // export = name;
                    let end = self.consume_simple_statement();
                    if top_level {
                        self.external_module_indicator = true;
                    }
                    let mut node = Node::new(SyntaxKind::Statement, start, end);
                    node.children = children;
                    return Some(node);
                }
                if self.at_punct('*') || self.at_punct('{') {
                    return Some(self.finish_export_declaration(start, children, top_level));
                }
            } else {
                break;
            }
        }

        let node = if self.at_word("import") {
            self.parse_import(start, children, top_level)
        } else if self.at_word("module") || self.at_word("namespace") || self.at_word("global") {
            self.parse_module_declaration(start, children)
        } else {
            let end = self.consume_simple_statement();
            let mut node = Node::new(SyntaxKind::Statement, start, end);
            node.children = children;
            node
        };
        if top_level && saw_export {
            self.external_module_indicator = true;
        }
        Some(node)
    }

    fn parse_import(&mut self, start: usize, mut children: Vec<Node>, top_level: bool) -> Node {
        self.bump(); // import
        let kind;
        if self.at_string() {
            // import './side-effect';
            if let Some((literal_start, literal_end, value)) = self.take_string() {
                children.push(Node::with_specifier(SyntaxKind::StringLiteral, literal_start, literal_end, value));
            }
            kind = SyntaxKind::ImportDeclaration;
        } else if self.at_ident() && self.peek_punct_at(1, '=') {
            // import name = require('...');
            self.bump();
            self.bump();
            if self.at_word("require") && self.peek_punct_at(1, '(') {
                let require_start = self.peeked().map_or(start, |p| p.start);
                self.bump();
                self.bump();
                if let Some((_, literal_end, value)) = self.take_string() {
                    if self.at_punct(')') {
                        let close_end = self.peeked().map_or(literal_end, |p| p.end);
                        self.bump();
                        children.push(Node::with_specifier(
                            SyntaxKind::ExternalModuleReference,
                            require_start,
                            close_end,
                            value,
                        ));
                    } else {
                        self.diagnostics.push((literal_end, "')' expected".into()));
                    }
                } else {
                    let offset = self.peeked().map_or(self.text.len(), |p| p.start);
                    self.diagnostics.push((offset, "string literal expected in 'require(...)'".into()));
                }
            } else {
                let offset = self.peeked().map_or(self.text.len(), |p| p.start);
                self.diagnostics.push((offset, "'require(...)' expected after import assignment".into()));
            }
            kind = SyntaxKind::ImportEqualsDeclaration;
        } else {
            // import { a, b } from '...'; / import * as ns from '...';
            self.scan_from_clause(&mut children);
            kind = SyntaxKind::ImportDeclaration;
        }
        let end = self.consume_to_semicolon();
        if top_level {
            self.external_module_indicator = true;
        }
        let mut node = Node::new(kind, start, end);
        node.children = children;
        node
    }

    fn finish_export_declaration(&mut self, start: usize, mut children: Vec<Node>, top_level: bool) -> Node {
        self.scan_from_clause(&mut children);
        let end = self.consume_to_semicolon();
        if top_level {
            self.external_module_indicator = true;
        }
        let mut node = Node::new(SyntaxKind::ExportDeclaration, start, end);
        node.children = children;
        node
    }

    /// Scan an import/export clause up to (not including) its terminating
    /// `;`, capturing the `from '...'` specifier when present.
    fn scan_from_clause(&mut self, children: &mut Vec<Node>) {
        let mut brace_depth = 0usize;
        loop {
            let Some(current) = self.peeked() else { break };
            match current.punct {
                Some(';') if brace_depth == 0 => break,
                Some('{') => {
                    brace_depth += 1;
                    self.bump();
                }
                Some('}') => {
                    if brace_depth == 0 {
                        break;
                    }
                    brace_depth -= 1;
                    self.bump();
                }
                _ => {
                    if self.at_word("from") {
                        self.bump();
                        if let Some((literal_start, literal_end, value)) = self.take_string() {
                            children.push(Node::with_specifier(
                                SyntaxKind::StringLiteral,
                                literal_start,
                                literal_end,
                                value,
                            ));
                        }
                    } else {
                        self.bump();
                    }
                }
            }
        }
    }

    fn parse_module_declaration(&mut self, start: usize, mut children: Vec<Node>) -> Node {
        self.bump(); // module | namespace | global
        if self.at_string() {
            // Ambient module name: deliberately not a node, the rewrite
            // policy never touches it.
            self.take_string();
        } else {
            while self.at_ident() {
                self.bump();
                if self.at_punct('.') {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if self.at_punct('{') {
            self.bump();
            let inner = self.parse_statements(false);
            children.extend(inner);
            let end = if self.at_punct('}') {
                let end = self.peeked().map_or(self.text.len(), |p| p.end);
                self.bump();
                end
            } else {
                self.diagnostics.push((self.text.len(), "'}' expected".into()));
                self.text.len()
            };
            let mut node = Node::new(SyntaxKind::ModuleDeclaration, start, end);
            node.children = children;
            node
        } else {
            // `declare module 'x';` shorthand
            let end = self.consume_to_semicolon();
            let mut node = Node::new(SyntaxKind::Statement, start, end);
            node.children = children;
            node
        }
    }

    /// Consume a statement with no rewrite-relevant structure: up to a
    /// `;` at brace depth zero, or through a balanced top-level block
    /// (class/interface/enum bodies). A `}` that would close an
    /// enclosing block is left for the caller.
    fn consume_simple_statement(&mut self) -> usize {
        let mut brace_depth = 0usize;
        let mut end = self.prev_end();
        loop {
            let Some(current) = self.peeked() else { break };
            match current.punct {
                Some('{') => {
                    brace_depth += 1;
                    self.bump();
                    end = current.end;
                }
                Some('}') => {
                    if brace_depth == 0 {
                        break;
                    }
                    brace_depth -= 1;
                    self.bump();
                    end = current.end;
                    if brace_depth == 0 {
                        if let Some(next) = self.peeked() {
                            if next.punct == Some(';') {
                                self.bump();
                                end = next.end;
                            }
                        }
                        break;
                    }
                }
                Some(';') if brace_depth == 0 => {
                    self.bump();
                    end = current.end;
                    break;
                }
                _ => {
                    self.bump();
                    end = current.end;
                }
            }
        }
        if brace_depth > 0 {
            self.diagnostics.push((self.text.len(), "'}' expected".into()));
        }
        end
    }

    /// Consume remaining clause tokens through the terminating `;`.
    fn consume_to_semicolon(&mut self) -> usize {
        let mut end = self.prev_end();
        loop {
            let Some(current) = self.peeked() else { break };
            if current.punct == Some('}') {
                break;
            }
            self.bump();
            end = current.end;
            if current.punct == Some(';') {
                break;
            }
        }
        end
    }
}

/// Parse one declaration source into its syntax tree.
pub fn parse(file_name: String, text: String) -> SourceFile {
    let mut raw_diagnostics = Vec::new();
    let tokens = tokenize(&text, &mut raw_diagnostics);
    trace!("parsing {file_name}: {} tokens", tokens.len());
    let mut parser = Parser {
        text: &text,
        tokens,
        pos: 0,
        diagnostics: raw_diagnostics,
        external_module_indicator: false,
    };
    let statements = parser.parse_statements(true);
    let external_module_indicator = parser.external_module_indicator;
    let raw_diagnostics = std::mem::take(&mut parser.diagnostics);
    drop(parser);
    let mut root = Node::new(SyntaxKind::SourceFile, 0, text.len());
    root.children = statements;
    SourceFile::new(file_name, text, root, external_module_indicator, raw_diagnostics)
}

/// Collect the specifiers of all relative (`.`-leading) module references
/// in a parsed file, in source order.
pub fn relative_specifiers(root: &Node) -> Vec<String> {
    let mut specifiers = Vec::new();
    collect_relative(root, &mut specifiers);
    specifiers
}

fn collect_relative(node: &Node, out: &mut Vec<String>) {
    if matches!(node.kind, SyntaxKind::ExternalModuleReference | SyntaxKind::StringLiteral) {
        if let Some(specifier) = &node.specifier {
            if specifier.starts_with('.') {
                out.push(specifier.clone());
            }
        }
    }
    for child in &node.children {
        collect_relative(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_text(text: &str) -> SourceFile {
        parse("/test.d.ts".into(), text.into())
    }

    fn find_kinds(node: &Node, kind: SyntaxKind, out: &mut Vec<Node>) {
        if node.kind == kind {
            out.push(node.clone());
        }
        for child in &node.children {
            find_kinds(child, kind, out);
        }
    }

    fn nodes_of(file: &SourceFile, kind: SyntaxKind) -> Vec<Node> {
        let mut out = Vec::new();
        find_kinds(&file.root, kind, &mut out);
        out
    }

    #[test]
    fn import_from_produces_a_specifier_literal() {
        let file = parse_text("import { B } from './b';\n");
        let literals = nodes_of(&file, SyntaxKind::StringLiteral);
        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].specifier.as_deref(), Some("./b"));
        assert_eq!(&file.text[literals[0].start..literals[0].end], "'./b'");
        assert!(file.external_module_indicator);
    }

    #[test]
    fn import_equals_produces_an_external_module_reference() {
        let file = parse_text("import b = require('./b');\n");
        let references = nodes_of(&file, SyntaxKind::ExternalModuleReference);
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].specifier.as_deref(), Some("./b"));
        assert_eq!(&file.text[references[0].start..references[0].end], "require('./b')");
    }

    #[test]
    fn declare_keyword_span_includes_trailing_whitespace() {
        let file = parse_text("export declare class B {\n    name: string;\n}\n");
        let keywords = nodes_of(&file, SyntaxKind::DeclareKeyword);
        assert_eq!(keywords.len(), 1);
        assert_eq!(&file.text[keywords[0].start..keywords[0].end], "declare ");
    }

    #[test]
    fn export_from_is_recognized() {
        let file = parse_text("export * from './other';\nexport { A } from \"./a\";\n");
        let literals = nodes_of(&file, SyntaxKind::StringLiteral);
        assert_eq!(literals.len(), 2);
        assert_eq!(literals[0].specifier.as_deref(), Some("./other"));
        assert_eq!(literals[1].specifier.as_deref(), Some("./a"));
    }

    #[test]
    fn ambient_module_name_is_not_a_literal_node() {
        let file = parse_text("declare module 'ambient' {\n    const x: string;\n}\n");
        assert!(nodes_of(&file, SyntaxKind::StringLiteral).is_empty());
        assert!(!file.external_module_indicator);
        let modules = nodes_of(&file, SyntaxKind::ModuleDeclaration);
        assert_eq!(modules.len(), 1);
    }

    #[test]
    fn nested_imports_inside_module_blocks_are_found() {
        let file = parse_text("declare module 'wrap' {\n    import { A } from './a';\n}\n");
        let literals = nodes_of(&file, SyntaxKind::StringLiteral);
        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].specifier.as_deref(), Some("./a"));
        // A nested import does not make the file itself a module.
        assert!(!file.external_module_indicator);
    }

    #[test]
    fn global_declaration_file_has_no_module_marker() {
        let file = parse_text("declare const VERSION: string;\n");
        assert!(!file.external_module_indicator);
        assert_eq!(nodes_of(&file, SyntaxKind::DeclareKeyword).len(), 1);
    }

    #[test]
    fn export_assignment_marks_external_module() {
        let file = parse_text("import main = require('./main');\nexport = main;\n");
        assert!(file.external_module_indicator);
    }

    #[test]
    fn unterminated_string_is_a_diagnostic() {
        let file = parse_text("export * from './broken\n");
        assert!(!file.diagnostics.is_empty());
        assert!(file.diagnostics[0].message.contains("unterminated string"));
    }

    #[test]
    fn unbalanced_brace_is_a_diagnostic() {
        let file = parse_text("declare module 'x' {\n    const a: string;\n");
        assert!(file.diagnostics.iter().any(|d| d.message.contains("'}' expected")));
    }

    #[test]
    fn sibling_spans_are_disjoint_and_ordered() {
        let file = parse_text("import { A } from './a';\nexport declare function f(): A;\nexport * from './c';\n");
        let statements = &file.root.children;
        assert_eq!(statements.len(), 3);
        for pair in statements.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn relative_specifiers_are_collected_in_order() {
        let file = parse_text("import { A } from './a';\nimport ext = require('ext');\nexport * from './z';\n");
        assert_eq!(relative_specifiers(&file.root), vec!["./a", "./z"]);
    }

    #[test]
    fn comments_and_strings_do_not_confuse_the_scanner() {
        let file = parse_text("// import { X } from './not-real';\n/* export * from './nope'; */\nexport declare const s: string;\n");
        assert!(nodes_of(&file, SyntaxKind::StringLiteral).is_empty());
        assert!(file.external_module_indicator);
        assert!(file.diagnostics.is_empty());
    }
}
