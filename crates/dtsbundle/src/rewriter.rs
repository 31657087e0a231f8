//! Generic source-tree rewriter.
//!
//! Walks a parsed tree in pre-order, keeping a cursor into the original
//! text. Original text between nodes is copied verbatim; when the
//! decision function replaces a node, its whole span (subtree included)
//! is superseded by the replacement text. The output is byte-identical to
//! the input everywhere outside replaced spans.

use crate::syntax::{Node, SourceFile};

/// Decision for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Leave the node alone and recurse into its children
    Keep,
    /// Replace the node's entire span with this text (possibly empty)
    /// and skip its subtree
    Replace(String),
}

/// Rewrite one source file through a decision function.
///
/// The decision function must depend only on the node it is given, which
/// keeps the rewrite well-defined as a single top-down pass.
pub fn rewrite(source: &SourceFile, decide: impl Fn(&Node) -> Rewrite) -> String {
    let mut output = String::with_capacity(source.text.len());
    let mut cursor = 0usize;
    visit(&source.text, &source.root, &decide, &mut output, &mut cursor);
    output.push_str(&source.text[cursor..]);
    output
}

fn visit(text: &str, node: &Node, decide: &impl Fn(&Node) -> Rewrite, output: &mut String, cursor: &mut usize) {
    output.push_str(&text[*cursor..node.start]);
    *cursor = node.start;
    match decide(node) {
        Rewrite::Replace(replacement) => {
            output.push_str(&replacement);
            *cursor = node.end;
        }
        Rewrite::Keep => {
            for child in &node.children {
                visit(text, child, decide, output, cursor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse, syntax::SyntaxKind};

    fn parse_text(text: &str) -> SourceFile {
        parse("/test.d.ts".into(), text.into())
    }

    #[test]
    fn keep_everything_reproduces_the_input() {
        let text = "import { A } from './a';\n// comment\nexport declare const x: string;\n";
        let file = parse_text(text);
        assert_eq!(rewrite(&file, |_| Rewrite::Keep), text);
    }

    #[test]
    fn replaced_spans_substitute_and_the_rest_is_untouched() {
        let file = parse_text("import { A } from './a';\nexport declare const x: A;\n");
        let output = rewrite(&file, |node| match node.kind {
            SyntaxKind::StringLiteral => Rewrite::Replace("'lib/a'".into()),
            SyntaxKind::DeclareKeyword => Rewrite::Replace(String::new()),
            _ => Rewrite::Keep,
        });
        assert_eq!(output, "import { A } from 'lib/a';\nexport const x: A;\n");
    }

    #[test]
    fn replacing_a_parent_skips_its_children() {
        let file = parse_text("import { A } from './a';\n");
        // Replace the whole import statement; the literal inside must not
        // be emitted a second time.
        let output = rewrite(&file, |node| match node.kind {
            SyntaxKind::ImportDeclaration => Rewrite::Replace("/* import elided */".into()),
            SyntaxKind::StringLiteral => Rewrite::Replace("'never'".into()),
            _ => Rewrite::Keep,
        });
        assert_eq!(output, "/* import elided */\n");
    }

    #[test]
    fn empty_replacement_is_a_deletion() {
        let file = parse_text("declare const x: string;\n");
        let output = rewrite(&file, |node| match node.kind {
            SyntaxKind::DeclareKeyword => Rewrite::Replace(String::new()),
            _ => Rewrite::Keep,
        });
        assert_eq!(output, "const x: string;\n");
    }

    #[test]
    fn untouched_spans_are_byte_identical() {
        let text = "import a = require('./a');\n\n/* keep me */\nexport declare function f(): void;\n";
        let file = parse_text(text);
        let replacement = "require('lib/a')";
        let output = rewrite(&file, |node| match node.kind {
            SyntaxKind::ExternalModuleReference => Rewrite::Replace(replacement.into()),
            _ => Rewrite::Keep,
        });
        // Everything before and after the replaced span matches the
        // original byte-for-byte.
        let start = text.find("require").expect("span present");
        let end = start + "require('./a')".len();
        assert_eq!(&output[..start], &text[..start]);
        assert_eq!(&output[start..start + replacement.len()], replacement);
        assert_eq!(&output[start + replacement.len()..], &text[end..]);
    }
}
