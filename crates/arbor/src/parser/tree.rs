use crate::compile::Language;
use crate::syntax::{GreenNode, SyntaxElement, SyntaxNode, SyntaxToken};
use std::sync::Arc;

/// A parse result: an immutable green tree plus the language that gives its
/// kinds meaning. Cloning shares both.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    language: Arc<Language>,
    root: Arc<GreenNode>,
}

impl SyntaxTree {
    #[must_use]
    pub const fn new(language: Arc<Language>, root: Arc<GreenNode>) -> Self {
        Self { language, root }
    }

    #[must_use]
    pub fn root(&self) -> SyntaxNode<'_> {
        SyntaxNode::new_root(&self.root)
    }

    #[must_use]
    pub const fn green_root(&self) -> &Arc<GreenNode> {
        &self.root
    }

    #[must_use]
    pub const fn language(&self) -> &Arc<Language> {
        &self.language
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.root.has_error() || self.root.is_error()
    }

    /// Reconstruct the exact source text this tree was parsed from.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.root.collect_text(&mut out);
        out
    }

    /// Render the named structure of the tree as an s-expression, in the
    /// style of `(program (binary_expression left: (number) right: (number)))`.
    /// Anonymous tokens and trivia are omitted; error and missing elements
    /// appear as `(ERROR ...)` and `(MISSING)`.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        let root = self.root();
        self.node_sexp(&root, &mut out);
        out
    }

    fn node_sexp(&self, node: &SyntaxNode<'_>, out: &mut String) {
        if node.kind().is_error() {
            out.push_str("(ERROR");
        } else {
            out.push('(');
            out.push_str(self.language.kind_name(node.kind()));
        }
        for child in node.children() {
            match child {
                SyntaxElement::Node(inner) => {
                    if inner.is_named() || inner.kind().is_error() {
                        out.push(' ');
                        self.field_prefix(&child, out);
                        self.node_sexp(&inner, out);
                    } else {
                        // Unnamed interior nodes contribute their named
                        // descendants directly.
                        self.child_sexps(&inner, out);
                    }
                }
                SyntaxElement::Token(token) => self.token_sexp(&child, &token, out),
            }
        }
        out.push(')');
    }

    fn child_sexps(&self, node: &SyntaxNode<'_>, out: &mut String) {
        for child in node.children() {
            match child {
                SyntaxElement::Node(inner) => {
                    if inner.is_named() || inner.kind().is_error() {
                        out.push(' ');
                        self.field_prefix(&child, out);
                        self.node_sexp(&inner, out);
                    } else {
                        self.child_sexps(&inner, out);
                    }
                }
                SyntaxElement::Token(token) => self.token_sexp(&child, &token, out),
            }
        }
    }

    fn token_sexp(&self, element: &SyntaxElement<'_>, token: &SyntaxToken<'_>, out: &mut String) {
        if token.is_missing() {
            out.push_str(" (MISSING)");
        } else if token.is_error() {
            out.push_str(" (ERROR)");
        } else if token.is_named() && !token.is_trivia() {
            out.push(' ');
            self.field_prefix(element, out);
            out.push('(');
            out.push_str(self.language.kind_name(token.kind()));
            out.push(')');
        }
    }

    fn field_prefix(&self, element: &SyntaxElement<'_>, out: &mut String) {
        if let Some(field) = element.field() {
            out.push_str(self.language.field_name(field));
            out.push_str(": ");
        }
    }
}
