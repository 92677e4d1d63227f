use crate::syntax::{
    FieldId, GreenChild, GreenElement, GreenNode, GreenToken, Kind, NodeFlags, TextRange, TextSize,
};
use std::sync::Arc;

/// Red-tree view of a green node: a green subtree plus its absolute offset.
///
/// Views are cheap to construct and borrow the underlying green tree, which
/// stays shared between tree versions.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxNode<'a> {
    green: &'a Arc<GreenNode>,
    offset: TextSize,
    field: Option<FieldId>,
}

/// Red-tree view of a leaf.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxToken<'a> {
    green: &'a GreenToken,
    offset: TextSize,
    field: Option<FieldId>,
}

#[derive(Debug, Clone, Copy)]
pub enum SyntaxElement<'a> {
    Node(SyntaxNode<'a>),
    Token(SyntaxToken<'a>),
}

impl<'a> SyntaxNode<'a> {
    #[must_use]
    pub const fn new_root(green: &'a Arc<GreenNode>) -> Self {
        Self {
            green,
            offset: TextSize::zero(),
            field: None,
        }
    }

    #[must_use]
    pub const fn green(&self) -> &'a Arc<GreenNode> {
        self.green
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.green.kind()
    }

    #[must_use]
    pub fn range(&self) -> TextRange {
        TextRange::at(self.offset, self.green.text_len())
    }

    /// Field label of the edge leading to this node, if any.
    #[must_use]
    pub const fn field(&self) -> Option<FieldId> {
        self.field
    }

    #[must_use]
    pub fn is_named(&self) -> bool {
        self.green.is_named()
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.green.is_error()
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.green.has_error()
    }

    /// Iterate over all children, trivia included, with absolute offsets.
    pub fn children(&self) -> impl Iterator<Item = SyntaxElement<'a>> + '_ {
        let mut offset = self.offset;
        self.green.children().iter().map(move |child| {
            let element = SyntaxElement::from_child(child, offset);
            offset += child.element.text_len();
            element
        })
    }

    /// Iterate over named (non-trivia, non-anonymous) child nodes and tokens.
    pub fn named_children(&self) -> impl Iterator<Item = SyntaxElement<'a>> + '_ {
        self.children().filter(|element| {
            element.flags().contains(NodeFlags::NAMED)
                && !element.flags().contains(NodeFlags::TRIVIA)
        })
    }

    /// All children labeled with `field`, in order. Repeated fields
    /// accumulate rather than overwrite.
    pub fn children_by_field(&self, field: FieldId) -> impl Iterator<Item = SyntaxElement<'a>> + '_ {
        self.children()
            .filter(move |element| element.field() == Some(field))
    }

    /// First child labeled with `field`.
    #[must_use]
    pub fn child_by_field(&self, field: FieldId) -> Option<SyntaxElement<'a>> {
        self.children_by_field(field).next()
    }

    /// Depth-first collection of every leaf under this node.
    #[must_use]
    pub fn descendant_tokens(&self) -> Vec<SyntaxToken<'a>> {
        let mut out = Vec::new();
        self.collect_tokens(&mut out);
        out
    }

    fn collect_tokens(&self, out: &mut Vec<SyntaxToken<'a>>) {
        for child in self.children() {
            match child {
                SyntaxElement::Node(node) => node.collect_tokens(out),
                SyntaxElement::Token(token) => out.push(token),
            }
        }
    }

    /// Reconstruct the source text covered by this node.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.green.collect_text(&mut out);
        out
    }
}

impl<'a> SyntaxToken<'a> {
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.green.kind()
    }

    #[must_use]
    pub fn range(&self) -> TextRange {
        TextRange::at(self.offset, self.green.text_len())
    }

    #[must_use]
    pub const fn field(&self) -> Option<FieldId> {
        self.field
    }

    #[must_use]
    pub fn text(&self) -> &'a str {
        self.green.text()
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.green.is_missing()
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.green.flags().contains(NodeFlags::ERROR)
    }

    #[must_use]
    pub fn is_trivia(&self) -> bool {
        self.green.flags().contains(NodeFlags::TRIVIA)
    }

    #[must_use]
    pub fn is_named(&self) -> bool {
        self.green.flags().contains(NodeFlags::NAMED)
    }
}

impl<'a> SyntaxElement<'a> {
    fn from_child(child: &'a GreenChild, offset: TextSize) -> Self {
        match &child.element {
            GreenElement::Node(node) => Self::Node(SyntaxNode {
                green: node,
                offset,
                field: child.field,
            }),
            GreenElement::Token(token) => Self::Token(SyntaxToken {
                green: token,
                offset,
                field: child.field,
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Node(node) => node.kind(),
            Self::Token(token) => token.kind(),
        }
    }

    #[must_use]
    pub fn range(&self) -> TextRange {
        match self {
            Self::Node(node) => node.range(),
            Self::Token(token) => token.range(),
        }
    }

    #[must_use]
    pub const fn field(&self) -> Option<FieldId> {
        match self {
            Self::Node(node) => node.field(),
            Self::Token(token) => token.field(),
        }
    }

    #[must_use]
    pub fn flags(&self) -> NodeFlags {
        match self {
            Self::Node(node) => node.green.flags(),
            Self::Token(token) => token.green.flags(),
        }
    }

    #[must_use]
    pub const fn as_node(&self) -> Option<&SyntaxNode<'a>> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    #[must_use]
    pub const fn as_token(&self) -> Option<&SyntaxToken<'a>> {
        match self {
            Self::Token(token) => Some(token),
            Self::Node(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(kind: u16, text: &str) -> GreenChild {
        GreenChild::new(GreenElement::Token(GreenToken::new(
            Kind::new(kind),
            NodeFlags::NAMED,
            text,
        )))
    }

    #[test]
    fn children_have_absolute_offsets() {
        let green = GreenNode::new(
            Kind::new(20),
            0,
            NodeFlags::NAMED,
            vec![leaf(1, "ab"), leaf(2, "+"), leaf(1, "cd")],
        );
        let node = SyntaxNode::new_root(&green);
        let ranges: Vec<_> = node.children().map(|c| c.range()).collect();
        assert_eq!(
            ranges,
            vec![
                TextRange::new(TextSize::from(0), TextSize::from(2)),
                TextRange::new(TextSize::from(2), TextSize::from(3)),
                TextRange::new(TextSize::from(3), TextSize::from(5)),
            ]
        );
    }

    #[test]
    fn field_lookup_accumulates() {
        let field = FieldId::new(0);
        let green = GreenNode::new(
            Kind::new(20),
            0,
            NodeFlags::NAMED,
            vec![
                GreenChild::with_field(
                    field,
                    GreenElement::Token(GreenToken::new(Kind::new(1), NodeFlags::NAMED, "a")),
                ),
                leaf(2, ","),
                GreenChild::with_field(
                    field,
                    GreenElement::Token(GreenToken::new(Kind::new(1), NodeFlags::NAMED, "b")),
                ),
            ],
        );
        let node = SyntaxNode::new_root(&green);
        let labeled: Vec<_> = node
            .children_by_field(field)
            .map(|c| c.as_token().unwrap().text().to_string())
            .collect();
        assert_eq!(labeled, vec!["a", "b"]);
    }

    #[test]
    fn text_reconstruction() {
        let green = GreenNode::new(
            Kind::new(20),
            0,
            NodeFlags::NAMED,
            vec![leaf(1, "1 "), leaf(2, "+ "), leaf(1, "2")],
        );
        let node = SyntaxNode::new_root(&green);
        assert_eq!(node.text(), "1 + 2");
        assert_eq!(node.descendant_tokens().len(), 3);
    }
}
