use crate::syntax::{FieldId, Kind, NodeFlags, TextSize};
use compact_str::CompactString;
use smallvec::SmallVec;
use std::sync::Arc;

/// Immutable, shareable green tree node.
///
/// Green nodes carry lengths rather than absolute offsets, so an unchanged
/// subtree can be spliced by reference into a new tree version at a shifted
/// position. The automaton state a node was constructed under is recorded for
/// incremental reuse checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GreenNode {
    kind: Kind,
    flags: NodeFlags,
    parse_state: u32,
    text_len: TextSize,
    children: GreenChildren,
}

/// Children storage specialized per arity: no allocation for leaves and
/// single-child wrappers, inline storage for the common small cases, and a
/// shared slice for wide nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GreenChildren {
    Empty,
    One(Box<GreenChild>),
    Inline(SmallVec<[GreenChild; 4]>),
    Many(Arc<[GreenChild]>),
}

/// A child edge: the element plus its optional field label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GreenChild {
    pub field: Option<FieldId>,
    pub element: GreenElement,
}

impl GreenChild {
    #[must_use]
    pub const fn new(element: GreenElement) -> Self {
        Self {
            field: None,
            element,
        }
    }

    #[must_use]
    pub const fn with_field(field: FieldId, element: GreenElement) -> Self {
        Self {
            field: Some(field),
            element,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GreenElement {
    Node(Arc<GreenNode>),
    Token(GreenToken),
}

/// A leaf carrying its source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GreenToken {
    kind: Kind,
    flags: NodeFlags,
    text: CompactString,
}

const INLINE_CHILDREN_THRESHOLD: usize = 4;

impl GreenNode {
    /// Create a new green node. Text length and error flags are derived from
    /// the children.
    #[must_use]
    pub fn new<I>(kind: Kind, parse_state: u32, flags: NodeFlags, children: I) -> Arc<Self>
    where
        I: IntoIterator<Item = GreenChild>,
    {
        let children: SmallVec<[GreenChild; 4]> = children.into_iter().collect();
        let mut text_len = TextSize::zero();
        let mut flags = flags;
        for child in &children {
            text_len += child.element.text_len();
            let child_flags = child.element.flags();
            if child_flags.contains(NodeFlags::ERROR)
                || child_flags.contains(NodeFlags::MISSING)
                || child_flags.contains(NodeFlags::HAS_ERROR)
            {
                flags |= NodeFlags::HAS_ERROR;
            }
        }
        let children = match children.len() {
            0 => GreenChildren::Empty,
            1 => GreenChildren::One(Box::new(children.into_iter().next().unwrap())),
            2..=INLINE_CHILDREN_THRESHOLD => GreenChildren::Inline(children),
            _ => GreenChildren::Many(Arc::from(children.into_vec())),
        };
        Arc::new(Self {
            kind,
            flags,
            parse_state,
            text_len,
            children,
        })
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub const fn parse_state(&self) -> u32 {
        self.parse_state
    }

    #[inline]
    #[must_use]
    pub const fn text_len(&self) -> TextSize {
        self.text_len
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[GreenChild] {
        match &self.children {
            GreenChildren::Empty => &[],
            GreenChildren::One(child) => std::slice::from_ref(child),
            GreenChildren::Inline(children) => children,
            GreenChildren::Many(children) => children,
        }
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    #[must_use]
    pub const fn is_named(&self) -> bool {
        self.flags.contains(NodeFlags::NAMED)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.flags.contains(NodeFlags::ERROR)
    }

    /// Whether this subtree contains any error or missing element.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.flags.contains(NodeFlags::HAS_ERROR)
            || self.flags.contains(NodeFlags::ERROR)
            || self.flags.contains(NodeFlags::MISSING)
    }

    /// Append the concatenated leaf text of this subtree to `out`.
    pub fn collect_text(&self, out: &mut String) {
        for child in self.children() {
            match &child.element {
                GreenElement::Node(node) => node.collect_text(out),
                GreenElement::Token(token) => out.push_str(token.text()),
            }
        }
    }
}

impl GreenToken {
    #[must_use]
    pub fn new(kind: Kind, flags: NodeFlags, text: impl Into<CompactString>) -> Self {
        Self {
            kind,
            flags,
            text: text.into(),
        }
    }

    /// A zero-width leaf standing in for a required token that recovery could
    /// not find.
    #[must_use]
    pub fn missing(kind: Kind) -> Self {
        Self {
            kind,
            flags: NodeFlags::MISSING,
            text: CompactString::default(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    #[must_use]
    pub fn text_len(&self) -> TextSize {
        TextSize::of(&self.text)
    }

    #[must_use]
    pub const fn is_missing(&self) -> bool {
        self.flags.contains(NodeFlags::MISSING)
    }
}

impl GreenElement {
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Node(node) => node.kind(),
            Self::Token(token) => token.kind(),
        }
    }

    #[must_use]
    pub fn flags(&self) -> NodeFlags {
        match self {
            Self::Node(node) => node.flags(),
            Self::Token(token) => token.flags(),
        }
    }

    #[must_use]
    pub fn text_len(&self) -> TextSize {
        match self {
            Self::Node(node) => node.text_len(),
            Self::Token(token) => token.text_len(),
        }
    }

    #[must_use]
    pub const fn as_node(&self) -> Option<&Arc<GreenNode>> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    #[must_use]
    pub const fn as_token(&self) -> Option<&GreenToken> {
        match self {
            Self::Token(token) => Some(token),
            Self::Node(_) => None,
        }
    }
}

impl From<Arc<GreenNode>> for GreenElement {
    fn from(node: Arc<GreenNode>) -> Self {
        Self::Node(node)
    }
}

impl From<GreenToken> for GreenElement {
    fn from(token: GreenToken) -> Self {
        Self::Token(token)
    }
}
