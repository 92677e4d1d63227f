//! Syntax tree types: text offsets and edits, immutable green nodes, and
//! red-tree views.
//!
//! The tree is split the usual way: green nodes store kinds, flags, and
//! lengths and are shared by `Arc` across tree versions; red views add
//! absolute offsets on demand. All leaves carry their source text, so a tree
//! with no errors reconstructs its input exactly.

pub mod green;
pub mod kind;
pub mod node;
pub mod text;

pub use green::{GreenChild, GreenElement, GreenNode, GreenToken};
pub use kind::{FieldId, Kind, NodeFlags};
pub use node::{SyntaxElement, SyntaxNode, SyntaxToken};
pub use text::{TextEdit, TextRange, TextSize};
