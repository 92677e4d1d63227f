//! The parse runtime.
//!
//! A [`Parser`] drives the compiled automaton over source text and produces
//! a [`SyntaxTree`]. Ambiguities declared in the grammar fork the parse into
//! multiple heads over a shared-prefix stack; dynamic precedence ranks the
//! survivors. Malformed input never fails the parse: recovery records
//! diagnostics and keeps every source byte in the tree.

pub mod parallel;
pub(crate) mod recovery;
pub(crate) mod runtime;
pub mod stack;
pub mod tree;

pub use parallel::parse_many;
pub use runtime::{ParseOutput, Parser};
pub use stack::ParseStack;
pub use tree::SyntaxTree;
