//! Grammar definition: rule expressions, the grammar builder, and build-time
//! validation.
//!
//! A grammar is a list of named rules plus cross-cutting declarations:
//! `extras` (trivia), `word` (the keyword-bearing terminal), supertypes,
//! inlined rules, and declared ambiguity sets. [`GrammarBuilder::build`]
//! validates everything; compilation to parse tables happens separately in
//! [`crate::compile`].

pub mod builder;
pub mod expr;
mod validate;

pub use builder::{Grammar, GrammarBuilder, Rule};
pub use expr::{dsl, Associativity, RuleExpr};
