//! # Arbor
//!
//! An incremental GLR parsing library.
//!
//! ## Overview
//!
//! Arbor turns a declarative grammar into a parser that produces lossless,
//! immutable syntax trees:
//!
//! - **Grammar definition**: named rules built from a combinator DSL, with
//!   precedence, associativity, fields, aliases, and declared ambiguities
//! - **Table compilation**: canonical LR(1) construction with conflict
//!   resolution at compile time; genuine ambiguities fork at parse time
//! - **State-driven lexing**: terminals are matched against only what the
//!   current parse state can consume, so the same bytes may lex differently
//!   in different contexts
//! - **Error recovery**: malformed input always yields a tree covering every
//!   source byte, plus diagnostics
//! - **Incremental reparsing**: unchanged subtrees from a previous parse are
//!   spliced into the next one by reference
//!
//! ## Quick Start
//!
//! ```rust
//! use arbor::compile::Language;
//! use arbor::grammar::{dsl, GrammarBuilder};
//! use arbor::lexer::{CharSet, Pattern};
//! use arbor::parser::Parser;
//!
//! let grammar = GrammarBuilder::new("arith")
//!     .rule(
//!         "expression",
//!         dsl::choice([
//!             dsl::prec_left(
//!                 1,
//!                 dsl::seq([
//!                     dsl::field("left", dsl::sym("expression")),
//!                     dsl::lit("+"),
//!                     dsl::field("right", dsl::sym("expression")),
//!                 ]),
//!             ),
//!             dsl::sym("number"),
//!         ]),
//!     )
//!     .rule(
//!         "number",
//!         dsl::pattern(Pattern::repeat1(Pattern::class(CharSet::digits()))),
//!     )
//!     .extra(dsl::pattern(Pattern::repeat1(Pattern::class(
//!         CharSet::whitespace(),
//!     ))))
//!     .build()
//!     .unwrap();
//!
//! let language = Language::compile(&grammar).unwrap();
//! let parser = Parser::new(language);
//! let output = parser.parse("1 + 2 + 3").unwrap();
//! assert_eq!(output.tree.text(), "1 + 2 + 3");
//! assert!(output.diagnostics.is_empty());
//! ```

pub mod compile;
pub mod error;
pub mod grammar;
pub mod incremental;
pub mod lexer;
pub mod parser;
pub mod syntax;

pub use compile::Language;
pub use error::{CompileError, Diagnostic, ParseError};
pub use grammar::{Grammar, GrammarBuilder};
pub use incremental::IncrementalParser;
pub use parser::{ParseOutput, Parser, SyntaxTree};
pub use syntax::{TextEdit, TextRange, TextSize};
