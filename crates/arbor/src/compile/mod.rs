//! Grammar compilation: symbol lowering, LR(1) table construction, and
//! conflict resolution.
//!
//! [`Language::compile`] turns a validated [`Grammar`](crate::grammar::Grammar)
//! into an immutable [`Language`] that parse sessions share by `Arc`. All
//! static decisions happen here; the runtime only interprets the tables.

mod resolve;
pub mod symbols;
pub mod table;

pub use symbols::{Production, ProductionStep, SymbolId, SymbolInfo};
pub use table::{Action, Language, State};
