//! Parsing many inputs against one compiled language.
//!
//! A [`Language`](crate::compile::Language) is immutable once compiled and a
//! [`Parser`] borrows it through an `Arc`, so batches fan out across the
//! rayon thread pool with no coordination beyond the final collect.

use crate::error::ParseError;
use crate::parser::runtime::{ParseOutput, Parser};
use rayon::prelude::*;

/// Parse every source in `sources` in parallel, preserving input order.
///
/// Each element carries its own result: a cancelled or failed parse does not
/// affect its neighbors.
pub fn parse_many<S>(parser: &Parser, sources: &[S]) -> Vec<Result<ParseOutput, ParseError>>
where
    S: AsRef<str> + Sync,
{
    sources
        .par_iter()
        .map(|source| parser.parse(source.as_ref()))
        .collect()
}
