//! Error types and parse diagnostics.
//!
//! Grammar compilation failures are fatal and surface as [`CompileError`]
//! before any parsing can happen. Malformed input never aborts a parse: the
//! runtime always produces a complete tree and reports damage as
//! [`Diagnostic`] values. The only way a parse session ends without a tree is
//! cancellation.

use crate::syntax::TextRange;
use thiserror::Error;

/// Fatal grammar-compilation errors.
///
/// None of these are recoverable; the grammar must be fixed and recompiled.
#[derive(Debug, Clone, PartialEq, Eq, Error, miette::Diagnostic)]
pub enum CompileError {
    #[error("undefined rule `{0}`")]
    #[diagnostic(code(grammar::undefined_rule))]
    UndefinedRule(String),

    #[error("duplicate rule `{0}`")]
    #[diagnostic(code(grammar::duplicate_rule))]
    DuplicateRule(String),

    #[error("invalid extra: {0}")]
    #[diagnostic(code(grammar::invalid_extra))]
    InvalidExtra(String),

    #[error("`word` must reference a terminal-producing rule, got `{0}`")]
    #[diagnostic(code(grammar::invalid_word_rule))]
    InvalidWordRule(String),

    #[error("rule `{0}` cannot be both `inline` and a supertype")]
    #[diagnostic(code(grammar::conflicting_rule_flags))]
    ConflictingRuleFlags(String),

    #[error("grammar has no rules")]
    #[diagnostic(code(grammar::empty))]
    EmptyGrammar,

    #[error(
        "unresolved conflict in state {state} between productions {productions:?}; \
         add precedence or declare the rules in `conflicts`"
    )]
    #[diagnostic(code(table::unresolved_conflict))]
    UnresolvedConflict {
        state: usize,
        productions: Vec<String>,
    },
}

/// Session-level parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The session's operation budget or deadline was exhausted. No tree is
    /// produced; the caller discards the session state.
    #[error("parse cancelled after {operations} operations")]
    Cancelled { operations: usize },
}

/// A localized parse-time problem. Diagnostics never prevent a tree from
/// being produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub range: TextRange,
    pub kind: DiagnosticKind,
    /// Names of terminals that would have been valid at this point.
    pub expected: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Input that no rule could consume; covered by an error node.
    Unexpected,
    /// A required token that had to be fabricated as a zero-width leaf.
    Missing,
}

impl Diagnostic {
    #[must_use]
    pub const fn unexpected(range: TextRange, expected: Vec<String>) -> Self {
        Self {
            range,
            kind: DiagnosticKind::Unexpected,
            expected,
        }
    }

    #[must_use]
    pub const fn missing(range: TextRange, expected: Vec<String>) -> Self {
        Self {
            range,
            kind: DiagnosticKind::Missing,
            expected,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DiagnosticKind::Unexpected => write!(f, "unexpected input at {}", self.range)?,
            DiagnosticKind::Missing => write!(f, "missing token at {}", self.range)?,
        }
        if !self.expected.is_empty() {
            write!(f, " (expected {})", format_expected(&self.expected))?;
        }
        Ok(())
    }
}

/// Format a list of expected terminal names as a human-readable string.
#[must_use]
pub fn format_expected(expected: &[String]) -> String {
    match expected.len() {
        0 => "nothing".to_string(),
        1 => expected[0].clone(),
        2 => format!("{} or {}", expected[0], expected[1]),
        _ => {
            let mut result = expected[..expected.len() - 1].join(", ");
            result.push_str(", or ");
            result.push_str(&expected[expected.len() - 1]);
            result
        }
    }
}
