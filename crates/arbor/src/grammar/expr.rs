use crate::lexer::Pattern;
use compact_str::CompactString;

/// Operator grouping direction attached by `prec_left` / `prec_right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Associativity {
    #[default]
    None,
    Left,
    Right,
}

/// The body of a grammar rule.
///
/// Expressions form a small combinator language; the free functions in
/// [`dsl`](crate::grammar::dsl) are the intended way to build them.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleExpr {
    /// Matches the empty string.
    Blank,
    /// An anonymous terminal matching this exact text.
    Literal(CompactString),
    /// A terminal matched by a character-level pattern.
    Pattern(Pattern),
    /// Reference to another rule by name.
    Symbol(CompactString),
    Seq(Vec<RuleExpr>),
    /// Unordered alternatives; ambiguity between branches is resolved by the
    /// table builder, not by branch order.
    Choice(Vec<RuleExpr>),
    /// Zero or more.
    Repeat(Box<RuleExpr>),
    /// One or more.
    Repeat1(Box<RuleExpr>),
    Optional(Box<RuleExpr>),
    /// Label the edge to the child with a field name.
    Field {
        name: CompactString,
        expr: Box<RuleExpr>,
    },
    /// Present the matched node under a different kind in the tree.
    Alias {
        name: CompactString,
        named: bool,
        expr: Box<RuleExpr>,
    },
    /// Collapse the sub-expression into a single terminal.
    Token(Box<RuleExpr>),
    /// Attach a precedence level and associativity for conflict resolution.
    Prec {
        level: i32,
        assoc: Associativity,
        expr: Box<RuleExpr>,
    },
    /// Attach a dynamic-precedence score used to rank surviving parses when
    /// a declared conflict forks the parse.
    PrecDynamic {
        level: i32,
        expr: Box<RuleExpr>,
    },
}

impl RuleExpr {
    /// Collect every rule name this expression references.
    pub fn referenced_rules(&self, out: &mut Vec<CompactString>) {
        match self {
            Self::Blank | Self::Literal(_) | Self::Pattern(_) => {}
            Self::Symbol(name) => out.push(name.clone()),
            Self::Seq(parts) | Self::Choice(parts) => {
                for part in parts {
                    part.referenced_rules(out);
                }
            }
            Self::Repeat(inner)
            | Self::Repeat1(inner)
            | Self::Optional(inner)
            | Self::Field { expr: inner, .. }
            | Self::Alias { expr: inner, .. }
            | Self::Token(inner)
            | Self::Prec { expr: inner, .. }
            | Self::PrecDynamic { expr: inner, .. } => inner.referenced_rules(out),
        }
    }

    /// Whether this expression can be collapsed into a single terminal:
    /// character-level combinators only, with rule references allowed when
    /// `resolve` shows the referenced body is itself terminal.
    pub fn is_terminal_body<'g>(&self, resolve: &dyn Fn(&str) -> Option<&'g RuleExpr>) -> bool {
        self.terminal_body_inner(resolve, &mut Vec::new())
    }

    fn terminal_body_inner<'g>(
        &self,
        resolve: &dyn Fn(&str) -> Option<&'g RuleExpr>,
        visiting: &mut Vec<CompactString>,
    ) -> bool {
        match self {
            Self::Blank | Self::Literal(_) | Self::Pattern(_) => true,
            Self::Symbol(name) => {
                // A rule that reaches itself through references cannot
                // collapse to a terminal.
                if visiting.iter().any(|seen| seen == name) {
                    return false;
                }
                visiting.push(name.clone());
                let terminal = resolve(name)
                    .is_some_and(|body| body.terminal_body_inner(resolve, visiting));
                visiting.pop();
                terminal
            }
            Self::Seq(parts) | Self::Choice(parts) => parts
                .iter()
                .all(|part| part.terminal_body_inner(resolve, visiting)),
            Self::Repeat(inner) | Self::Repeat1(inner) | Self::Optional(inner) => {
                inner.terminal_body_inner(resolve, visiting)
            }
            Self::Token(inner) => inner.terminal_body_inner(resolve, visiting),
            // Structural annotations make no sense inside a terminal.
            Self::Field { .. } | Self::Alias { .. } => false,
            Self::Prec { expr, .. } | Self::PrecDynamic { expr, .. } => {
                expr.terminal_body_inner(resolve, visiting)
            }
        }
    }
}

/// Free-function combinators for writing grammars.
///
/// ```
/// use arbor::grammar::dsl::*;
///
/// let rule = prec_left(1, seq([sym("expression"), lit("+"), sym("expression")]));
/// ```
pub mod dsl {
    use super::{Associativity, RuleExpr};
    use crate::lexer::Pattern;

    #[must_use]
    pub fn blank() -> RuleExpr {
        RuleExpr::Blank
    }

    #[must_use]
    pub fn lit(text: &str) -> RuleExpr {
        RuleExpr::Literal(text.into())
    }

    #[must_use]
    pub fn pattern(pattern: Pattern) -> RuleExpr {
        RuleExpr::Pattern(pattern)
    }

    #[must_use]
    pub fn sym(name: &str) -> RuleExpr {
        RuleExpr::Symbol(name.into())
    }

    #[must_use]
    pub fn seq(parts: impl IntoIterator<Item = RuleExpr>) -> RuleExpr {
        RuleExpr::Seq(parts.into_iter().collect())
    }

    #[must_use]
    pub fn choice(branches: impl IntoIterator<Item = RuleExpr>) -> RuleExpr {
        RuleExpr::Choice(branches.into_iter().collect())
    }

    #[must_use]
    pub fn repeat(inner: RuleExpr) -> RuleExpr {
        RuleExpr::Repeat(Box::new(inner))
    }

    #[must_use]
    pub fn repeat1(inner: RuleExpr) -> RuleExpr {
        RuleExpr::Repeat1(Box::new(inner))
    }

    #[must_use]
    pub fn optional(inner: RuleExpr) -> RuleExpr {
        RuleExpr::Optional(Box::new(inner))
    }

    #[must_use]
    pub fn field(name: &str, expr: RuleExpr) -> RuleExpr {
        RuleExpr::Field {
            name: name.into(),
            expr: Box::new(expr),
        }
    }

    /// Present the match as a named node of kind `name`.
    #[must_use]
    pub fn alias(name: &str, expr: RuleExpr) -> RuleExpr {
        RuleExpr::Alias {
            name: name.into(),
            named: true,
            expr: Box::new(expr),
        }
    }

    /// Present the match as an anonymous node of kind `name`.
    #[must_use]
    pub fn alias_token(name: &str, expr: RuleExpr) -> RuleExpr {
        RuleExpr::Alias {
            name: name.into(),
            named: false,
            expr: Box::new(expr),
        }
    }

    #[must_use]
    pub fn token(inner: RuleExpr) -> RuleExpr {
        RuleExpr::Token(Box::new(inner))
    }

    #[must_use]
    pub fn prec(level: i32, expr: RuleExpr) -> RuleExpr {
        RuleExpr::Prec {
            level,
            assoc: Associativity::None,
            expr: Box::new(expr),
        }
    }

    #[must_use]
    pub fn prec_left(level: i32, expr: RuleExpr) -> RuleExpr {
        RuleExpr::Prec {
            level,
            assoc: Associativity::Left,
            expr: Box::new(expr),
        }
    }

    #[must_use]
    pub fn prec_right(level: i32, expr: RuleExpr) -> RuleExpr {
        RuleExpr::Prec {
            level,
            assoc: Associativity::Right,
            expr: Box::new(expr),
        }
    }

    #[must_use]
    pub fn prec_dynamic(level: i32, expr: RuleExpr) -> RuleExpr {
        RuleExpr::PrecDynamic {
            level,
            expr: Box::new(expr),
        }
    }

    /// One or more `item`s separated by `separator`.
    #[must_use]
    pub fn sep1(item: RuleExpr, separator: RuleExpr) -> RuleExpr {
        seq([item.clone(), repeat(seq([separator, item]))])
    }

    /// Zero or more `item`s separated by `separator`.
    #[must_use]
    pub fn sep(item: RuleExpr, separator: RuleExpr) -> RuleExpr {
        optional(sep1(item, separator))
    }
}
